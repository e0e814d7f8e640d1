use axum::{extract::Request, middleware::Next, response::Response};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use subtle::ConstantTimeEq;

use crate::incoming::http_axum::error_mapper::HttpError;
use warden_application::error::AppError;

pub async fn require_api_token(
    expected: Arc<SecretString>,
    bearer: Option<TypedHeader<Authorization<Bearer>>>,
    request: Request,
    next: Next,
) -> Result<Response, HttpError> {
    let Some(TypedHeader(Authorization(bearer))) = bearer else {
        return Err(HttpError(AppError::Unauthorized));
    };

    if !tokens_match(bearer.token(), expected.expose_secret()) {
        return Err(HttpError(AppError::Unauthorized));
    }

    Ok(next.run(request).await)
}

/// Length mismatches return early; equal-length tokens compare in constant time.
fn tokens_match(provided: &str, expected: &str) -> bool {
    provided.as_bytes().ct_eq(expected.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_comparison() {
        assert!(tokens_match("s3cret", "s3cret"));
        assert!(!tokens_match("s3cret", "s3crex"));
        assert!(!tokens_match("s3cre", "s3cret"));
        assert!(!tokens_match("", "s3cret"));
    }
}
