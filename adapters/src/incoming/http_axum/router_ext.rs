use axum::{Router, middleware};
use secrecy::SecretString;
use std::sync::Arc;

use crate::incoming::http_axum::middleware::{
    api_token::require_api_token, request_id::request_id_middleware,
};

pub trait RouterExt<State> {
    fn with_request_id(self) -> Self;
    fn with_api_token(self, token: Option<Arc<SecretString>>) -> Self;
}

impl<State> RouterExt<State> for Router<State>
where
    State: Clone + Send + Sync + 'static,
{
    fn with_request_id(self) -> Self {
        self.layer(middleware::from_fn(request_id_middleware))
    }

    fn with_api_token(self, token: Option<Arc<SecretString>>) -> Self {
        let Some(token) = token else {
            return self;
        };

        self.layer(middleware::from_fn(move |bearer, req, next| {
            let token_clone = Arc::clone(&token);
            require_api_token(token_clone, bearer, req, next)
        }))
    }
}
