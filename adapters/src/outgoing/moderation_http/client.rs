use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use reqwest::{
    Client, Method, RequestBuilder, Response, StatusCode,
    header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT},
};
use serde::{Serialize, de::DeserializeOwned};
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::models::RateLimitBody;
use domain::restriction::ScopeId;
use warden_application::{
    error::{AppError, AppResult},
    infrastructure_config::ModerationApiConfig,
};

const AUDIT_LOG_REASON_HEADER: &str = "X-Audit-Log-Reason";
const CLIENT_USER_AGENT: &str = concat!(
    "DiscordBot (https://github.com/drendog/warden-backend, ",
    env!("CARGO_PKG_VERSION"),
    ")"
);

/// REST client for a Discord-style guild API. Implements both the
/// moderation and the directory port.
pub struct DiscordRestClient {
    http: Client,
    base_url: String,
    pub(super) mute_role_name: String,
    pub(super) mute_roles: Mutex<HashMap<ScopeId, u64>>,
}

impl DiscordRestClient {
    pub fn new(config: &ModerationApiConfig) -> AppResult<Self> {
        let mut authorization = HeaderValue::from_str(&format!("Bot {}", config.bot_token()))
            .map_err(|_| AppError::ConfigError {
                message: "moderation_api bot_token contains invalid header characters".to_string(),
            })?;
        authorization.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, authorization);
        headers.insert(USER_AGENT, HeaderValue::from_static(CLIENT_USER_AGENT));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AppError::ConfigError {
                message: format!("Failed to build moderation HTTP client: {e}"),
            })?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            mute_role_name: config.mute_role_name.clone(),
            mute_roles: Mutex::new(HashMap::new()),
        })
    }

    fn request(&self, method: Method, path: &str, reason: Option<&str>) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{}", self.base_url, path));
        match reason {
            Some(reason) => builder.header(AUDIT_LOG_REASON_HEADER, encode_audit_reason(reason)),
            None => builder,
        }
    }

    /// `GET` returning `Ok(None)` on 404.
    pub(super) async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> AppResult<Option<T>> {
        let response = send(self.request(Method::GET, path, None), "GET", path).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = ensure_success(response, "GET", path).await?;
        response
            .json::<T>()
            .await
            .map(Some)
            .map_err(|e| AppError::ExternalApiFailure {
                message: format!("GET {path} returned an unreadable body: {e}"),
            })
    }

    pub(super) async fn get_required<T: DeserializeOwned>(&self, path: &str) -> AppResult<T> {
        self.get_optional(path)
            .await?
            .ok_or_else(|| AppError::ExternalApiFailure {
                message: format!("GET {path} returned 404"),
            })
    }

    /// Mutation answered with an empty body. Returns `false` when the target
    /// was already gone.
    pub(super) async fn mutate<B: Serialize + Sync>(
        &self,
        method: Method,
        path: &str,
        reason: &str,
        body: Option<&B>,
    ) -> AppResult<bool> {
        let label = method.to_string();
        let mut builder = self.request(method, path, Some(reason));
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = send(builder, &label, path).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!(method = %label, path, "Target already absent");
            return Ok(false);
        }

        ensure_success(response, &label, path).await?;
        Ok(true)
    }
}

async fn send(builder: RequestBuilder, method: &str, path: &str) -> AppResult<Response> {
    builder.send().await.map_err(|e| AppError::ExternalApiFailure {
        message: format!("{method} {path} failed: {e}"),
    })
}

async fn ensure_success(response: Response, method: &str, path: &str) -> AppResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .json::<RateLimitBody>()
            .await
            .map(|body| body.retry_after)
            .unwrap_or_default();
        warn!(method, path, retry_after, "Moderation API rate limited the request");
        return Err(AppError::ExternalApiFailure {
            message: format!("{method} {path} was rate limited, retry after {retry_after}s"),
        });
    }

    let body = response.text().await.unwrap_or_default();
    Err(AppError::ExternalApiFailure {
        message: format!("{method} {path} returned {status}: {body}"),
    })
}

/// Everything outside the URI unreserved set.
const AUDIT_REASON_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn encode_audit_reason(reason: &str) -> String {
    utf8_percent_encode(reason, AUDIT_REASON_ENCODE_SET).to_string()
}
