use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::{debug, error, warn};

use warden_application::error::AppError;

pub struct HttpError(pub AppError);

impl HttpError {
    fn status_and_message(&self) -> (StatusCode, String) {
        let app_error = &self.0;
        match app_error {
            AppError::Domain(_) | AppError::JsonError(_) => {
                (StatusCode::BAD_REQUEST, app_error.to_string())
            }

            AppError::ValidationError { .. } | AppError::ResolutionFailure { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, app_error.to_string())
            }

            AppError::NotFound { message } => (StatusCode::NOT_FOUND, message.clone()),

            AppError::AlreadyRestricted { message } => (StatusCode::CONFLICT, message.clone()),

            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized".to_string()),

            AppError::ExternalApiFailure { .. } => (
                StatusCode::BAD_GATEWAY,
                "Moderation API request failed".to_string(),
            ),

            AppError::EventFeedError { .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Event feed unavailable".to_string(),
            ),

            AppError::PersistenceError { .. } | AppError::MalformedPersistedEntry { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Persistence error".to_string(),
            ),

            AppError::ConfigError { .. } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Configuration error".to_string(),
            ),

            AppError::IoError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        }
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let (status_code, message) = self.status_and_message();

        if status_code.is_server_error() {
            if status_code == StatusCode::BAD_GATEWAY {
                warn!("Upstream error response generated: {}", self.0);
            } else {
                error!("Server error response generated: {}", self.0);
            }
        } else {
            debug!("Client error response generated: {}", self.0);
        }

        let error_response = json!({
            "ok": false,
            "error": message,
            "status": status_code.as_u16()
        });

        (status_code, Json(error_response)).into_response()
    }
}

impl From<AppError> for HttpError {
    fn from(app_error: AppError) -> Self {
        HttpError(app_error)
    }
}
