use std::io;
use thiserror::Error;

use domain::error::DomainError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Not found: {message}")]
    NotFound { message: String },

    #[error("Already restricted: {message}")]
    AlreadyRestricted { message: String },

    #[error("Resolution failure: {message}")]
    ResolutionFailure { message: String },

    #[error("External API failure: {message}")]
    ExternalApiFailure { message: String },

    #[error("Malformed persisted entry: {message}")]
    MalformedPersistedEntry { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Persistence error: {message}")]
    PersistenceError { message: String },

    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Event feed error: {message}")]
    EventFeedError { message: String },

    #[error("Unauthorized")]
    Unauthorized,
}

impl AppError {
    /// Errors the scheduler expects to clear up on a later tick.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppError::ResolutionFailure { .. }
                | AppError::ExternalApiFailure { .. }
                | AppError::PersistenceError { .. }
                | AppError::IoError(_)
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;
