use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid restriction key: {0}")]
    InvalidRestrictionKey(String),

    #[error("Invalid expiry value: {0}")]
    InvalidExpiry(String),

    #[error("Unknown restriction category: {0}")]
    UnknownCategory(String),
}

pub type DomainResult<T> = Result<T, DomainError>;
