//! Error types for membership enforcement

use studiodir_shared::ParseEnumError;

/// Errors raised by stores, notifiers and policy loading
#[derive(Debug, thiserror::Error)]
pub enum EnforcementError {
    #[error("database error: {0}")]
    Database(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("notification failed: {0}")]
    Notification(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("configuration error: {0}")]
    Config(String),
}

pub type EnforcementResult<T> = Result<T, EnforcementError>;

impl From<sqlx::Error> for EnforcementError {
    fn from(err: sqlx::Error) -> Self {
        EnforcementError::Database(err.to_string())
    }
}

impl From<ParseEnumError> for EnforcementError {
    fn from(err: ParseEnumError) -> Self {
        EnforcementError::InvalidData(err.to_string())
    }
}

impl From<reqwest::Error> for EnforcementError {
    fn from(err: reqwest::Error) -> Self {
        EnforcementError::Notification(err.to_string())
    }
}
