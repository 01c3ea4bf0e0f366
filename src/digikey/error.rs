use crate::auth::OAuthError;
use thiserror::Error;

/// DigiKey client errors
#[derive(Error, Debug)]
pub enum DigikeyError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON serialization failed: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("DigiKey API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    /// No valid credential, or the vendor rejected the bearer token
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("OAuth error: {0}")]
    OAuth(#[from] OAuthError),

    #[error("Credential storage error: {0}")]
    StorageError(String),
}

impl DigikeyError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, DigikeyError::Unauthorized(_))
    }
}
