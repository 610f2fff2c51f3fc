use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthzError {
    #[error("No store provisioned for namespace: {0}")]
    StoreNotFound(String),

    #[error("Store resolution failed: {0}")]
    StoreResolution(String),

    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Malformed object key '{key}': expected prefix '{expected}'")]
    MalformedObjectKey { key: String, expected: String },

    #[error("Request deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

impl From<::config::ConfigError> for AuthzError {
    fn from(err: ::config::ConfigError) -> Self {
        AuthzError::Configuration(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AuthzError>;
