// Error types for token resolution and persisted auth state

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Storage unavailable: {0}")]
    Storage(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed stored record: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Identity provider error: {0}")]
    Provider(String),

    #[error("Identity provider timed out")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, AuthError>;
