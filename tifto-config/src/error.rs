// Error types for settings resolution

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Setting not found: {0}")]
    KeyNotFound(String),

    #[error("Invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },

    #[error("Failed to load settings: {0}")]
    LoadError(String),

    #[error("Failed to parse settings file: {0}")]
    ParseError(String),

    #[error("Settings file I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Environment variable error: {0}")]
    EnvError(#[from] std::env::VarError),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
