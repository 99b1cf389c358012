use thiserror::Error;

#[derive(Debug, Error)]
pub enum KirimError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, KirimError>;
