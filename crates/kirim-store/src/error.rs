use thiserror::Error;

/// Errors that can occur within the storage subsystem.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No row with the given ID exists.
    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    /// A referenced row is missing (e.g. schedule pointing at a deleted post).
    #[error("Invalid reference: {0}")]
    InvalidReference(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
