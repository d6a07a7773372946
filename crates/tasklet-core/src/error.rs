//! Error types for tasklet-core

use thiserror::Error;

use crate::models::TaskId;

/// Result type alias using tasklet-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tasklet-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// `SQLite` error (write/commit failures roll back before surfacing)
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Task not found
    #[error("Task not found: {0}")]
    NotFound(TaskId),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A stored row is missing a required column
    #[error("Cannot decode task row {id}: missing {column}")]
    Decoding { id: i64, column: &'static str },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
