//! Error type for dashboard storage

use std::io;

/// Errors that can occur while reading or writing dashboard documents.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// No document is stored under this id.
    #[error("dashboard not found: {0}")]
    NotFound(String),

    /// The id cannot name a document.
    #[error("invalid dashboard id {id:?}: {reason}")]
    InvalidId { id: String, reason: &'static str },

    #[error("dashboard storage I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
