//! Error types for featcrate

use thiserror::Error;

/// Main error type for featcrate operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("Insufficient points: need at least {needed}, found {found}")]
    InsufficientPoints { needed: usize, found: usize },
}

/// Result type alias for featcrate operations
pub type Result<T> = std::result::Result<T, Error>;
