//! Error types for I/O operations

use thiserror::Error;

/// Errors that can occur during I/O operations
#[derive(Error, Debug)]
pub enum IoError {
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("Write error: {message}")]
    WriteError { message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for I/O operations
pub type IoResult<T> = std::result::Result<T, IoError>;

impl IoError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        IoError::ParseError {
            line,
            message: message.into(),
        }
    }

    /// Map an open failure, reporting a missing file by its path
    pub(crate) fn from_open(error: std::io::Error, path: &std::path::Path) -> Self {
        if error.kind() == std::io::ErrorKind::NotFound {
            IoError::FileNotFound {
                path: path.display().to_string(),
            }
        } else {
            IoError::Io(error)
        }
    }
}
