//! Error types for country grid extraction.

use thiserror::Error;

/// Errors that can occur while indexing, assembling or persisting grids.
#[derive(Error, Debug)]
pub enum GridError {
    /// A raw tile or persisted artifact does not match its fixed grammar.
    #[error("format error: {0}")]
    Format(String),

    /// The requested country does not appear in the tile index.
    #[error("country {0} not found in tile index")]
    NotFound(i32),

    /// A coordinate index references data outside the recorded tile set.
    #[error("inconsistent coordinate index: {0}")]
    InconsistentIndex(String),

    /// Opening, reading or writing a file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

impl GridError {
    /// Create a Format error.
    pub fn format(msg: impl Into<String>) -> Self {
        Self::Format(msg.into())
    }

    /// Create an InconsistentIndex error.
    pub fn inconsistent(msg: impl Into<String>) -> Self {
        Self::InconsistentIndex(msg.into())
    }

    /// Create a Config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Prefix the message of a Format or InconsistentIndex error.
    pub fn context(self, ctx: impl std::fmt::Display) -> Self {
        match self {
            Self::Format(msg) => Self::Format(format!("{}: {}", ctx, msg)),
            Self::InconsistentIndex(msg) => Self::InconsistentIndex(format!("{}: {}", ctx, msg)),
            other => other,
        }
    }

    /// Whether this error indicates a structurally broken input file.
    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format(_))
    }
}

impl From<serde_yaml::Error> for GridError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result type for grid operations.
pub type Result<T> = std::result::Result<T, GridError>;
