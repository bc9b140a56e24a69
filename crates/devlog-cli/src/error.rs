//! CLI error types.

use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The logger rejected the operation.
    #[error(transparent)]
    Log(#[from] devlog::LogError),

    /// No entry with this id.
    #[error("entry not found: {0}")]
    NotFound(devlog::EntryId),

    /// Output formatting error.
    #[error("format error: {0}")]
    Format(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
