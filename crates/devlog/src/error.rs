//! Error types for the debug log subsystem.

use thiserror::Error;

use crate::types::Status;

/// A malformed entry or an illegal lifecycle change requested by a caller.
///
/// This is the only failure that surfaces from logging calls; everything
/// else degrades silently to the local cache.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required field was not provided.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// The entry title was empty or whitespace only.
    #[error("title must not be empty")]
    EmptyTitle,

    /// The category string is not part of the taxonomy.
    #[error("unknown category: {0}")]
    UnknownCategory(String),

    /// The severity string is not recognized.
    #[error("unknown severity: {0}")]
    UnknownSeverity(String),

    /// The status string is not recognized.
    #[error("unknown status: {0}")]
    UnknownStatus(String),

    /// The requested status change is not a forward transition.
    #[error("invalid status transition: {from} -> {to}")]
    InvalidTransition {
        /// Current status.
        from: Status,
        /// Requested status.
        to: Status,
    },
}

/// Errors that can occur in the debug log subsystem.
#[derive(Debug, Error)]
pub enum LogError {
    /// The caller supplied an invalid entry or transition.
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Writing to a persistence tier failed.
    #[error("persistence write failed ({tier}): {reason}")]
    PersistenceWrite {
        /// Tier that failed ("primary" or "cache").
        tier: &'static str,
        /// Underlying reason.
        reason: String,
    },

    /// Reading from a persistence tier failed.
    #[error("persistence read failed ({tier}): {reason}")]
    PersistenceRead {
        /// Tier that failed ("primary" or "cache").
        tier: &'static str,
        /// Underlying reason.
        reason: String,
    },

    /// A primary store call did not complete in time.
    #[error("primary store timed out after {0} ms")]
    Timeout(u64),

    /// Serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration could not be loaded or is invalid.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors reported by primary store implementations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store cannot be reached.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The record to update does not exist.
    #[error("record not found: {table}/{id}")]
    NotFound {
        /// Table name.
        table: String,
        /// Record id.
        id: String,
    },

    /// A record could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors reported by monitoring sinks.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The sink is not reachable or not configured.
    #[error("sink unavailable: {0}")]
    Unavailable(String),

    /// The sink rejected the event.
    #[error("sink rejected event: {0}")]
    Rejected(String),
}

/// Result type alias for debug log operations.
pub type Result<T> = std::result::Result<T, LogError>;
