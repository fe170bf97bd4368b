//! Error types for the storage layer.
//!
//! All errors are propagated via [`StoreError`], which wraps the underlying
//! I/O, JSON, and kernel errors with the file or line that failed.

use std::path::PathBuf;

use lockstep_core::snapshot::SnapshotError;
use lockstep_events::EventLogError;

/// Errors that can occur in the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A filesystem operation failed.
    #[error("I/O error on {path:?}: {source}")]
    Io {
        /// File or directory being accessed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A journal line could not be parsed.
    #[error("journal corrupt at line {line}: {reason}")]
    CorruptJournal {
        /// One-based line number.
        line: usize,
        /// Parser message.
        reason: String,
    },

    /// Journal records do not form a valid event log.
    #[error("event log error: {0}")]
    EventLog(#[from] EventLogError),

    /// A record was appended out of position order.
    #[error("journal out of order: expected position {expected}, got {found}")]
    OutOfOrder {
        /// Next position the journal expects.
        expected: u64,
        /// Position of the offered record.
        found: u64,
    },

    /// A stored snapshot failed verification or lookup.
    #[error("snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),
}

impl StoreError {
    /// Attach a path to an I/O error.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
