//! Event log and ingress error types.

use lockstep_hash::CanonicalError;
use lockstep_types::EventKey;

/// Errors raised by the event log.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EventLogError {
    /// An event with the same ordering key is already in the log.
    #[error("duplicate event key {key}")]
    DuplicateKey {
        /// The repeated key.
        key: EventKey,
    },

    /// The event targets a tick that has already been committed.
    #[error("late event {key}: ticks through {sealed_through} are sealed")]
    LateEvent {
        /// Key of the refused event.
        key: EventKey,
        /// Highest committed tick.
        sealed_through: u64,
    },

    /// A record's hash or link does not match its contents.
    #[error("event log chain broken at position {position}")]
    ChainBroken {
        /// Position of the first bad record.
        position: u64,
    },

    /// The event could not be canonically encoded.
    #[error("event encoding failed: {source}")]
    Encoding {
        /// The underlying encoder error.
        #[from]
        source: CanonicalError,
    },
}

/// Errors returned to producers submitting through the ingress.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubmitError {
    /// The queue is full; retry later.
    #[error("ingress queue full (capacity {capacity})")]
    Backpressure {
        /// Configured queue capacity.
        capacity: usize,
    },

    /// The kernel side of the queue has shut down.
    #[error("ingress closed")]
    Closed,
}
