//! RNG error types.
//!
//! Every variant is an RNG misuse and is fatal to the tick that raised it.

use lockstep_types::Subsystem;

/// Errors raised by the RNG stream manager.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RngError {
    /// A draw named a stream that was not declared at genesis.
    #[error("rng stream ({subsystem}, {stream_id}) was not declared at genesis")]
    Undeclared {
        /// Subsystem of the requested stream.
        subsystem: Subsystem,
        /// Stream identifier within the subsystem.
        stream_id: u32,
    },

    /// The same stream was declared twice.
    #[error("rng stream ({subsystem}, {stream_id}) declared more than once")]
    DuplicateStream {
        /// Subsystem of the duplicated stream.
        subsystem: Subsystem,
        /// Stream identifier within the subsystem.
        stream_id: u32,
    },

    /// A stream's draw counter would overflow.
    #[error("rng stream ({subsystem}, {stream_id}) draw counter overflow")]
    CounterOverflow {
        /// Subsystem of the exhausted stream.
        subsystem: Subsystem,
        /// Stream identifier within the subsystem.
        stream_id: u32,
    },

    /// A bounded draw was requested with an empty range.
    #[error("bounded draw requires a non-zero bound")]
    ZeroBound,

    /// Restored counters do not cover exactly the declared streams.
    #[error("stored rng counters do not match declared streams: {reason}")]
    CounterMismatch {
        /// Which stream was missing or unexpected.
        reason: String,
    },
}
