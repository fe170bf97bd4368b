//! Error types for the `lockstep-core` crate.
//!
//! Everything in [`KernelError`] is fatal to the pipeline. Rejected inputs
//! and vetoed actions are not errors; they surface as observation events
//! and the tick continues.

use lockstep_events::EventLogError;
use lockstep_hash::CanonicalError;
use lockstep_rng::RngError;
use lockstep_world::WorldError;

use crate::clock::ClockError;
use crate::passes::PassError;
use crate::snapshot::SnapshotError;
use crate::tick::DivergenceReport;

/// Fatal kernel errors.
#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    /// A clock operation failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: ClockError,
    },

    /// An RNG stream was misused (undeclared pair, exhausted counter).
    #[error("rng misuse: {source}")]
    Rng {
        /// The underlying RNG error.
        #[from]
        source: RngError,
    },

    /// A world update failed outside of a veto.
    #[error("world fault: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: WorldError,
    },

    /// Authoritative state could not be encoded or decoded.
    #[error("serialization fault: {source}")]
    Serialization {
        /// The underlying canonical codec error.
        #[from]
        source: CanonicalError,
    },

    /// A recomputed world hash disagreed with a recorded checkpoint.
    #[error("hash divergence at tick {}", report.tick)]
    Divergence {
        /// The structured report.
        report: Box<DivergenceReport>,
    },

    /// A snapshot failed verification or storage.
    #[error("snapshot error: {source}")]
    Snapshot {
        /// The underlying snapshot error.
        #[from]
        source: SnapshotError,
    },

    /// The event log refused an operation.
    #[error("event log error: {source}")]
    EventLog {
        /// The underlying event log error.
        #[from]
        source: EventLogError,
    },

    /// An internal counter would overflow.
    #[error("counter overflow: {what}")]
    CounterOverflow {
        /// Which counter.
        what: &'static str,
    },

    /// The pipeline halted earlier and refuses further ticks.
    #[error("pipeline halted at tick {tick}; no further ticks are accepted")]
    Halted {
        /// The tick named in the divergence report.
        tick: u64,
    },
}

/// Pass faults surface under the same variants as the equivalent fault
/// outside a pass.
impl From<PassError> for KernelError {
    fn from(err: PassError) -> Self {
        match err {
            PassError::Rng { source } => Self::Rng { source },
            PassError::World { source } => Self::World { source },
        }
    }
}
