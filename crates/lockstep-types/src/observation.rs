//! Derived, non-authoritative observation records.
//!
//! Observations describe what a tick did. They are emitted after the fact,
//! never replayed into state, and not part of the world hash.

use lockstep_hash::Digest;
use serde::{Deserialize, Serialize};

use crate::enums::{RejectionReason, Subsystem, VetoReason};
use crate::input::EventKey;

/// One changed field in a state diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffEntry {
    /// Dotted path of the field, e.g. `entity.3.energy`.
    pub path: String,
    /// Rendered value before the change, absent when created.
    pub before: Option<String>,
    /// Rendered value after the change, absent when removed.
    pub after: Option<String>,
}

/// Per-stream draw count for one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawSummary {
    /// Subsystem owning the stream.
    pub subsystem: Subsystem,
    /// Stream within the subsystem.
    pub stream_id: u32,
    /// Number of committed draws this tick.
    pub draws: u64,
    /// Stream counter after the last draw.
    pub last_counter: u64,
}

/// The body of an observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObservationPayload {
    /// Fields changed by an accepted action or by the world step.
    StateDiff {
        /// What produced the change (action kind or `environment`).
        origin: String,
        /// Changed fields in state order.
        entries: Vec<DiffEntry>,
    },
    /// An Apply pass vetoed an action.
    Vetoed {
        /// The pass that vetoed.
        subsystem: Subsystem,
        /// Closed veto reason.
        reason: VetoReason,
        /// Human-readable detail.
        detail: String,
    },
    /// Validate refused an input.
    Rejected {
        /// Closed rejection reason.
        reason: RejectionReason,
        /// Human-readable detail.
        detail: String,
    },
    /// RNG draws committed during the tick.
    RngDraws {
        /// One entry per stream that was drawn from.
        draws: Vec<DrawSummary>,
    },
    /// The world hash committed for the tick.
    Checkpoint {
        /// `WorldHash(tick)`.
        world_hash: Digest,
    },
}

/// A single observation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationEvent {
    /// Monotonically increasing id within one run.
    pub id: u64,
    /// Tick that produced the observation.
    pub tick: u64,
    /// Input that caused it, if any.
    pub cause: Option<EventKey>,
    /// What happened.
    pub payload: ObservationPayload,
}

impl ObservationEvent {
    /// Whether this observation records a veto.
    pub const fn is_veto(&self) -> bool {
        matches!(self.payload, ObservationPayload::Vetoed { .. })
    }

    /// Whether this observation records a rejection.
    pub const fn is_rejection(&self) -> bool {
        matches!(self.payload, ObservationPayload::Rejected { .. })
    }
}
