//! The Validate stage and the four Apply passes.
//!
//! Every accepted action runs through [`APPLY_ORDER`] on a draft of the
//! world: Physics, Biology, Cognition, Governance. The first pass that
//! vetoes wins; the draft and any RNG draws it staged are discarded.
//!
//! # Modules
//!
//! - [`validate`] -- Structural checks that reject an input before Apply.
//! - [`movement`] -- Physics: bounds and reach.
//! - [`biology`] -- Energy costs, foraging, transfers, rest.
//! - [`cognition`] -- Goal selection.
//! - [`policy`] -- Governance: ownership, zones, transfer caps.

pub mod biology;
pub mod cognition;
pub mod movement;
pub mod policy;
pub mod validate;

use lockstep_rng::{RngError, RngStreamManager};
use lockstep_types::{InputEvent, Subsystem, VetoReason};
use lockstep_world::{WorldError, WorldState};

pub use biology::BiologyPass;
pub use cognition::CognitionPass;
pub use movement::MovementPass;
pub use policy::PolicyPass;
pub use validate::{Rejection, validate_input};

/// Errors a pass raises outside of its veto contract. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum PassError {
    /// The pass misused its RNG stream.
    #[error("rng error: {source}")]
    Rng {
        /// The underlying RNG error.
        #[from]
        source: RngError,
    },

    /// A world update failed.
    #[error("world error: {source}")]
    World {
        /// The underlying world error.
        #[from]
        source: WorldError,
    },
}

/// What a pass decided about an action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassOutcome {
    /// Keep going with the (possibly mutated) draft.
    Accept,
    /// Drop the action.
    Veto {
        /// Closed reason.
        reason: VetoReason,
        /// Human-readable detail for the observation.
        detail: String,
    },
}

impl PassOutcome {
    /// Shorthand for a veto.
    pub fn veto(reason: VetoReason, detail: impl Into<String>) -> Self {
        Self::Veto {
            reason,
            detail: detail.into(),
        }
    }
}

/// What a pass may see while applying one action.
#[derive(Debug)]
pub struct PassContext<'a> {
    /// The tick being computed.
    pub tick: u64,
    /// The action's input event.
    pub event: &'a InputEvent,
    /// The pipeline's working RNG manager.
    pub rng: &'a mut RngStreamManager,
}

/// One Apply pass.
pub trait ApplyPass: Send + Sync {
    /// The subsystem that owns this pass and its RNG streams.
    fn subsystem(&self) -> Subsystem;

    /// Accept, mutate-and-accept, or veto the action in `ctx.event`.
    ///
    /// # Errors
    ///
    /// Returns [`PassError`] only for faults; rule violations are vetoes.
    fn apply(
        &self,
        draft: &mut WorldState,
        ctx: &mut PassContext<'_>,
    ) -> Result<PassOutcome, PassError>;
}

/// The fixed Apply order.
pub static APPLY_ORDER: [&dyn ApplyPass; 4] =
    [&MovementPass, &BiologyPass, &CognitionPass, &PolicyPass];
