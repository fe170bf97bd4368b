//! Cognition: goal selection.
//!
//! `Plan` draws a goal cell from the `(Cognition, 0)` stream. An entity that
//! steps onto its goal forgets it.

use lockstep_types::{Action, Subsystem};
use lockstep_world::{Position, WorldError, WorldState};

use super::{ApplyPass, PassContext, PassError, PassOutcome};

/// Stream used for goal selection.
pub const PLANNING_STREAM: u32 = 0;

/// Picks and clears movement goals.
#[derive(Debug, Clone, Copy, Default)]
pub struct CognitionPass;

impl ApplyPass for CognitionPass {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Cognition
    }

    fn apply(
        &self,
        draft: &mut WorldState,
        ctx: &mut PassContext<'_>,
    ) -> Result<PassOutcome, PassError> {
        match &ctx.event.action {
            Action::Plan { entity } => {
                let width = extent(draft.bounds.width)?;
                let height = extent(draft.bounds.height)?;
                let x = ctx
                    .rng
                    .draw_below(Subsystem::Cognition, PLANNING_STREAM, width, "cognition.goal_x")?;
                let y = ctx
                    .rng
                    .draw_below(Subsystem::Cognition, PLANNING_STREAM, height, "cognition.goal_y")?;
                let goal = Position::new(coordinate(x)?, coordinate(y)?);
                draft.entity_mut(*entity)?.goal = Some(goal);
                Ok(PassOutcome::Accept)
            }
            Action::Move { entity, .. } => {
                let mover = draft.entity_mut(*entity)?;
                if mover.goal == Some(mover.position) {
                    mover.goal = None;
                }
                Ok(PassOutcome::Accept)
            }
            Action::Forage { .. }
            | Action::Transfer { .. }
            | Action::Rest { .. }
            | Action::RestrictZone { .. }
            | Action::LiftZone { .. }
            | Action::SetTransferCap { .. } => Ok(PassOutcome::Accept),
        }
    }
}

fn extent(value: i64) -> Result<u64, WorldError> {
    u64::try_from(value).map_err(|_| WorldError::ArithmeticOverflow)
}

fn coordinate(value: u64) -> Result<i64, WorldError> {
    i64::try_from(value).map_err(|_| WorldError::ArithmeticOverflow)
}
