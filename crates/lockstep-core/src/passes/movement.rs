//! Physics: movement and spatial reach.

use lockstep_types::{Action, Subsystem, VetoReason};
use lockstep_world::WorldState;

use super::{ApplyPass, PassContext, PassError, PassOutcome};

/// Moves entities and checks that transfers happen between neighbours.
#[derive(Debug, Clone, Copy, Default)]
pub struct MovementPass;

impl ApplyPass for MovementPass {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Physics
    }

    fn apply(
        &self,
        draft: &mut WorldState,
        ctx: &mut PassContext<'_>,
    ) -> Result<PassOutcome, PassError> {
        match &ctx.event.action {
            Action::Move { entity, dx, dy } => {
                let bounds = draft.bounds;
                let mover = draft.entity_mut(*entity)?;
                let Some(target) = mover.position.offset(*dx, *dy) else {
                    return Ok(PassOutcome::veto(
                        VetoReason::OutOfBounds,
                        format!("entity {entity} step overflows the grid"),
                    ));
                };
                if !bounds.contains(target) {
                    return Ok(PassOutcome::veto(
                        VetoReason::OutOfBounds,
                        format!("entity {entity} cannot move to {target}"),
                    ));
                }
                mover.position = target;
                Ok(PassOutcome::Accept)
            }
            Action::Transfer { from, to, .. } => {
                let giver = draft.entity(*from)?.position;
                let taker = draft.entity(*to)?.position;
                if giver.is_adjacent(taker) {
                    Ok(PassOutcome::Accept)
                } else {
                    Ok(PassOutcome::veto(
                        VetoReason::OutOfReach,
                        format!("entity {from} at {giver} cannot reach entity {to} at {taker}"),
                    ))
                }
            }
            Action::Forage { .. }
            | Action::Plan { .. }
            | Action::Rest { .. }
            | Action::RestrictZone { .. }
            | Action::LiftZone { .. }
            | Action::SetTransferCap { .. } => Ok(PassOutcome::Accept),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use lockstep_types::{EntityId, InputEvent, SourceId};
    use lockstep_world::Position;

    use super::*;
    use crate::passes::fixtures;

    fn run(world: &mut WorldState, action: Action) -> PassOutcome {
        let mut rng = fixtures::rng();
        let event = InputEvent::new(1, SourceId(10), 0, action);
        let mut ctx = PassContext {
            tick: 1,
            event: &event,
            rng: &mut rng,
        };
        MovementPass.apply(world, &mut ctx).unwrap()
    }

    #[test]
    fn move_inside_bounds_updates_position() {
        let mut world = fixtures::world();
        let outcome = run(
            &mut world,
            Action::Move {
                entity: EntityId(1),
                dx: 0,
                dy: 1,
            },
        );
        assert_eq!(outcome, PassOutcome::Accept);
        assert_eq!(world.entity(EntityId(1)).unwrap().position, Position::new(0, 1));
    }

    #[test]
    fn move_off_the_grid_is_vetoed() {
        let mut world = fixtures::world();
        let outcome = run(
            &mut world,
            Action::Move {
                entity: EntityId(1),
                dx: -1,
                dy: 0,
            },
        );
        assert!(matches!(
            outcome,
            PassOutcome::Veto {
                reason: VetoReason::OutOfBounds,
                ..
            }
        ));
        assert_eq!(world.entity(EntityId(1)).unwrap().position, Position::new(0, 0));
    }

    #[test]
    fn distant_transfer_is_out_of_reach() {
        let mut world = fixtures::world();
        world.entity_mut(EntityId(2)).unwrap().position = Position::new(3, 3);
        let outcome = run(
            &mut world,
            Action::Transfer {
                from: EntityId(1),
                to: EntityId(2),
                amount: 1,
            },
        );
        assert!(matches!(
            outcome,
            PassOutcome::Veto {
                reason: VetoReason::OutOfReach,
                ..
            }
        ));
    }
}
