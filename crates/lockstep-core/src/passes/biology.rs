//! Biology: energy costs, foraging, transfers, and rest.
//!
//! Energy never goes negative; an action the actor cannot pay for is vetoed
//! with [`VetoReason::InsufficientEnergy`]. Foraging draws its yield from
//! the `(Biology, 0)` stream.

use lockstep_types::{Action, EntityId, Subsystem, VetoReason};
use lockstep_world::resource::harvest;
use lockstep_world::{WorldError, WorldState};
use rust_decimal::Decimal;

use super::{ApplyPass, PassContext, PassError, PassOutcome};

/// Stream used for forage yields.
pub const FORAGE_STREAM: u32 = 0;

/// Charges energy and moves stock.
#[derive(Debug, Clone, Copy, Default)]
pub struct BiologyPass;

impl ApplyPass for BiologyPass {
    fn subsystem(&self) -> Subsystem {
        Subsystem::Biology
    }

    fn apply(
        &self,
        draft: &mut WorldState,
        ctx: &mut PassContext<'_>,
    ) -> Result<PassOutcome, PassError> {
        match &ctx.event.action {
            Action::Move { entity, .. } => {
                let cost = draft.rules.move_cost;
                charge(draft, *entity, cost)
            }
            Action::Plan { entity } => {
                let cost = draft.rules.plan_cost;
                charge(draft, *entity, cost)
            }
            Action::Forage { entity } => forage(draft, ctx, *entity),
            Action::Transfer { from, to, amount } => transfer(draft, *from, *to, *amount),
            Action::Rest { entity } => {
                let gain = draft.rules.rest_gain;
                let max = draft.rules.max_energy;
                let resting = draft.entity_mut(*entity)?;
                let restored = resting
                    .energy
                    .checked_add(gain)
                    .ok_or(WorldError::ArithmeticOverflow)?;
                resting.energy = restored.min(max).normalize();
                Ok(PassOutcome::Accept)
            }
            Action::RestrictZone { .. }
            | Action::LiftZone { .. }
            | Action::SetTransferCap { .. } => Ok(PassOutcome::Accept),
        }
    }
}

/// Deduct `cost` from an entity's energy, or veto if it cannot pay.
fn charge(draft: &mut WorldState, id: EntityId, cost: Decimal) -> Result<PassOutcome, PassError> {
    let entity = draft.entity_mut(id)?;
    if entity.energy < cost {
        return Ok(PassOutcome::veto(
            VetoReason::InsufficientEnergy,
            format!("entity {id} has {} energy, needs {cost}", entity.energy),
        ));
    }
    entity.energy = entity
        .energy
        .checked_sub(cost)
        .ok_or(WorldError::ArithmeticOverflow)?
        .normalize();
    Ok(PassOutcome::Accept)
}

fn forage(
    draft: &mut WorldState,
    ctx: &mut PassContext<'_>,
    id: EntityId,
) -> Result<PassOutcome, PassError> {
    let cost = draft.rules.forage_cost;
    let max_yield = draft.rules.forage_max_yield;
    let (position, energy) = {
        let entity = draft.entity(id)?;
        (entity.position, entity.energy)
    };
    if energy < cost {
        return Ok(PassOutcome::veto(
            VetoReason::InsufficientEnergy,
            format!("entity {id} has {energy} energy, needs {cost} to forage"),
        ));
    }
    let Some(node) = draft.nodes.get_mut(&position).filter(|n| n.amount > 0) else {
        return Ok(PassOutcome::veto(
            VetoReason::InsufficientStock,
            format!("no resources to forage at {position}"),
        ));
    };

    let roll = ctx
        .rng
        .draw_below(Subsystem::Biology, FORAGE_STREAM, max_yield, "biology.forage_yield")?;
    let wanted = roll.checked_add(1).ok_or(WorldError::ArithmeticOverflow)?;
    let taken = harvest(node, wanted)?;

    let entity = draft.entity_mut(id)?;
    entity.stock = entity
        .stock
        .checked_add(taken)
        .ok_or(WorldError::ArithmeticOverflow)?;
    entity.energy = entity
        .energy
        .checked_sub(cost)
        .ok_or(WorldError::ArithmeticOverflow)?
        .normalize();
    Ok(PassOutcome::Accept)
}

fn transfer(
    draft: &mut WorldState,
    from: EntityId,
    to: EntityId,
    amount: u64,
) -> Result<PassOutcome, PassError> {
    let giver = draft.entity_mut(from)?;
    let Some(remaining) = giver.stock.checked_sub(amount) else {
        return Ok(PassOutcome::veto(
            VetoReason::InsufficientStock,
            format!("entity {from} holds {} stock, cannot give {amount}", giver.stock),
        ));
    };
    giver.stock = remaining;
    let taker = draft.entity_mut(to)?;
    taker.stock = taker
        .stock
        .checked_add(amount)
        .ok_or(WorldError::ArithmeticOverflow)?;
    Ok(PassOutcome::Accept)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use lockstep_rng::RngStreamManager;
    use lockstep_types::{InputEvent, SourceId};
    use lockstep_world::Position;

    use super::*;
    use crate::passes::fixtures;

    fn run(world: &mut WorldState, rng: &mut RngStreamManager, action: Action) -> PassOutcome {
        let event = InputEvent::new(1, SourceId(10), 0, action);
        let mut ctx = PassContext {
            tick: 1,
            event: &event,
            rng,
        };
        BiologyPass.apply(world, &mut ctx).unwrap()
    }

    #[test]
    fn move_costs_energy() {
        let mut world = fixtures::world();
        let mut rng = fixtures::rng();
        let outcome = run(
            &mut world,
            &mut rng,
            Action::Move {
                entity: EntityId(1),
                dx: 1,
                dy: 1,
            },
        );
        assert_eq!(outcome, PassOutcome::Accept);
        assert_eq!(world.entity(EntityId(1)).unwrap().energy, Decimal::new(45, 1));
    }

    #[test]
    fn exhausted_entity_cannot_plan() {
        let mut world = fixtures::world();
        let mut rng = fixtures::rng();
        let outcome = run(&mut world, &mut rng, Action::Plan { entity: EntityId(2) });
        assert!(matches!(
            outcome,
            PassOutcome::Veto {
                reason: VetoReason::InsufficientEnergy,
                ..
            }
        ));
    }

    #[test]
    fn forage_harvests_between_one_and_max_yield() {
        let mut world = fixtures::world();
        let mut rng = fixtures::rng();
        let outcome = run(&mut world, &mut rng, Action::Forage { entity: EntityId(1) });
        assert_eq!(outcome, PassOutcome::Accept);
        assert_eq!(rng.staged_len(), 1);

        let entity = world.entity(EntityId(1)).unwrap();
        let gained = entity.stock.checked_sub(4).unwrap();
        assert!((1..=3).contains(&gained));
        assert_eq!(entity.energy, Decimal::from(4));
        let left = world.nodes.get(&Position::new(0, 0)).unwrap().amount;
        assert_eq!(left.checked_add(gained), Some(5));
    }

    #[test]
    fn forage_off_node_is_insufficient_stock_without_drawing() {
        let mut world = fixtures::world();
        world.entity_mut(EntityId(1)).unwrap().position = Position::new(2, 2);
        let mut rng = fixtures::rng();
        let outcome = run(&mut world, &mut rng, Action::Forage { entity: EntityId(1) });
        assert!(matches!(
            outcome,
            PassOutcome::Veto {
                reason: VetoReason::InsufficientStock,
                ..
            }
        ));
        assert_eq!(rng.staged_len(), 0);
    }

    #[test]
    fn transfer_moves_stock() {
        let mut world = fixtures::world();
        let mut rng = fixtures::rng();
        let outcome = run(
            &mut world,
            &mut rng,
            Action::Transfer {
                from: EntityId(1),
                to: EntityId(2),
                amount: 3,
            },
        );
        assert_eq!(outcome, PassOutcome::Accept);
        assert_eq!(world.entity(EntityId(1)).unwrap().stock, 1);
        assert_eq!(world.entity(EntityId(2)).unwrap().stock, 3);
        assert_eq!(world.total_stock(), Some(9));
    }

    #[test]
    fn rest_is_capped_at_max_energy() {
        let mut world = fixtures::world();
        world.entity_mut(EntityId(1)).unwrap().energy = Decimal::new(95, 1);
        let mut rng = fixtures::rng();
        run(&mut world, &mut rng, Action::Rest { entity: EntityId(1) });
        assert_eq!(world.entity(EntityId(1)).unwrap().energy, Decimal::TEN);
    }
}
