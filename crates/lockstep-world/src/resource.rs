//! Regeneration and harvesting for resource nodes.
//!
//! `amount` never exceeds `capacity` and never goes below zero. Whether a
//! node regenerates in a given tick is decided by the caller from a
//! deterministic RNG draw; this module only applies the outcome.

use crate::error::WorldError;
use crate::state::ResourceNode;

/// Apply one regeneration step. Returns the units actually added.
///
/// # Errors
///
/// Returns [`WorldError::ArithmeticOverflow`] if checked arithmetic fails.
pub fn regenerate(node: &mut ResourceNode) -> Result<u64, WorldError> {
    if node.amount >= node.capacity {
        return Ok(0);
    }
    let headroom = node
        .capacity
        .checked_sub(node.amount)
        .ok_or(WorldError::ArithmeticOverflow)?;
    let added = node.regen.min(headroom);
    node.amount = node
        .amount
        .checked_add(added)
        .ok_or(WorldError::ArithmeticOverflow)?;
    Ok(added)
}

/// Take up to `wanted` units. Returns the units actually taken.
///
/// # Errors
///
/// Returns [`WorldError::ArithmeticOverflow`] if checked arithmetic fails.
pub fn harvest(node: &mut ResourceNode, wanted: u64) -> Result<u64, WorldError> {
    let taken = wanted.min(node.amount);
    node.amount = node
        .amount
        .checked_sub(taken)
        .ok_or(WorldError::ArithmeticOverflow)?;
    Ok(taken)
}

/// Whether a regeneration roll in `0..1000` succeeds.
pub const fn regen_roll_succeeds(roll: u64, chance_per_mille: u64) -> bool {
    roll < chance_per_mille
}
