//! Error types for the `lockstep-world` crate.

use lockstep_types::EntityId;

/// Errors raised while building or mutating the world.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WorldError {
    /// An entity was not found.
    #[error("entity not found: {0}")]
    EntityNotFound(EntityId),

    /// Two genesis entities share an id.
    #[error("duplicate entity id {0}")]
    DuplicateEntity(EntityId),

    /// Two genesis resource nodes share a cell.
    #[error("duplicate resource node at ({x}, {y})")]
    DuplicateNode {
        /// Cell x coordinate.
        x: i64,
        /// Cell y coordinate.
        y: i64,
    },

    /// A genesis position lies outside the world bounds.
    #[error("{what} at ({x}, {y}) is outside the world bounds")]
    OutOfBounds {
        /// What was placed.
        what: String,
        /// Cell x coordinate.
        x: i64,
        /// Cell y coordinate.
        y: i64,
    },

    /// A genesis value is out of range.
    #[error("invalid world definition: {reason}")]
    Invalid {
        /// Explanation of what is wrong.
        reason: String,
    },

    /// A checked arithmetic operation overflowed.
    #[error("arithmetic overflow in world update")]
    ArithmeticOverflow,
}
