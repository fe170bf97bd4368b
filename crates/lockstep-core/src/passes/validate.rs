//! The Validate stage.
//!
//! Rejections are local: the input is dropped with a [`RejectionReason`],
//! an observation is emitted, and the tick continues. A rejected input never
//! reaches an Apply pass and never touches an RNG stream.

use lockstep_types::{InputEvent, RejectionReason};
use lockstep_world::WorldState;

/// Why an input was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Closed reason.
    pub reason: RejectionReason,
    /// Human-readable detail for the observation.
    pub detail: String,
}

impl Rejection {
    fn new(reason: RejectionReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

/// Check an input against the tick being computed and the committed world.
///
/// # Errors
///
/// Returns the first [`Rejection`] found, in this order: wrong tick,
/// reserved source, malformed payload, unknown entity.
pub fn validate_input(event: &InputEvent, tick: u64, world: &WorldState) -> Result<(), Rejection> {
    if event.tick != tick {
        return Err(Rejection::new(
            RejectionReason::TickMismatch,
            format!("event for tick {} offered at tick {tick}", event.tick),
        ));
    }
    if event.source_id.is_reserved() {
        return Err(Rejection::new(
            RejectionReason::ReservedSource,
            format!("source {} is reserved for the kernel", event.source_id),
        ));
    }
    event
        .action
        .check_structure()
        .map_err(|detail| Rejection::new(RejectionReason::InvalidPayload, detail))?;
    if let Some(missing) = event
        .action
        .entities()
        .into_iter()
        .find(|id| !world.has_entity(*id))
    {
        return Err(Rejection::new(
            RejectionReason::UnknownEntity,
            format!("entity {missing} does not exist"),
        ));
    }
    Ok(())
}
