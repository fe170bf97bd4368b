//! Closed enumerations shared across the kernel.
//!
//! Each enum carries a stable one-byte canonical tag. Tags are part of the
//! hashed byte layout and must never be renumbered.

use lockstep_hash::{Canonical, CanonicalError, Decoder, Encoder};
use serde::{Deserialize, Serialize};

/// Implements [`Canonical`] for a fieldless enum with explicit tags.
macro_rules! canonical_tags {
    ($name:ident { $($variant:ident = $tag:literal),+ $(,)? }) => {
        impl $name {
            /// Stable canonical tag for this variant.
            pub const fn tag(self) -> u8 {
                match self {
                    $(Self::$variant => $tag,)+
                }
            }

            /// Look up a variant by its canonical tag.
            pub const fn from_tag(tag: u8) -> Option<Self> {
                match tag {
                    $($tag => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }

        impl Canonical for $name {
            fn encode(&self, enc: &mut Encoder) -> Result<(), CanonicalError> {
                enc.put_u8(self.tag());
                Ok(())
            }

            fn decode(dec: &mut Decoder<'_>) -> Result<Self, CanonicalError> {
                let offset = dec.offset();
                let tag = dec.get_u8()?;
                Self::from_tag(tag).ok_or(CanonicalError::UnknownTag {
                    kind: stringify!($name),
                    tag,
                    offset,
                })
            }
        }
    };
}

// ---------------------------------------------------------------------------
// Subsystems
// ---------------------------------------------------------------------------

/// A logical subsystem that owns RNG streams and an Apply pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Subsystem {
    /// Movement and spatial bounds.
    Physics,
    /// Energy, resources, and survival vetoes.
    Biology,
    /// Planning and goal selection.
    Cognition,
    /// Policy enforcement.
    Governance,
    /// The per-tick world step (resource regeneration).
    Environment,
}

canonical_tags!(Subsystem {
    Physics = 1,
    Biology = 2,
    Cognition = 3,
    Governance = 4,
    Environment = 5,
});

impl Subsystem {
    /// All subsystems in tag order.
    pub const ALL: [Self; 5] = [
        Self::Physics,
        Self::Biology,
        Self::Cognition,
        Self::Governance,
        Self::Environment,
    ];

    /// Lowercase name used in logs and configuration.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Physics => "physics",
            Self::Biology => "biology",
            Self::Cognition => "cognition",
            Self::Governance => "governance",
            Self::Environment => "environment",
        }
    }
}

impl core::fmt::Display for Subsystem {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.name())
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Why an Apply pass refused an otherwise well-formed action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VetoReason {
    /// The action would leave the world bounds.
    OutOfBounds,
    /// The target is not adjacent to the actor.
    OutOfReach,
    /// The actor lacks the energy to perform the action.
    InsufficientEnergy,
    /// The actor or the resource node lacks the stock required.
    InsufficientStock,
    /// A governance policy forbids the action.
    PolicyViolation,
}

canonical_tags!(VetoReason {
    OutOfBounds = 1,
    OutOfReach = 2,
    InsufficientEnergy = 3,
    InsufficientStock = 4,
    PolicyViolation = 5,
});

/// Why the Validate pass refused an input before it reached Apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// The event's tick is not the tick being processed.
    TickMismatch,
    /// The event claims the reserved kernel source.
    ReservedSource,
    /// The event names an entity that does not exist.
    UnknownEntity,
    /// The payload is structurally invalid.
    InvalidPayload,
}

canonical_tags!(RejectionReason {
    TickMismatch = 1,
    ReservedSource = 2,
    UnknownEntity = 3,
    InvalidPayload = 4,
});
