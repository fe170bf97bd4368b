//! Type-safe identifier wrappers around `u64`.
//!
//! Identifiers are plain integers rather than UUIDs: they are part of the
//! authoritative state, so they must be assigned deterministically (by the
//! genesis configuration or by producers) and never generated from a clock
//! or an OS entropy source.

use lockstep_hash::{Canonical, CanonicalError, Decoder, Encoder};
use serde::{Deserialize, Serialize};

/// Generates a newtype wrapper around `u64` with standard derives and a
/// canonical encoding.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Return the inner value.
            pub const fn into_inner(self) -> u64 {
                self.0
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for u64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl Canonical for $name {
            fn encode(&self, enc: &mut Encoder) -> Result<(), CanonicalError> {
                enc.put_u64(self.0);
                Ok(())
            }

            fn decode(dec: &mut Decoder<'_>) -> Result<Self, CanonicalError> {
                Ok(Self(dec.get_u64()?))
            }
        }
    };
}

define_id! {
    /// Identifier for an entity in the world.
    EntityId
}

define_id! {
    /// Identifier for an input producer.
    ///
    /// Source `0` is reserved for the kernel itself; external events that
    /// claim it are rejected.
    SourceId
}

define_id! {
    /// Identifier for a governance zone.
    ZoneId
}

impl SourceId {
    /// The reserved kernel source.
    pub const KERNEL: Self = Self(0);

    /// Whether this is the reserved kernel source.
    pub const fn is_reserved(self) -> bool {
        self.0 == Self::KERNEL.0
    }
}
