//! Typed domain separators for every hash the kernel computes.
//!
//! Each [`HashDomain`] maps to a BLAKE3 key-derivation context string, so two
//! purposes can never produce colliding digests from the same input bytes.
//! The context strings carry the algorithm version; changing any of them is
//! a new hash algorithm and requires a new genesis configuration.

use crate::digest::Digest;

/// Version of the hashing scheme (BLAKE3 with the contexts below).
pub const HASH_ALGORITHM_VERSION: u32 = 1;

/// Purpose of a hash computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HashDomain {
    /// Anchor that precedes `WorldHash(0)`, derived from the genesis state.
    GenesisAnchor,
    /// One link of the per-tick world hash chain.
    WorldChain,
    /// One link of the event log record chain.
    EventRecord,
    /// Storage-level checksum over a snapshot's fields.
    SnapshotChecksum,
    /// Fingerprint of the genesis configuration.
    GenesisFingerprint,
    /// Key derivation for a single RNG stream.
    RngStreamKey,
}

impl HashDomain {
    /// All domains in declaration order.
    pub const ALL: &[Self] = &[
        Self::GenesisAnchor,
        Self::WorldChain,
        Self::EventRecord,
        Self::SnapshotChecksum,
        Self::GenesisFingerprint,
        Self::RngStreamKey,
    ];

    /// The BLAKE3 derive-key context for this domain.
    pub const fn context(self) -> &'static str {
        match self {
            Self::GenesisAnchor => "lockstep kernel v1 genesis anchor",
            Self::WorldChain => "lockstep kernel v1 world hash chain",
            Self::EventRecord => "lockstep kernel v1 event log record",
            Self::SnapshotChecksum => "lockstep kernel v1 snapshot checksum",
            Self::GenesisFingerprint => "lockstep kernel v1 genesis fingerprint",
            Self::RngStreamKey => "lockstep kernel v1 rng stream key",
        }
    }
}

impl core::fmt::Display for HashDomain {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.context())
    }
}

/// Hash the concatenation of `parts` under `domain`.
///
/// Parts are fed to the hasher in order without separators; callers that
/// hash variable-length parts must make them self-delimiting (canonical
/// encodings are).
pub fn hash_parts(domain: HashDomain, parts: &[&[u8]]) -> Digest {
    let mut hasher = blake3::Hasher::new_derive_key(domain.context());
    for part in parts {
        hasher.update(part);
    }
    Digest::from(hasher.finalize())
}

/// Derive a 32-byte key from `material` under `domain`.
pub fn derive_key(domain: HashDomain, material: &[u8]) -> [u8; 32] {
    blake3::derive_key(domain.context(), material)
}
