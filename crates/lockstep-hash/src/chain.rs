//! The per-tick world hash chain.
//!
//! ```text
//! anchor       = H(GenesisAnchor, genesis_bytes)
//! WorldHash(0) = H(WorldChain, anchor || bytes(state_0))
//! WorldHash(t) = H(WorldChain, WorldHash(t-1) || bytes(state_t))
//! ```

use crate::digest::Digest;
use crate::domain::{HashDomain, hash_parts};

/// Running head of a world hash chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashChain {
    head: Digest,
}

impl HashChain {
    /// Start a chain at the anchor derived from the genesis bytes.
    pub fn genesis(genesis_bytes: &[u8]) -> Self {
        Self {
            head: Self::anchor(genesis_bytes),
        }
    }

    /// Resume a chain whose last link is `head`.
    pub const fn resume(head: Digest) -> Self {
        Self { head }
    }

    /// The anchor that precedes `WorldHash(0)`.
    pub fn anchor(genesis_bytes: &[u8]) -> Digest {
        hash_parts(HashDomain::GenesisAnchor, &[genesis_bytes])
    }

    /// Compute the link after `prev` without mutating any chain.
    pub fn link(prev: &Digest, state_bytes: &[u8]) -> Digest {
        hash_parts(HashDomain::WorldChain, &[prev.as_bytes(), state_bytes])
    }

    /// Append one state and return the new head.
    pub fn advance(&mut self, state_bytes: &[u8]) -> Digest {
        self.head = Self::link(&self.head, state_bytes);
        self.head
    }

    /// Current head digest.
    pub const fn head(&self) -> Digest {
        self.head
    }
}
