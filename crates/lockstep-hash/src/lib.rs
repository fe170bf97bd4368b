//! Canonical encoding and hash chains for the Lockstep kernel.
//!
//! Everything that is fingerprinted in the kernel goes through this crate:
//! authoritative state, event log records, snapshot checksums, and the
//! genesis configuration. There is exactly one byte encoding
//! ([`canonical`]) and one hash function (BLAKE3) selected per purpose by a
//! typed [`HashDomain`].
//!
//! # Modules
//!
//! - [`digest`] -- The 32-byte [`Digest`] value and hex helpers.
//! - [`domain`] -- Versioned domain separators and the hashing entry points.
//! - [`canonical`] -- The [`Canonical`] trait with its [`Encoder`] and
//!   [`Decoder`].
//! - [`chain`] -- The [`HashChain`] used for the per-tick world hash.

pub mod canonical;
pub mod chain;
pub mod digest;
pub mod domain;

pub use canonical::{
    CANONICAL_FORMAT_VERSION, Canonical, CanonicalError, Decoder, Encoder, from_canonical_bytes,
    to_canonical_bytes,
};
pub use chain::HashChain;
pub use digest::{Digest, hex_bytes};
pub use domain::{HASH_ALGORITHM_VERSION, HashDomain, derive_key, hash_parts};
