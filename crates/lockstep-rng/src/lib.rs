//! Deterministic randomness for the Lockstep kernel.
//!
//! All randomness in authoritative logic comes from an explicit
//! [`RngStreamManager`] owned by the authority pipeline and passed by
//! reference into each pass. There is no global generator.
//!
//! Each declared `(subsystem, stream_id)` pair gets its own ChaCha20 key,
//! derived from the root seed with BLAKE3. Output `n` of a stream is a pure
//! function of `(seed_key, n)`, so a stream restored at a stored counter
//! reproduces the same forward sequence.
//!
//! # Modules
//!
//! - [`stream`] -- A single keyed [`RngStream`].
//! - [`manager`] -- [`RngStreamManager`] with staging, commit, and abort.
//! - [`audit`] -- The append-only [`RngAuditLog`] and [`AuditQuery`].
//! - [`error`] -- [`RngError`].

pub mod audit;
pub mod error;
pub mod manager;
pub mod stream;

pub use audit::{AuditQuery, RngAuditLog, RngAuditRecord, summarize_draws};
pub use error::RngError;
pub use manager::{RngStreamManager, StreamCounter, StreamKey};
pub use stream::RngStream;
