//! Event sourcing for the Lockstep kernel.
//!
//! Accepted inputs are the source of truth: state at any tick can be
//! reconstructed by replaying them from genesis or from a snapshot. This
//! crate holds the append-only, hash-chained [`EventLog`] and the bounded
//! [`Ingress`] queue producers submit into.
//!
//! # Modules
//!
//! - [`log`] -- The [`EventLog`], its [`LogRecord`]s, and the
//!   [`InputSource`] trait the authority pipeline reads through.
//! - [`ingress`] -- Bounded multi-producer queue drained between ticks.
//! - [`error`] -- [`EventLogError`] and [`SubmitError`].

pub mod error;
pub mod ingress;
pub mod log;

pub use error::{EventLogError, SubmitError};
pub use ingress::{DrainReport, Ingress, IngressReceiver, ingress};
pub use log::{EventLog, InputSource, LogRecord, verify_records};
