//! Shared type definitions for the Lockstep kernel.
//!
//! Every type that crosses a crate boundary lives here, together with its
//! canonical encoding. Anything that feeds the world hash or the event log
//! chain implements [`lockstep_hash::Canonical`].
//!
//! # Modules
//!
//! - [`ids`] -- Integer identifier newtypes (entities, sources, zones)
//! - [`enums`] -- Closed enumerations (subsystems, veto and rejection reasons)
//! - [`action`] -- The closed [`Action`] enum and the [`Area`] rectangle
//! - [`input`] -- [`InputEvent`] and its ordering key [`EventKey`]
//! - [`observation`] -- Derived, non-authoritative [`ObservationEvent`]s

pub mod action;
pub mod enums;
pub mod ids;
pub mod input;
pub mod observation;

pub use action::{Action, Area};
pub use enums::{RejectionReason, Subsystem, VetoReason};
pub use ids::{EntityId, SourceId, ZoneId};
pub use input::{EventKey, InputEvent};
pub use observation::{DiffEntry, DrawSummary, ObservationEvent, ObservationPayload};
