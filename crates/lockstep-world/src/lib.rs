//! Reference world model for the Lockstep kernel.
//!
//! A deliberately small authoritative state: a bounded grid, entities with
//! position, energy, stock, and an optional goal, regenerating resource
//! nodes, and a governance policy table. It gives the authority pipeline's
//! passes something to accept, mutate, or veto. It is not a content system.
//!
//! Every collection is a `BTreeMap` so iteration, diffs, and the canonical
//! encoding are in key order.
//!
//! # Modules
//!
//! - [`state`] -- [`WorldState`] and its parts, with canonical encodings.
//! - [`resource`] -- Regeneration and harvesting for [`ResourceNode`]s.
//! - [`genesis`] -- [`WorldSpec`], the configuration form of a genesis world.
//! - [`diff`] -- Field-level diffs between two states.
//! - [`error`] -- [`WorldError`].

pub mod diff;
pub mod error;
pub mod genesis;
pub mod resource;
pub mod state;

pub use diff::diff_states;
pub use error::WorldError;
pub use genesis::{EntitySpec, NodeSpec, WorldSpec};
pub use state::{Bounds, Entity, PolicyTable, Position, ResourceNode, WorldRules, WorldState};
