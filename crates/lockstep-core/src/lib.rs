//! Authority pipeline, snapshots, and replay for the Lockstep kernel.
//!
//! This crate owns the single-writer tick loop. Each call to
//! [`AuthorityPipeline::tick`] advances the world by exactly one tick through
//! a fixed pass order: Fetch, Validate, Apply (Physics, Biology, Cognition,
//! Governance), Diff, Emit, the Environment world step, Hash, and
//! Append-checkpoint, with a snapshot every `snapshot_cadence` ticks.
//!
//! # Modules
//!
//! - [`clock`] -- [`TickClock`], the only admissible time value.
//! - [`config`] -- Configuration loading from `lockstep-config.yaml` into
//!   strongly-typed structs.
//! - [`genesis`] -- [`Genesis`] and the hashed [`AuthoritativeState`].
//! - [`passes`] -- The [`ApplyPass`] trait and the four Apply passes.
//! - [`tick`] -- The [`AuthorityPipeline`] and [`DivergenceReport`].
//! - [`snapshot`] -- [`Snapshot`] format, verification, and the
//!   [`SnapshotStore`] interface.
//! - [`replay`] -- Full and snapshot-based replay, divergence search.
//! - [`runner`] -- Wall-clock scheduling around the pipeline.
//! - [`error`] -- [`KernelError`].
//!
//! [`TickClock`]: clock::TickClock
//! [`Genesis`]: genesis::Genesis
//! [`AuthoritativeState`]: genesis::AuthoritativeState
//! [`ApplyPass`]: passes::ApplyPass
//! [`AuthorityPipeline`]: tick::AuthorityPipeline
//! [`AuthorityPipeline::tick`]: tick::AuthorityPipeline::tick
//! [`DivergenceReport`]: tick::DivergenceReport
//! [`Snapshot`]: snapshot::Snapshot
//! [`SnapshotStore`]: snapshot::SnapshotStore
//! [`KernelError`]: error::KernelError

pub mod clock;
pub mod config;
pub mod error;
pub mod genesis;
pub mod passes;
pub mod replay;
pub mod runner;
pub mod snapshot;
pub mod tick;
