//! Durable storage for the Lockstep kernel.
//!
//! The kernel itself keeps everything in memory. This crate gives the
//! engine binary somewhere to put what must survive a restart: snapshots
//! of the authoritative state and the accepted input history.
//!
//! ```text
//! Engine
//!     |
//!     +-- accepted inputs ---> EventJournal       (JSON Lines, append-only)
//!     |
//!     +-- cadence ticks -----> FileSnapshotStore  (one JSON file per snapshot)
//!     |
//!     +-- observations ------> ObservationFeed    (JSON Lines, append-only)
//! ```
//!
//! All three are write-once. Nothing here is consulted while a tick is
//! computed; snapshots and the journal are read back only at boot.
//!
//! # Modules
//!
//! - [`snapshot_files`] -- [`FileSnapshotStore`], a [`SnapshotStore`] over a directory
//! - [`journal`] -- [`EventJournal`], the on-disk form of the event log
//! - [`observation_feed`] -- [`ObservationFeed`], derived output for consumers
//! - [`error`] -- Shared error types
//!
//! [`SnapshotStore`]: lockstep_core::snapshot::SnapshotStore

pub mod error;
pub mod journal;
pub mod observation_feed;
pub mod snapshot_files;

// Re-export primary types for convenience.
pub use error::StoreError;
pub use journal::{EventJournal, JournalEntry, read_entries};
pub use observation_feed::{ObservationFeed, read_observations};
pub use snapshot_files::FileSnapshotStore;
