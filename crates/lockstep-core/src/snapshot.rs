//! Snapshot format, verification, and the storage interface.
//!
//! A [`Snapshot`] is written every `snapshot_cadence` ticks and is immutable
//! once persisted. It carries the canonical state bytes, the RNG counters in
//! clear, the two world hashes needed to re-check the chain link, and a
//! storage checksum independent of the world-hash chain. Snapshots chain to
//! one another through `prev_checkpoint_hash`.
//!
//! Loading runs [`Snapshot::verify`] before anything is trusted:
//! format version, checksum, genesis fingerprint, world-hash link, decoded
//! tick, decoded counters.

use std::collections::BTreeMap;

use lockstep_hash::{
    Canonical, CanonicalError, Digest, Encoder, HashChain, HashDomain, from_canonical_bytes,
    hash_parts,
};
use lockstep_rng::{StreamCounter, StreamKey};
use serde::{Deserialize, Serialize};

use crate::genesis::AuthoritativeState;

/// Version of the snapshot document layout.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

/// Errors raised while verifying, storing, or loading snapshots.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SnapshotError {
    /// The snapshot was written by an unknown format version.
    #[error("unsupported snapshot format version {found} (expected {expected})")]
    FormatVersion {
        /// Version in the document.
        found: u32,
        /// Version this build writes.
        expected: u32,
    },

    /// The storage checksum does not match the snapshot's fields.
    #[error("snapshot checksum mismatch at tick {tick}")]
    ChecksumMismatch {
        /// Tick the snapshot claims.
        tick: u64,
    },

    /// The snapshot belongs to a different genesis.
    #[error("snapshot genesis fingerprint {found} does not match {expected}")]
    FingerprintMismatch {
        /// Fingerprint in the document.
        found: Digest,
        /// Fingerprint of the running genesis.
        expected: Digest,
    },

    /// `world_hash` is not the chain link of the stored bytes.
    #[error("snapshot world hash does not match its state at tick {tick}")]
    WorldHashMismatch {
        /// Tick the snapshot claims.
        tick: u64,
    },

    /// The decoded state belongs to a different tick.
    #[error("snapshot claims tick {claimed} but its state is tick {decoded}")]
    TickMismatch {
        /// Tick in the document.
        claimed: u64,
        /// Tick inside the canonical state.
        decoded: u64,
    },

    /// The clear counters disagree with those inside the state bytes.
    #[error("snapshot rng counters disagree with its state at tick {tick}")]
    CounterMismatch {
        /// Tick the snapshot claims.
        tick: u64,
    },

    /// The state bytes are not a canonical encoding.
    #[error("snapshot state could not be decoded: {source}")]
    Decode {
        /// The underlying codec error.
        #[from]
        source: CanonicalError,
    },

    /// Two consecutive snapshots do not link.
    #[error("snapshot chain broken at tick {tick}")]
    ChainBroken {
        /// Tick of the first snapshot that fails to link.
        tick: u64,
    },

    /// No snapshot is stored under the id.
    #[error("snapshot {id} not found")]
    NotFound {
        /// The requested id.
        id: StorageId,
    },

    /// The backing store failed.
    #[error("snapshot storage failure: {reason}")]
    Storage {
        /// Explanation of the failure.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Snapshot document
// ---------------------------------------------------------------------------

/// A persisted checkpoint of the authoritative state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Layout version, [`SNAPSHOT_FORMAT_VERSION`] when written.
    pub format_version: u32,
    /// Fingerprint of the genesis that produced this run.
    pub genesis_fingerprint: Digest,
    /// Tick of the captured state.
    pub tick: u64,
    /// Canonical bytes of the [`AuthoritativeState`].
    #[serde(with = "lockstep_hash::hex_bytes")]
    pub canonical_state_bytes: Vec<u8>,
    /// Draw counter of every declared stream.
    pub rng_stream_counters: Vec<StreamCounter>,
    /// `WorldHash(tick - 1)`, or the genesis anchor at tick 0.
    pub prev_world_hash: Digest,
    /// `WorldHash(tick)`.
    pub world_hash: Digest,
    /// Checksum of the previous snapshot, zero for the first.
    pub prev_checkpoint_hash: Digest,
    /// Storage checksum over every other field.
    pub checksum: Digest,
}

/// Fields of a snapshot before its checksum is computed.
#[derive(Debug, Clone)]
pub struct SnapshotParts {
    /// Genesis fingerprint.
    pub genesis_fingerprint: Digest,
    /// Tick of the captured state.
    pub tick: u64,
    /// Canonical state bytes.
    pub canonical_state_bytes: Vec<u8>,
    /// Stream counters.
    pub rng_stream_counters: Vec<StreamCounter>,
    /// Previous world hash.
    pub prev_world_hash: Digest,
    /// World hash at `tick`.
    pub world_hash: Digest,
    /// Checksum of the previous snapshot.
    pub prev_checkpoint_hash: Digest,
}

impl Snapshot {
    /// Seal the parts with a checksum.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError`] if the fields cannot be encoded.
    pub fn seal(parts: SnapshotParts) -> Result<Self, CanonicalError> {
        let mut snapshot = Self {
            format_version: SNAPSHOT_FORMAT_VERSION,
            genesis_fingerprint: parts.genesis_fingerprint,
            tick: parts.tick,
            canonical_state_bytes: parts.canonical_state_bytes,
            rng_stream_counters: parts.rng_stream_counters,
            prev_world_hash: parts.prev_world_hash,
            world_hash: parts.world_hash,
            prev_checkpoint_hash: parts.prev_checkpoint_hash,
            checksum: Digest::ZERO,
        };
        snapshot.checksum = snapshot.compute_checksum()?;
        Ok(snapshot)
    }

    /// Recompute the storage checksum from every field except `checksum`.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError`] if the fields cannot be encoded.
    pub fn compute_checksum(&self) -> Result<Digest, CanonicalError> {
        let mut enc = Encoder::new();
        enc.put_u32(self.format_version);
        self.genesis_fingerprint.encode(&mut enc)?;
        enc.put_u64(self.tick);
        enc.put_bytes(&self.canonical_state_bytes)?;
        enc.put_len(self.rng_stream_counters.len())?;
        for counter in &self.rng_stream_counters {
            counter.subsystem.encode(&mut enc)?;
            enc.put_u32(counter.stream_id);
            enc.put_u64(counter.counter);
        }
        self.prev_world_hash.encode(&mut enc)?;
        self.world_hash.encode(&mut enc)?;
        self.prev_checkpoint_hash.encode(&mut enc)?;
        Ok(hash_parts(HashDomain::SnapshotChecksum, &[&enc.into_bytes()]))
    }

    /// The clear counters as a map, or `None` if a stream appears twice.
    fn counter_map(&self) -> Option<BTreeMap<StreamKey, u64>> {
        let map: BTreeMap<StreamKey, u64> = self
            .rng_stream_counters
            .iter()
            .map(|c| (StreamKey::new(c.subsystem, c.stream_id), c.counter))
            .collect();
        (map.len() == self.rng_stream_counters.len()).then_some(map)
    }

    /// Verify the snapshot against the running genesis and decode its state.
    ///
    /// # Errors
    ///
    /// Returns the first [`SnapshotError`] found. A snapshot that fails any
    /// check must not be resumed.
    pub fn verify(&self, genesis_fingerprint: Digest) -> Result<AuthoritativeState, SnapshotError> {
        if self.format_version != SNAPSHOT_FORMAT_VERSION {
            return Err(SnapshotError::FormatVersion {
                found: self.format_version,
                expected: SNAPSHOT_FORMAT_VERSION,
            });
        }
        if self.compute_checksum()? != self.checksum {
            return Err(SnapshotError::ChecksumMismatch { tick: self.tick });
        }
        if self.genesis_fingerprint != genesis_fingerprint {
            return Err(SnapshotError::FingerprintMismatch {
                found: self.genesis_fingerprint,
                expected: genesis_fingerprint,
            });
        }
        if HashChain::link(&self.prev_world_hash, &self.canonical_state_bytes) != self.world_hash {
            return Err(SnapshotError::WorldHashMismatch { tick: self.tick });
        }
        let state: AuthoritativeState = from_canonical_bytes(&self.canonical_state_bytes)?;
        if state.tick != self.tick {
            return Err(SnapshotError::TickMismatch {
                claimed: self.tick,
                decoded: state.tick,
            });
        }
        if self.counter_map().as_ref() != Some(&state.counters) {
            return Err(SnapshotError::CounterMismatch { tick: self.tick });
        }
        Ok(state)
    }
}

/// Verify a run of snapshots in tick order and check that each links to the
/// one before it.
///
/// # Errors
///
/// Returns the first verification failure, or
/// [`SnapshotError::ChainBroken`] naming the first snapshot that does not
/// link to its predecessor.
pub fn verify_snapshot_chain(
    snapshots: &[Snapshot],
    genesis_fingerprint: Digest,
) -> Result<(), SnapshotError> {
    let mut previous: Option<&Snapshot> = None;
    for snapshot in snapshots {
        snapshot.verify(genesis_fingerprint)?;
        let linked = match previous {
            Some(prev) => {
                snapshot.tick > prev.tick && snapshot.prev_checkpoint_hash == prev.checksum
            }
            None => snapshot.tick != 0 || snapshot.prev_checkpoint_hash.is_zero(),
        };
        if !linked {
            return Err(SnapshotError::ChainBroken { tick: snapshot.tick });
        }
        previous = Some(snapshot);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Storage interface
// ---------------------------------------------------------------------------

/// Opaque identifier a store hands back from [`SnapshotStore::persist`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageId(pub String);

impl core::fmt::Display for StorageId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Write-once snapshot storage.
pub trait SnapshotStore {
    /// Persist a snapshot. Never overwrites an existing one.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::Storage`] if the write fails.
    fn persist(&mut self, snapshot: &Snapshot) -> Result<StorageId, SnapshotError>;

    /// Load a snapshot by id. The caller verifies it.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::NotFound`] or [`SnapshotError::Storage`].
    fn load(&self, id: &StorageId) -> Result<Snapshot, SnapshotError>;
}

/// In-memory store, for tests and embedders that persist elsewhere.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotStore {
    snapshots: BTreeMap<StorageId, Snapshot>,
}

impl MemorySnapshotStore {
    /// An empty store.
    pub const fn new() -> Self {
        Self {
            snapshots: BTreeMap::new(),
        }
    }

    /// Number of stored snapshots.
    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// The stored snapshot with the highest tick.
    pub fn latest(&self) -> Option<&Snapshot> {
        self.snapshots.values().max_by_key(|s| s.tick)
    }
}

impl SnapshotStore for MemorySnapshotStore {
    fn persist(&mut self, snapshot: &Snapshot) -> Result<StorageId, SnapshotError> {
        let id = StorageId(format!("mem-{:012}-{}", snapshot.tick, snapshot.checksum.short()));
        if self.snapshots.contains_key(&id) {
            return Err(SnapshotError::Storage {
                reason: format!("snapshot {id} already exists"),
            });
        }
        self.snapshots.insert(id.clone(), snapshot.clone());
        Ok(id)
    }

    fn load(&self, id: &StorageId) -> Result<Snapshot, SnapshotError> {
        self.snapshots
            .get(id)
            .cloned()
            .ok_or_else(|| SnapshotError::NotFound { id: id.clone() })
    }
}
