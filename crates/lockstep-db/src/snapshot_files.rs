//! Snapshot persistence on the local filesystem.
//!
//! Each snapshot is one pretty-printed JSON document named
//! `snapshot_{tick:012}_{uuid}.json`. The uuid is v7, so lexical order of
//! the file names is tick order, and within a tick, write order. Files are
//! opened with create-new semantics and synced before the id is returned;
//! an existing file is never rewritten.

use std::fs::{self, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use lockstep_core::snapshot::{Snapshot, SnapshotError, SnapshotStore, StorageId};
use lockstep_hash::Digest;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::StoreError;

const PREFIX: &str = "snapshot_";
const SUFFIX: &str = ".json";

/// A [`SnapshotStore`] backed by a directory of JSON files.
#[derive(Debug, Clone)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    /// Open (and create if needed) a snapshot directory.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be created.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|e| StoreError::io(&dir, e))?;
        Ok(Self { dir })
    }

    /// The directory holding the snapshots.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a snapshot and return its storage id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] or [`StoreError::Io`].
    pub fn write(&self, snapshot: &Snapshot) -> Result<StorageId, StoreError> {
        let name = format!("{PREFIX}{:012}_{}{SUFFIX}", snapshot.tick, Uuid::now_v7());
        let path = self.dir.join(&name);
        let bytes = serde_json::to_vec_pretty(snapshot)?;

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .map_err(|e| StoreError::io(&path, e))?;
        file.write_all(&bytes)
            .map_err(|e| StoreError::io(&path, e))?;
        file.sync_all().map_err(|e| StoreError::io(&path, e))?;

        info!(
            tick = snapshot.tick,
            world_hash = %snapshot.world_hash,
            file = %name,
            "Snapshot written"
        );
        Ok(StorageId(name))
    }

    /// Read a snapshot by id. The snapshot is not verified.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::NotFound`] (wrapped) for an unknown or
    /// malformed id, [`StoreError::Io`] or [`StoreError::Serialization`]
    /// otherwise.
    pub fn read(&self, id: &StorageId) -> Result<Snapshot, StoreError> {
        if !is_snapshot_name(&id.0) {
            return Err(SnapshotError::NotFound { id: id.clone() }.into());
        }
        let path = self.dir.join(&id.0);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SnapshotError::NotFound { id: id.clone() }.into());
            }
            Err(e) => return Err(StoreError::io(&path, e)),
        };
        let snapshot = serde_json::from_slice(&bytes)?;
        debug!(file = %id, "Snapshot read");
        Ok(snapshot)
    }

    /// Every stored snapshot id, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be listed.
    pub fn list(&self) -> Result<Vec<StorageId>, StoreError> {
        let entries = fs::read_dir(&self.dir).map_err(|e| StoreError::io(&self.dir, e))?;
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.dir, e))?;
            if let Some(name) = entry.file_name().to_str()
                && is_snapshot_name(name)
            {
                ids.push(StorageId(name.to_owned()));
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// The newest snapshot on disk, without verification.
    ///
    /// # Errors
    ///
    /// Returns the error from listing or reading the newest file.
    pub fn latest(&self) -> Result<Option<(StorageId, Snapshot)>, StoreError> {
        let Some(id) = self.list()?.pop() else {
            return Ok(None);
        };
        let snapshot = self.read(&id)?;
        Ok(Some((id, snapshot)))
    }

    /// The newest snapshot that verifies against `fingerprint`.
    ///
    /// Files that fail to parse or verify are skipped with a warning and
    /// the next older one is tried. Returns `None` if nothing verifies.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the directory cannot be listed.
    pub fn latest_verified(&self, fingerprint: Digest) -> Result<Option<Snapshot>, StoreError> {
        for id in self.list()?.into_iter().rev() {
            let snapshot = match self.read(&id) {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    warn!(file = %id, error = %e, "Unreadable snapshot refused");
                    continue;
                }
            };
            match snapshot.verify(fingerprint) {
                Ok(_) => return Ok(Some(snapshot)),
                Err(e) => warn!(file = %id, error = %e, "Snapshot failed verification"),
            }
        }
        Ok(None)
    }
}

impl SnapshotStore for FileSnapshotStore {
    fn persist(&mut self, snapshot: &Snapshot) -> Result<StorageId, SnapshotError> {
        self.write(snapshot).map_err(into_snapshot_error)
    }

    fn load(&self, id: &StorageId) -> Result<Snapshot, SnapshotError> {
        self.read(id).map_err(into_snapshot_error)
    }
}

fn into_snapshot_error(err: StoreError) -> SnapshotError {
    match err {
        StoreError::Snapshot(inner) => inner,
        other => SnapshotError::Storage {
            reason: other.to_string(),
        },
    }
}

/// Whether `name` is a bare snapshot file name (no directories).
fn is_snapshot_name(name: &str) -> bool {
    name.starts_with(PREFIX)
        && name.ends_with(SUFFIX)
        && !name.contains(['/', '\\'])
        && !name.contains("..")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_bare_snapshot_names_are_accepted() {
        assert!(is_snapshot_name("snapshot_000000000004_abc.json"));
        assert!(!is_snapshot_name("events.jsonl"));
        assert!(!is_snapshot_name("snapshot_../../etc/passwd.json"));
        assert!(!is_snapshot_name("snapshot_a/b.json"));
    }
}
