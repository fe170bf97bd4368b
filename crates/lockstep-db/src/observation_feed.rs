//! Append-only feed of observation events.
//!
//! Observations are derived output: one JSON line per
//! [`ObservationEvent`], in emission order. They are never read back by
//! the kernel and never hashed. A restarted engine keeps appending, so ids
//! restart with each run.

use std::fs::{self, File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use lockstep_types::ObservationEvent;
use tracing::{debug, info};

use crate::error::StoreError;

/// Writer for a JSON Lines observation feed.
#[derive(Debug)]
pub struct ObservationFeed {
    path: PathBuf,
    file: File,
    written: u64,
}

impl ObservationFeed {
    /// Open a feed for appending, creating it and its directory if missing.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file cannot be opened.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StoreError::io(&path, e))?;

        info!(path = %path.display(), "Observation feed opened");
        Ok(Self {
            path,
            file,
            written: 0,
        })
    }

    /// Observations written since this feed was opened.
    pub const fn written(&self) -> u64 {
        self.written
    }

    /// Append observations in order. Returns the number written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] or [`StoreError::Io`].
    pub fn append(&mut self, events: &[ObservationEvent]) -> Result<usize, StoreError> {
        if events.is_empty() {
            return Ok(0);
        }
        let mut buf = Vec::new();
        for event in events {
            serde_json::to_writer(&mut buf, event)?;
            buf.push(b'\n');
        }
        self.file
            .write_all(&buf)
            .map_err(|e| StoreError::io(&self.path, e))?;
        self.file.flush().map_err(|e| StoreError::io(&self.path, e))?;

        let count = u64::try_from(events.len()).unwrap_or(u64::MAX);
        self.written = self.written.saturating_add(count);
        debug!(written = events.len(), total = self.written, "Observations appended");
        Ok(events.len())
    }
}

/// Parse every line of an observation feed.
///
/// # Errors
///
/// Returns [`StoreError::CorruptJournal`] naming the first bad line, or
/// [`StoreError::Io`] if the file cannot be read.
pub fn read_observations(path: &Path) -> Result<Vec<ObservationEvent>, StoreError> {
    let contents = fs::read_to_string(path).map_err(|e| StoreError::io(path, e))?;
    (1_usize..)
        .zip(contents.lines())
        .map(|(line, text)| {
            serde_json::from_str(text).map_err(|e| StoreError::CorruptJournal {
                line,
                reason: e.to_string(),
            })
        })
        .collect()
}
