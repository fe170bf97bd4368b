//! Append-only journal of accepted inputs.
//!
//! The journal is the durable form of the [`EventLog`]: one JSON line per
//! [`LogRecord`], in arrival order, each stamped with the wall-clock time
//! it was written. The timestamp is for operators only and never enters a
//! hash.
//!
//! Reopening a journal rebuilds the log and re-verifies its hash chain. A
//! line that does not parse, a broken link, or a duplicated key is an
//! error; the journal is never repaired silently.

use std::fs::{self, File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use lockstep_events::{EventLog, LogRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::StoreError;

/// One journal line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// When the line was written. Not authoritative.
    pub received_at: DateTime<Utc>,
    /// The chained log record.
    pub record: LogRecord,
}

/// Writer for a JSON Lines journal.
#[derive(Debug)]
pub struct EventJournal {
    path: PathBuf,
    file: File,
    next_position: u64,
}

impl EventJournal {
    /// Open a journal, creating it if missing, and rebuild the event log it
    /// holds.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::CorruptJournal`] for an unparseable line,
    /// [`StoreError::EventLog`] if the records do not chain, or
    /// [`StoreError::Io`].
    pub fn open(path: impl Into<PathBuf>) -> Result<(Self, EventLog), StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;
        }

        let records: Vec<LogRecord> = if path.exists() {
            read_entries(&path)?.into_iter().map(|e| e.record).collect()
        } else {
            Vec::new()
        };
        let next_position = u64::try_from(records.len()).unwrap_or(u64::MAX);
        let log = EventLog::restore(records)?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| StoreError::io(&path, e))?;

        info!(
            path = %path.display(),
            records = next_position,
            head = %log.head(),
            "Event journal opened"
        );
        Ok((
            Self {
                path,
                file,
                next_position,
            },
            log,
        ))
    }

    /// Path of the journal file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of records written so far.
    pub const fn len(&self) -> u64 {
        self.next_position
    }

    /// Whether the journal holds no records.
    pub const fn is_empty(&self) -> bool {
        self.next_position == 0
    }

    /// Append records, which must continue the journal's positions without
    /// gaps. Returns the number written.
    ///
    /// Nothing is written if any record is out of order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::OutOfOrder`], [`StoreError::Serialization`],
    /// or [`StoreError::Io`].
    pub fn append(&mut self, records: &[LogRecord]) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }

        let received_at = Utc::now();
        let mut expected = self.next_position;
        let mut buf = Vec::new();
        for record in records {
            if record.position != expected {
                return Err(StoreError::OutOfOrder {
                    expected,
                    found: record.position,
                });
            }
            serde_json::to_writer(
                &mut buf,
                &JournalEntry {
                    received_at,
                    record: record.clone(),
                },
            )?;
            buf.push(b'\n');
            expected = expected.checked_add(1).ok_or(StoreError::OutOfOrder {
                expected,
                found: record.position,
            })?;
        }

        self.file
            .write_all(&buf)
            .map_err(|e| StoreError::io(&self.path, e))?;
        self.file
            .sync_data()
            .map_err(|e| StoreError::io(&self.path, e))?;
        self.next_position = expected;

        debug!(written = records.len(), next_position = expected, "Journal appended");
        Ok(records.len())
    }
}

/// Parse every line of a journal file.
///
/// # Errors
///
/// Returns [`StoreError::CorruptJournal`] naming the first bad line, or
/// [`StoreError::Io`] if the file cannot be read.
pub fn read_entries(path: &Path) -> Result<Vec<JournalEntry>, StoreError> {
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
