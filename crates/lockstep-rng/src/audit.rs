//! Append-only audit log of committed RNG draws.

use std::collections::BTreeMap;

use lockstep_types::{DrawSummary, Subsystem};
use serde::{Deserialize, Serialize};

/// One committed draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngAuditRecord {
    /// Tick during which the draw was made.
    pub tick: u64,
    /// Subsystem owning the stream.
    pub subsystem: Subsystem,
    /// Stream within the subsystem.
    pub stream_id: u32,
    /// Label of the code that drew.
    pub callsite: String,
    /// Stream counter after the draw (1-based draw index).
    pub counter: u64,
    /// The value returned.
    pub value: u64,
}

/// Filter for [`RngAuditLog::query`]. Unset fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AuditQuery {
    /// Only records from this tick.
    pub tick: Option<u64>,
    /// Only records from this subsystem.
    pub subsystem: Option<Subsystem>,
    /// Only records from this stream id.
    pub stream_id: Option<u32>,
}

impl AuditQuery {
    /// Match every record.
    pub const fn all() -> Self {
        Self {
            tick: None,
            subsystem: None,
            stream_id: None,
        }
    }

    /// Restrict to one tick.
    pub const fn at_tick(mut self, tick: u64) -> Self {
        self.tick = Some(tick);
        self
    }

    /// Restrict to one subsystem.
    pub const fn in_subsystem(mut self, subsystem: Subsystem) -> Self {
        self.subsystem = Some(subsystem);
        self
    }

    /// Restrict to one stream id.
    pub const fn on_stream(mut self, stream_id: u32) -> Self {
        self.stream_id = Some(stream_id);
        self
    }

    /// Whether `record` passes the filter.
    pub fn matches(&self, record: &RngAuditRecord) -> bool {
        self.tick.is_none_or(|t| record.tick == t)
            && self.subsystem.is_none_or(|s| record.subsystem == s)
            && self.stream_id.is_none_or(|id| record.stream_id == id)
    }
}

/// Every committed draw in commit order. Records are never mutated or
/// removed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RngAuditLog {
    records: Vec<RngAuditRecord>,
}

impl RngAuditLog {
    /// Create an empty log.
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Append a batch of committed records.
    pub fn extend(&mut self, records: impl IntoIterator<Item = RngAuditRecord>) {
        self.records.extend(records);
    }

    /// All records in commit order.
    pub fn records(&self) -> &[RngAuditRecord] {
        &self.records
    }

    /// Number of records.
    pub const fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the log is empty.
    pub const fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records matching `query`, in commit order.
    pub fn query(&self, query: &AuditQuery) -> Vec<&RngAuditRecord> {
        self.records.iter().filter(|r| query.matches(r)).collect()
    }
}

/// Collapse a tick's records into one [`DrawSummary`] per stream, sorted by
/// `(subsystem, stream_id)`.
pub fn summarize_draws(records: &[RngAuditRecord]) -> Vec<DrawSummary> {
    let mut by_stream: BTreeMap<(Subsystem, u32), (u64, u64)> = BTreeMap::new();
    for record in records {
        let entry = by_stream
            .entry((record.subsystem, record.stream_id))
            .or_insert((0, 0));
        entry.0 = entry.0.saturating_add(1);
        entry.1 = entry.1.max(record.counter);
    }
    by_stream
        .into_iter()
        .map(|((subsystem, stream_id), (draws, last_counter))| DrawSummary {
            subsystem,
            stream_id,
            draws,
            last_counter,
        })
        .collect()
}
