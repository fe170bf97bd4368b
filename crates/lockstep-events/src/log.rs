//! The append-only, hash-chained event log.
//!
//! # Design
//!
//! - **Append-only**: there is no update or delete API.
//! - **Chained**: `record.hash = H(prev_hash || canonical(event))`; the first
//!   record links to [`Digest::ZERO`].
//! - **Arrival order**: records are stored in the order they were accepted.
//!   Readers get a tick's events sorted by `(tick, source_id, sequence)`.
//! - **Sealed watermark**: once the pipeline commits tick `t`, events for
//!   ticks `<= t` are refused, so replay never sees an input the live run
//!   did not.

use std::collections::BTreeMap;

use lockstep_hash::{Digest, HashDomain, hash_parts, to_canonical_bytes};
use lockstep_types::{EventKey, InputEvent, SourceId};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::EventLogError;

/// Read access to the inputs of a tick.
///
/// The authority pipeline consumes inputs only through this trait.
pub trait InputSource {
    /// Events for `tick` in canonical `(tick, source_id, sequence)` order.
    fn inputs_for_tick(&self, tick: u64) -> Vec<InputEvent>;

    /// Called once `tick` has been committed. Sources that accept further
    /// input must refuse events for ticks `<= tick` from now on.
    fn seal_through(&mut self, tick: u64) {
        let _ = tick;
    }
}

/// One accepted event with its chain link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    /// Zero-based arrival position.
    pub position: u64,
    /// The accepted event.
    pub event: InputEvent,
    /// Hash of the previous record, or zero for the first.
    pub prev_hash: Digest,
    /// `H(prev_hash || canonical(event))`.
    pub hash: Digest,
}

impl LogRecord {
    /// Compute the link hash for `event` following `prev_hash`.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::Encoding`] if the event cannot be encoded.
    pub fn link_hash(prev_hash: &Digest, event: &InputEvent) -> Result<Digest, EventLogError> {
        let bytes = to_canonical_bytes(event)?;
        Ok(hash_parts(
            HashDomain::EventRecord,
            &[prev_hash.as_bytes(), &bytes],
        ))
    }
}

/// Verify a sequence of records as a chain starting from the zero digest.
///
/// # Errors
///
/// Returns [`EventLogError::ChainBroken`] naming the first record whose
/// position, link, or hash is wrong.
pub fn verify_records(records: &[LogRecord]) -> Result<(), EventLogError> {
    let mut prev = Digest::ZERO;
    for (expected_position, record) in (0_u64..).zip(records) {
        let broken = EventLogError::ChainBroken {
            position: expected_position,
        };
        if record.position != expected_position || record.prev_hash != prev {
            return Err(broken);
        }
        if LogRecord::link_hash(&prev, &record.event)? != record.hash {
            return Err(broken);
        }
        prev = record.hash;
    }
    Ok(())
}

/// The kernel's event log.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    records: Vec<LogRecord>,
    index: BTreeMap<EventKey, usize>,
    sealed_through: Option<u64>,
}

impl EventLog {
    /// Create an empty log.
    pub const fn new() -> Self {
        Self {
            records: Vec::new(),
            index: BTreeMap::new(),
            sealed_through: None,
        }
    }

    /// Rebuild a log from persisted records, verifying the chain and key
    /// uniqueness first.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::ChainBroken`] or
    /// [`EventLogError::DuplicateKey`] if the records are not a valid log.
    pub fn restore(records: Vec<LogRecord>) -> Result<Self, EventLogError> {
        verify_records(&records)?;
        let mut index = BTreeMap::new();
        for (i, record) in records.iter().enumerate() {
            let key = record.event.key();
            if index.insert(key, i).is_some() {
                return Err(EventLogError::DuplicateKey { key });
            }
        }
        Ok(Self {
            records,
            index,
            sealed_through: None,
        })
    }

    /// Accept an event.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::LateEvent`] for a sealed tick,
    /// [`EventLogError::DuplicateKey`] for a repeated key, or
    /// [`EventLogError::Encoding`] if the event cannot be hashed.
    pub fn append(&mut self, event: InputEvent) -> Result<&LogRecord, EventLogError> {
        let key = event.key();
        if let Some(sealed_through) = self.sealed_through
            && key.tick <= sealed_through
        {
            return Err(EventLogError::LateEvent {
                key,
                sealed_through,
            });
        }
        if self.index.contains_key(&key) {
            return Err(EventLogError::DuplicateKey { key });
        }
        let prev_hash = self.head();
        let hash = LogRecord::link_hash(&prev_hash, &event)?;
        let position = u64::try_from(self.records.len())
            .map_err(|_err| EventLogError::ChainBroken { position: u64::MAX })?;
        let slot = self.records.len();
        self.records.push(LogRecord {
            position,
            event,
            prev_hash,
            hash,
        });
        self.index.insert(key, slot);
        debug!(position, %key, hash = %hash.short(), "event appended");
        self.records
            .get(slot)
            .ok_or(EventLogError::ChainBroken { position })
    }

    /// Hash of the newest record, or zero for an empty log.
    pub fn head(&self) -> Digest {
        self.records.last().map_or(Digest::ZERO, |r| r.hash)
    }

    /// Number of records.
    pub const fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the log is empty.
    pub const fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// All records in arrival order.
    pub fn records(&self) -> &[LogRecord] {
        &self.records
    }

    /// Highest sealed tick, if any.
    pub const fn sealed_through(&self) -> Option<u64> {
        self.sealed_through
    }

    /// Events for one tick in canonical order.
    pub fn ordered_for_tick(&self, tick: u64) -> Vec<&InputEvent> {
        let start = EventKey {
            tick,
            source_id: SourceId(0),
            sequence: 0,
        };
        let end = EventKey {
            tick,
            source_id: SourceId(u64::MAX),
            sequence: u64::MAX,
        };
        self.index
            .range(start..=end)
            .filter_map(|(_, i)| self.records.get(*i))
            .map(|r| &r.event)
            .collect()
    }

    /// Events for every tick after `tick`, in canonical order.
    pub fn events_after(&self, tick: u64) -> Vec<&InputEvent> {
        let Some(first) = tick.checked_add(1) else {
            return Vec::new();
        };
        let start = EventKey {
            tick: first,
            source_id: SourceId(0),
            sequence: 0,
        };
        self.index
            .range(start..)
            .filter_map(|(_, i)| self.records.get(*i))
            .map(|r| &r.event)
            .collect()
    }

    /// Highest tick any event targets.
    pub fn last_event_tick(&self) -> Option<u64> {
        self.index.keys().next_back().map(|k| k.tick)
    }

    /// Re-verify the whole chain.
    ///
    /// # Errors
    ///
    /// Returns [`EventLogError::ChainBroken`] at the first bad record.
    pub fn verify_chain(&self) -> Result<(), EventLogError> {
        verify_records(&self.records)
    }

    /// Refuse further events for ticks `<= tick`. The watermark never moves
    /// backwards.
    pub fn seal(&mut self, tick: u64) {
        self.sealed_through = Some(self.sealed_through.map_or(tick, |s| s.max(tick)));
    }
}

impl InputSource for EventLog {
    fn inputs_for_tick(&self, tick: u64) -> Vec<InputEvent> {
        self.ordered_for_tick(tick).into_iter().cloned().collect()
    }

    fn seal_through(&mut self, tick: u64) {
        self.seal(tick);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use lockstep_types::{Action, EntityId};

    use super::*;

    fn event(tick: u64, source: u64, sequence: u64) -> InputEvent {
        InputEvent::new(tick, SourceId(source), sequence, Action::Rest { entity: EntityId(1) })
    }

    #[test]
    fn first_record_links_to_zero() {
        let mut log = EventLog::new();
        let record = log.append(event(1, 1, 0)).unwrap();
        assert_eq!(record.prev_hash, Digest::ZERO);
        assert_eq!(record.position, 0);
    }

    #[test]
    fn arrival_order_is_kept_but_reads_are_sorted() {
        let mut log = EventLog::new();
        log.append(event(5, 2, 0)).unwrap();
        log.append(event(5, 1, 0)).unwrap();
        log.append(event(3, 1, 0)).unwrap();

        let arrival: Vec<u64> = log.records().iter().map(|r| r.event.source_id.0).collect();
        assert_eq!(arrival, vec![2, 1, 1]);

        let tick5: Vec<u64> = log.ordered_for_tick(5).iter().map(|e| e.source_id.0).collect();
        assert_eq!(tick5, vec![1, 2]);

        let after: Vec<(u64, u64)> = log
            .events_after(0)
            .iter()
            .map(|e| (e.tick, e.source_id.0))
            .collect();
        assert_eq!(after, vec![(3, 1), (5, 1), (5, 2)]);
    }

    #[test]
    fn duplicate_key_is_refused() {
        let mut log = EventLog::new();
        log.append(event(1, 1, 0)).unwrap();
        let err = log.append(event(1, 1, 0)).unwrap_err();
        assert!(matches!(err, EventLogError::DuplicateKey { .. }));
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn sealed_ticks_refuse_late_events() {
        let mut log = EventLog::new();
        log.seal(4);
        let err = log.append(event(4, 1, 0)).unwrap_err();
        assert!(matches!(err, EventLogError::LateEvent { sealed_through: 4, .. }));
        assert!(log.append(event(5, 1, 0)).is_ok());
        log.seal(2);
        assert_eq!(log.sealed_through(), Some(4));
    }

    #[test]
    fn tampering_is_located() {
        let mut log = EventLog::new();
        for seq in 0..4 {
            log.append(event(1, 1, seq)).unwrap();
        }
        assert!(log.verify_chain().is_ok());

        let mut records = log.records().to_vec();
        if let Some(record) = records.get_mut(2) {
            record.event.action = Action::Plan { entity: EntityId(1) };
        }
        let err = EventLog::restore(records).unwrap_err();
        assert_eq!(err, EventLogError::ChainBroken { position: 2 });
    }

    #[test]
    fn restore_round_trips_records() {
        let mut log = EventLog::new();
        log.append(event(2, 1, 0)).unwrap();
        log.append(event(1, 3, 0)).unwrap();
        let restored = EventLog::restore(log.records().to_vec()).unwrap();
        assert_eq!(restored.head(), log.head());
        assert_eq!(restored.ordered_for_tick(1).len(), 1);
        assert_eq!(restored.last_event_tick(), Some(2));
    }

    #[test]
    fn input_source_returns_owned_sorted_events() {
        let mut log = EventLog::new();
        log.append(event(7, 9, 1)).unwrap();
        log.append(event(7, 9, 0)).unwrap();
        let inputs = InputSource::inputs_for_tick(&log, 7);
        let sequences: Vec<u64> = inputs.iter().map(|e| e.sequence).collect();
        assert_eq!(sequences, vec![0, 1]);
    }
}
