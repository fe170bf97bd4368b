//! The RNG stream manager owned by the authority pipeline.
//!
//! Draws made while an action is being applied are *staged*. When the action
//! is accepted the pipeline calls [`RngStreamManager::commit_action`]; when it
//! is vetoed, [`RngStreamManager::abort_action`] rewinds every stream touched
//! by the action, so a vetoed action leaves no trace in stream positions.

use std::collections::BTreeMap;

use lockstep_hash::{Canonical, CanonicalError, Decoder, Encoder};
use lockstep_types::Subsystem;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::audit::RngAuditRecord;
use crate::error::RngError;
use crate::stream::RngStream;

/// Address of a declared stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StreamKey {
    /// Owning subsystem.
    pub subsystem: Subsystem,
    /// Stream within the subsystem.
    pub stream_id: u32,
}

impl StreamKey {
    /// Build a key.
    pub const fn new(subsystem: Subsystem, stream_id: u32) -> Self {
        Self {
            subsystem,
            stream_id,
        }
    }
}

impl core::fmt::Display for StreamKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {})", self.subsystem, self.stream_id)
    }
}

impl Canonical for StreamKey {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CanonicalError> {
        self.subsystem.encode(enc)?;
        enc.put_u32(self.stream_id);
        Ok(())
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CanonicalError> {
        Ok(Self {
            subsystem: Subsystem::decode(dec)?,
            stream_id: dec.get_u32()?,
        })
    }
}

/// A stream position in a form that serializes to flat JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamCounter {
    /// Owning subsystem.
    pub subsystem: Subsystem,
    /// Stream within the subsystem.
    pub stream_id: u32,
    /// Draws made so far.
    pub counter: u64,
}

/// Holds every declared stream plus the draws of the action in flight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RngStreamManager {
    root_seed: u64,
    streams: BTreeMap<StreamKey, RngStream>,
    tick: u64,
    staged: Vec<RngAuditRecord>,
    committed: Vec<RngAuditRecord>,
}

impl RngStreamManager {
    /// Derive every declared stream from `root_seed`, all at counter zero.
    ///
    /// # Errors
    ///
    /// Returns [`RngError::DuplicateStream`] if a pair is declared twice.
    pub fn new(
        root_seed: u64,
        declared: impl IntoIterator<Item = StreamKey>,
    ) -> Result<Self, RngError> {
        let mut streams = BTreeMap::new();
        for key in declared {
            let stream = RngStream::derive(root_seed, key.subsystem, key.stream_id);
            if streams.insert(key, stream).is_some() {
                return Err(RngError::DuplicateStream {
                    subsystem: key.subsystem,
                    stream_id: key.stream_id,
                });
            }
        }
        Ok(Self {
            root_seed,
            streams,
            tick: 0,
            staged: Vec::new(),
            committed: Vec::new(),
        })
    }

    /// The root seed the streams were derived from.
    pub const fn root_seed(&self) -> u64 {
        self.root_seed
    }

    /// Look up a declared stream.
    pub fn stream(&self, key: StreamKey) -> Option<&RngStream> {
        self.streams.get(&key)
    }

    /// Set the tick recorded on subsequent draws.
    pub const fn begin_tick(&mut self, tick: u64) {
        self.tick = tick;
    }

    /// Draw the next `u64` from a declared stream.
    ///
    /// # Errors
    ///
    /// Returns [`RngError::Undeclared`] for an unknown pair and
    /// [`RngError::CounterOverflow`] if the stream is exhausted.
    pub fn draw(
        &mut self,
        subsystem: Subsystem,
        stream_id: u32,
        callsite: &str,
    ) -> Result<u64, RngError> {
        let key = StreamKey::new(subsystem, stream_id);
        let stream = self
            .streams
            .get_mut(&key)
            .ok_or(RngError::Undeclared {
                subsystem,
                stream_id,
            })?;
        let (counter, value) = stream.advance()?;
        trace!(
            tick = self.tick,
            %subsystem,
            stream_id,
            counter,
            callsite,
            "rng draw staged"
        );
        self.staged.push(RngAuditRecord {
            tick: self.tick,
            subsystem,
            stream_id,
            callsite: callsite.to_owned(),
            counter,
            value,
        });
        Ok(value)
    }

    /// Draw a value in `0..bound`.
    ///
    /// Uses a single draw reduced modulo `bound`; the bias is negligible for
    /// the small bounds the passes use.
    ///
    /// # Errors
    ///
    /// Returns [`RngError::ZeroBound`] for `bound == 0`, plus the errors of
    /// [`Self::draw`].
    pub fn draw_below(
        &mut self,
        subsystem: Subsystem,
        stream_id: u32,
        bound: u64,
        callsite: &str,
    ) -> Result<u64, RngError> {
        if bound == 0 {
            return Err(RngError::ZeroBound);
        }
        let value = self.draw(subsystem, stream_id, callsite)?;
        value.checked_rem(bound).ok_or(RngError::ZeroBound)
    }

    /// Accept the staged draws. Returns how many were committed.
    pub fn commit_action(&mut self) -> usize {
        let count = self.staged.len();
        self.committed.append(&mut self.staged);
        count
    }

    /// Discard the staged draws and rewind their streams. Returns how many
    /// were discarded.
    pub fn abort_action(&mut self) -> usize {
        let count = self.staged.len();
        // Newest first, so each stream ends at the position before its
        // earliest staged draw.
        for record in self.staged.drain(..).rev() {
            let key = StreamKey::new(record.subsystem, record.stream_id);
            if let Some(stream) = self.streams.get_mut(&key) {
                stream.set_counter(record.counter.saturating_sub(1));
            }
        }
        count
    }

    /// Number of draws staged by the action in flight.
    pub const fn staged_len(&self) -> usize {
        self.staged.len()
    }

    /// Drain the draws committed since the last call.
    pub fn take_committed(&mut self) -> Vec<RngAuditRecord> {
        core::mem::take(&mut self.committed)
    }

    /// Current counter of every declared stream.
    pub fn counters(&self) -> BTreeMap<StreamKey, u64> {
        self.streams
            .iter()
            .map(|(key, stream)| (*key, stream.draw_counter()))
            .collect()
    }

    /// Counters as a flat list for serialization.
    pub fn counter_list(&self) -> Vec<StreamCounter> {
        self.streams
            .iter()
            .map(|(key, stream)| StreamCounter {
                subsystem: key.subsystem,
                stream_id: key.stream_id,
                counter: stream.draw_counter(),
            })
            .collect()
    }

    /// Resume every stream at a stored counter.
    ///
    /// # Errors
    ///
    /// Returns [`RngError::CounterMismatch`] unless `counters` names exactly
    /// the declared streams.
    pub fn restore_counters(&mut self, counters: &BTreeMap<StreamKey, u64>) -> Result<(), RngError> {
        if let Some(extra) = counters.keys().find(|k| !self.streams.contains_key(k)) {
            return Err(RngError::CounterMismatch {
                reason: format!("stream {extra} is not declared"),
            });
        }
        if let Some(missing) = self.streams.keys().find(|k| !counters.contains_key(k)) {
            return Err(RngError::CounterMismatch {
                reason: format!("stream {missing} has no stored counter"),
            });
        }
        for (key, stream) in &mut self.streams {
            if let Some(counter) = counters.get(key) {
                stream.set_counter(*counter);
            }
        }
        self.staged.clear();
        self.committed.clear();
        Ok(())
    }

    /// Recompute the value an audit record claims, from the stream key alone.
    ///
    /// # Errors
    ///
    /// Returns [`RngError::Undeclared`] if the record's stream is unknown.
    pub fn reproduce(&self, record: &RngAuditRecord) -> Result<u64, RngError> {
        let key = StreamKey::new(record.subsystem, record.stream_id);
        let stream = self.streams.get(&key).ok_or(RngError::Undeclared {
            subsystem: record.subsystem,
            stream_id: record.stream_id,
        })?;
        Ok(stream.output_at(record.counter))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn manager() -> RngStreamManager {
        RngStreamManager::new(
            42,
            [
                StreamKey::new(Subsystem::Physics, 0),
                StreamKey::new(Subsystem::Biology, 2),
            ],
        )
        .unwrap()
    }

    #[test]
    fn undeclared_stream_is_misuse() {
        let mut rng = manager();
        let err = rng.draw(Subsystem::Cognition, 0, "test").unwrap_err();
        assert_eq!(
            err,
            RngError::Undeclared {
                subsystem: Subsystem::Cognition,
                stream_id: 0
            }
        );
    }

    #[test]
    fn duplicate_declaration_is_refused() {
        let key = StreamKey::new(Subsystem::Physics, 0);
        assert!(RngStreamManager::new(1, [key, key]).is_err());
    }

    #[test]
    fn abort_rewinds_counters() {
        let mut rng = manager();
        let first = rng.draw(Subsystem::Biology, 2, "a").unwrap();
        rng.commit_action();
        let staged = rng.draw(Subsystem::Biology, 2, "b").unwrap();
        rng.draw(Subsystem::Biology, 2, "c").unwrap();
        assert_eq!(rng.abort_action(), 2);
        assert_eq!(
            rng.counters().get(&StreamKey::new(Subsystem::Biology, 2)).copied(),
            Some(1)
        );
        // The next draw reproduces the aborted one.
        assert_eq!(rng.draw(Subsystem::Biology, 2, "d").unwrap(), staged);
        assert_ne!(first, staged);
    }

    #[test]
    fn only_committed_draws_reach_the_audit_feed() {
        let mut rng = manager();
        rng.begin_tick(3);
        rng.draw(Subsystem::Physics, 0, "kept").unwrap();
        rng.commit_action();
        rng.draw(Subsystem::Physics, 0, "dropped").unwrap();
        rng.abort_action();
        let records = rng.take_committed();
        assert_eq!(records.len(), 1);
        let record = records.first().unwrap();
        assert_eq!(record.callsite, "kept");
        assert_eq!(record.tick, 3);
        assert!(rng.take_committed().is_empty());
    }

    #[test]
    fn reproduce_matches_recorded_value() {
        let mut rng = manager();
        for _ in 0..3 {
            rng.draw(Subsystem::Physics, 0, "x").unwrap();
        }
        rng.commit_action();
        for record in rng.take_committed() {
            assert_eq!(rng.reproduce(&record).unwrap(), record.value);
        }
    }

    #[test]
    fn restore_requires_exact_stream_set() {
        let mut rng = manager();
        let mut counters = rng.counters();
        counters.insert(StreamKey::new(Subsystem::Governance, 9), 0);
        assert!(rng.restore_counters(&counters).is_err());

        let mut partial = rng.counters();
        partial.remove(&StreamKey::new(Subsystem::Physics, 0));
        assert!(rng.restore_counters(&partial).is_err());
    }

    #[test]
    fn draw_below_stays_in_range() {
        let mut rng = manager();
        for _ in 0..50 {
            assert!(rng.draw_below(Subsystem::Physics, 0, 3, "range").unwrap() < 3);
        }
        assert_eq!(rng.draw_below(Subsystem::Physics, 0, 0, "zero"), Err(RngError::ZeroBound));
    }
}
