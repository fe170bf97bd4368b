//! Authoritative input events.

use lockstep_hash::{Canonical, CanonicalError, Decoder, Encoder};
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::ids::SourceId;

/// The canonical ordering key of an input event.
///
/// Field order is significant: the derived `Ord` compares `tick`, then
/// `source_id`, then `sequence`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventKey {
    /// Tick the event applies to.
    pub tick: u64,
    /// Producer of the event.
    pub source_id: SourceId,
    /// Per-source sequence number.
    pub sequence: u64,
}

impl core::fmt::Display for EventKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {}, {})", self.tick, self.source_id, self.sequence)
    }
}

impl Canonical for EventKey {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CanonicalError> {
        enc.put_u64(self.tick);
        self.source_id.encode(enc)?;
        enc.put_u64(self.sequence);
        Ok(())
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CanonicalError> {
        Ok(Self {
            tick: dec.get_u64()?,
            source_id: SourceId::decode(dec)?,
            sequence: dec.get_u64()?,
        })
    }
}

/// An external input, immutable once accepted into the event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputEvent {
    /// Tick the event applies to.
    pub tick: u64,
    /// Producer of the event.
    pub source_id: SourceId,
    /// Per-source sequence number.
    pub sequence: u64,
    /// What the event asks the world to do.
    pub action: Action,
}

impl InputEvent {
    /// Build an event.
    pub const fn new(tick: u64, source_id: SourceId, sequence: u64, action: Action) -> Self {
        Self {
            tick,
            source_id,
            sequence,
            action,
        }
    }

    /// The canonical ordering key.
    pub const fn key(&self) -> EventKey {
        EventKey {
            tick: self.tick,
            source_id: self.source_id,
            sequence: self.sequence,
        }
    }
}

impl Canonical for InputEvent {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CanonicalError> {
        self.key().encode(enc)?;
        self.action.encode(enc)
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CanonicalError> {
        let key = EventKey::decode(dec)?;
        let action = Action::decode(dec)?;
        Ok(Self::new(key.tick, key.source_id, key.sequence, action))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use lockstep_hash::{from_canonical_bytes, to_canonical_bytes};

    use super::*;
    use crate::ids::EntityId;

    fn rest(tick: u64, source: u64, sequence: u64) -> InputEvent {
        InputEvent::new(tick, SourceId(source), sequence, Action::Rest { entity: EntityId(1) })
    }

    #[test]
    fn keys_order_lexicographically() {
        let mut keys = vec![rest(5, 2, 0).key(), rest(5, 1, 0).key(), rest(3, 1, 0).key()];
        keys.sort();
        let order: Vec<(u64, u64)> = keys.iter().map(|k| (k.tick, k.source_id.0)).collect();
        assert_eq!(order, vec![(3, 1), (5, 1), (5, 2)]);
    }

    #[test]
    fn sequence_breaks_ties() {
        assert!(rest(1, 1, 0).key() < rest(1, 1, 1).key());
    }

    #[test]
    fn canonical_round_trip_preserves_event() {
        let event = rest(12, 3, 4);
        let bytes = to_canonical_bytes(&event).unwrap();
        assert_eq!(from_canonical_bytes::<InputEvent>(&bytes).unwrap(), event);
    }

    #[test]
    fn json_shape_is_flat() {
        let event = rest(1, 2, 3);
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["tick"], 1);
        assert_eq!(json["source_id"], 2);
        assert_eq!(json["action"]["kind"], "rest");
    }
}
