//! Genesis: the boot contract and the hashed authoritative state.
//!
//! A [`Genesis`] is everything a run depends on before the first input
//! arrives: root seed, snapshot cadence, governor source, declared RNG
//! streams, and the tick-0 world. Its canonical encoding is hashed into a
//! fingerprint that every snapshot carries, so a snapshot can only be
//! resumed under the genesis that produced it.

use std::collections::{BTreeMap, BTreeSet};

use lockstep_hash::{
    CANONICAL_FORMAT_VERSION, Canonical, CanonicalError, Decoder, Digest, Encoder,
    HASH_ALGORITHM_VERSION, HashChain, HashDomain, hash_parts, to_canonical_bytes,
};
use lockstep_rng::StreamKey;
use lockstep_types::SourceId;
use lockstep_world::WorldState;

// ---------------------------------------------------------------------------
// Authoritative state
// ---------------------------------------------------------------------------

/// The complete authoritative state at one tick.
///
/// Its canonical bytes are what the world hash chain covers. The RNG
/// counters are part of it, so stream positions are tamper evident too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthoritativeState {
    /// The tick this state belongs to.
    pub tick: u64,
    /// The world model.
    pub world: WorldState,
    /// Draw counter of every declared stream.
    pub counters: BTreeMap<StreamKey, u64>,
}

/// Encode the parts of an [`AuthoritativeState`] without assembling one.
///
/// # Errors
///
/// Returns [`CanonicalError`] if a collection is too large to encode.
pub fn encode_state(
    tick: u64,
    world: &WorldState,
    counters: &BTreeMap<StreamKey, u64>,
) -> Result<Vec<u8>, CanonicalError> {
    let mut enc = Encoder::new();
    enc.put_u64(tick);
    world.encode(&mut enc)?;
    counters.encode(&mut enc)?;
    Ok(enc.into_bytes())
}

impl Canonical for AuthoritativeState {
    fn encode(&self, enc: &mut Encoder) -> Result<(), CanonicalError> {
        enc.put_u64(self.tick);
        self.world.encode(enc)?;
        self.counters.encode(enc)
    }

    fn decode(dec: &mut Decoder<'_>) -> Result<Self, CanonicalError> {
        Ok(Self {
            tick: dec.get_u64()?,
            world: WorldState::decode(dec)?,
            counters: BTreeMap::decode(dec)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Genesis
// ---------------------------------------------------------------------------

/// The boot contract of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Genesis {
    root_seed: u64,
    snapshot_cadence: u64,
    governor: SourceId,
    streams: BTreeSet<StreamKey>,
    world: WorldState,
    fingerprint: Digest,
}

impl Genesis {
    /// Assemble a genesis and compute its fingerprint.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError`] if the configuration cannot be encoded.
    pub fn new(
        root_seed: u64,
        snapshot_cadence: u64,
        governor: SourceId,
        streams: impl IntoIterator<Item = StreamKey>,
        world: WorldState,
    ) -> Result<Self, CanonicalError> {
        let streams: BTreeSet<StreamKey> = streams.into_iter().collect();

        let mut enc = Encoder::new();
        enc.put_u32(CANONICAL_FORMAT_VERSION);
        enc.put_u32(HASH_ALGORITHM_VERSION);
        enc.put_u64(root_seed);
        enc.put_u64(snapshot_cadence);
        governor.encode(&mut enc)?;
        streams.encode(&mut enc)?;
        world.encode(&mut enc)?;
        let fingerprint = hash_parts(HashDomain::GenesisFingerprint, &[&enc.into_bytes()]);

        Ok(Self {
            root_seed,
            snapshot_cadence,
            governor,
            streams,
            world,
            fingerprint,
        })
    }

    /// The root seed every stream key derives from.
    pub const fn root_seed(&self) -> u64 {
        self.root_seed
    }

    /// Ticks between snapshots.
    pub const fn snapshot_cadence(&self) -> u64 {
        self.snapshot_cadence
    }

    /// The only source allowed to issue governance actions.
    pub const fn governor(&self) -> SourceId {
        self.governor
    }

    /// Declared RNG streams.
    pub const fn streams(&self) -> &BTreeSet<StreamKey> {
        &self.streams
    }

    /// The tick-0 world.
    pub const fn world(&self) -> &WorldState {
        &self.world
    }

    /// Hash of the canonical genesis configuration.
    pub const fn fingerprint(&self) -> Digest {
        self.fingerprint
    }

    /// The state at tick 0: the genesis world with every counter at zero.
    pub fn initial_state(&self) -> AuthoritativeState {
        AuthoritativeState {
            tick: 0,
            world: self.world.clone(),
            counters: self.streams.iter().map(|key| (*key, 0)).collect(),
        }
    }

    /// Canonical bytes of [`Self::initial_state`].
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError`] if the state cannot be encoded.
    pub fn genesis_bytes(&self) -> Result<Vec<u8>, CanonicalError> {
        to_canonical_bytes(&self.initial_state())
    }

    /// The constant that precedes `WorldHash(0)`.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError`] if the state cannot be encoded.
    pub fn anchor(&self) -> Result<Digest, CanonicalError> {
        Ok(HashChain::anchor(&self.genesis_bytes()?))
    }

    /// `WorldHash(0)`, a pure function of the genesis bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CanonicalError`] if the state cannot be encoded.
    pub fn world_hash_zero(&self) -> Result<Digest, CanonicalError> {
        Ok(HashChain::link(&self.anchor()?, &self.genesis_bytes()?))
    }
}
