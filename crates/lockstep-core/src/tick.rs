//! The authority pipeline: one call to [`AuthorityPipeline::tick`] commits
//! exactly one tick.
//!
//! Pass order within a tick:
//!
//! 1. **Fetch** -- inputs for the tick from the [`InputSource`], sorted by
//!    `(tick, source_id, sequence)`.
//! 2. **Validate** -- structurally invalid inputs are rejected and skipped.
//! 3. **Apply** -- each action runs through Physics, Biology, Cognition,
//!    and Governance on a draft. A veto discards the draft and the action's
//!    staged RNG draws.
//! 4. **Diff** -- accepted actions record field-level changes.
//! 5. **Emit** -- observation events for diffs, vetoes, and rejections.
//! 6. **World step** -- resource regeneration from the Environment stream.
//! 7. **Hash** -- `WorldHash(t) = H(WorldHash(t-1) || canonical(state(t)))`.
//! 8. **Append-checkpoint** -- `(tick, hash)` recorded; a snapshot is taken
//!    on cadence.
//!
//! Steps 1 to 7 run on a working copy of the world and the RNG manager. The
//! copy replaces the committed state only once the hash is known, so a
//! fatal error leaves nothing half-applied. Any fatal error halts the
//! pipeline with a [`DivergenceReport`]; later calls return
//! [`KernelError::Halted`].

use std::collections::BTreeMap;

use lockstep_events::InputSource;
use lockstep_hash::{Digest, HashChain};
use lockstep_rng::{RngAuditLog, RngAuditRecord, RngStreamManager, StreamKey, summarize_draws};
use lockstep_types::{EventKey, InputEvent, ObservationEvent, ObservationPayload, Subsystem};
use lockstep_world::resource::{regen_roll_succeeds, regenerate};
use lockstep_world::{WorldState, diff_states};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::clock::TickClock;
use crate::error::KernelError;
use crate::genesis::{Genesis, encode_state};
use crate::passes::{APPLY_ORDER, PassContext, PassOutcome, validate_input};
use crate::snapshot::{Snapshot, SnapshotParts};

/// Stream used by the regeneration world step.
pub const REGEN_STREAM: u32 = 0;

/// Regeneration rolls are drawn in `0..REGEN_ROLL_BOUND`.
const REGEN_ROLL_BOUND: u64 = 1000;

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

/// One entry of the checkpoint feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Committed tick.
    pub tick: u64,
    /// `WorldHash(tick)`.
    pub world_hash: Digest,
}

/// What went wrong when the pipeline halted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DivergenceKind {
    /// The recomputed hash disagreed with a recorded checkpoint.
    HashMismatch {
        /// The recorded hash.
        expected: Digest,
        /// The recomputed hash.
        actual: Digest,
    },
    /// An invariant or serialization failure.
    Fault {
        /// Rendered error.
        message: String,
    },
}

/// Structured report emitted when the pipeline halts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DivergenceReport {
    /// The first tick that could not be committed.
    pub tick: u64,
    /// What went wrong.
    pub kind: DivergenceKind,
    /// The last tick that was committed.
    pub last_good_tick: u64,
    /// `WorldHash(last_good_tick)`.
    pub last_good_hash: Digest,
}

/// Summary of one committed tick.
#[derive(Debug, Clone)]
pub struct TickReport {
    /// The tick that was committed.
    pub tick: u64,
    /// `WorldHash(tick)`.
    pub world_hash: Digest,
    /// Inputs fetched for the tick.
    pub inputs: usize,
    /// Actions that passed every Apply pass.
    pub applied: usize,
    /// Actions vetoed by an Apply pass.
    pub vetoed: usize,
    /// Inputs rejected at Validate.
    pub rejected: usize,
    /// RNG draws committed during the tick.
    pub rng_draws: usize,
    /// Observation events emitted during the tick. The pipeline keeps no
    /// copy; delivering them is up to the caller.
    pub observations: Vec<ObservationEvent>,
    /// Snapshot taken at this tick, if it fell on the cadence.
    pub snapshot: Option<Snapshot>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Everything computed for a tick before it is committed.
struct StagedTick {
    tick: u64,
    world: WorldState,
    rng: RngStreamManager,
    state_bytes: Vec<u8>,
    world_hash: Digest,
    draws: Vec<RngAuditRecord>,
    observations: Vec<ObservationEvent>,
    next_observation_id: u64,
    inputs: usize,
    applied: usize,
    vetoed: usize,
    rejected: usize,
}

/// Collects observations for one tick and numbers them.
struct Emitter {
    tick: u64,
    next_id: u64,
    events: Vec<ObservationEvent>,
}

impl Emitter {
    fn emit(&mut self, cause: Option<EventKey>, payload: ObservationPayload) -> Result<(), KernelError> {
        let id = self.next_id;
        self.next_id = id
            .checked_add(1)
            .ok_or(KernelError::CounterOverflow { what: "observation id" })?;
        self.events.push(ObservationEvent {
            id,
            tick: self.tick,
            cause,
            payload,
        });
        Ok(())
    }
}

/// The single writer of authoritative state.
#[derive(Debug)]
pub struct AuthorityPipeline {
    genesis_fingerprint: Digest,
    snapshot_cadence: u64,
    clock: TickClock,
    world: WorldState,
    rng: RngStreamManager,
    chain: HashChain,
    checkpoints: Vec<Checkpoint>,
    expected: BTreeMap<u64, Digest>,
    audit: RngAuditLog,
    next_observation_id: u64,
    latest_snapshot: Snapshot,
    halted: Option<DivergenceReport>,
}

impl AuthorityPipeline {
    /// Boot at tick 0 from a genesis.
    ///
    /// The genesis snapshot is taken immediately and is available from
    /// [`Self::latest_snapshot`].
    ///
    /// # Errors
    ///
    /// Returns [`KernelError`] if the streams cannot be declared or the
    /// genesis state cannot be encoded.
    pub fn new(genesis: &Genesis) -> Result<Self, KernelError> {
        let rng = RngStreamManager::new(genesis.root_seed(), genesis.streams().iter().copied())?;
        let bytes = genesis.genesis_bytes()?;
        let anchor = HashChain::anchor(&bytes);
        let world_hash = HashChain::link(&anchor, &bytes);

        let snapshot = Snapshot::seal(SnapshotParts {
            genesis_fingerprint: genesis.fingerprint(),
            tick: 0,
            canonical_state_bytes: bytes,
            rng_stream_counters: rng.counter_list(),
            prev_world_hash: anchor,
            world_hash,
            prev_checkpoint_hash: Digest::ZERO,
        })?;

        info!(
            fingerprint = %genesis.fingerprint(),
            world_hash = %world_hash,
            streams = genesis.streams().len(),
            "Genesis committed"
        );

        Ok(Self {
            genesis_fingerprint: genesis.fingerprint(),
            snapshot_cadence: genesis.snapshot_cadence(),
            clock: TickClock::genesis(),
            world: genesis.world().clone(),
            rng,
            chain: HashChain::resume(world_hash),
            checkpoints: vec![Checkpoint {
                tick: 0,
                world_hash,
            }],
            expected: BTreeMap::new(),
            audit: RngAuditLog::new(),
            next_observation_id: 0,
            latest_snapshot: snapshot,
            halted: None,
        })
    }

    /// Resume from a verified snapshot. The next tick is `snapshot.tick + 1`.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::Snapshot`] if the snapshot fails verification
    /// and [`KernelError::Rng`] if its counters do not match the declared
    /// streams.
    pub fn from_snapshot(genesis: &Genesis, snapshot: &Snapshot) -> Result<Self, KernelError> {
        let state = snapshot.verify(genesis.fingerprint())?;
        let mut rng = RngStreamManager::new(genesis.root_seed(), genesis.streams().iter().copied())?;
        rng.restore_counters(&state.counters)?;

        info!(
            tick = snapshot.tick,
            world_hash = %snapshot.world_hash,
            "Resumed from snapshot"
        );

        Ok(Self {
            genesis_fingerprint: genesis.fingerprint(),
            snapshot_cadence: genesis.snapshot_cadence(),
            clock: TickClock::resume_at(state.tick),
            world: state.world,
            rng,
            chain: HashChain::resume(snapshot.world_hash),
            checkpoints: vec![Checkpoint {
                tick: snapshot.tick,
                world_hash: snapshot.world_hash,
            }],
            expected: BTreeMap::new(),
            audit: RngAuditLog::new(),
            next_observation_id: 0,
            latest_snapshot: snapshot.clone(),
            halted: None,
        })
    }

    /// Record hashes a previous run produced. Any tick whose recomputed
    /// hash disagrees halts the pipeline.
    #[must_use]
    pub fn with_expected_checkpoints(mut self, checkpoints: impl IntoIterator<Item = Checkpoint>) -> Self {
        self.expected
            .extend(checkpoints.into_iter().map(|c| (c.tick, c.world_hash)));
        self
    }

    /// Last committed tick.
    pub const fn tick_count(&self) -> u64 {
        self.clock.current()
    }

    /// `WorldHash` of the last committed tick.
    pub const fn world_hash(&self) -> Digest {
        self.chain.head()
    }

    /// The committed world.
    pub const fn world(&self) -> &WorldState {
        &self.world
    }

    /// Draw counter of every declared stream.
    pub fn rng_counters(&self) -> BTreeMap<StreamKey, u64> {
        self.rng.counters()
    }

    /// The checkpoint feed since boot or resume.
    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    /// Every committed RNG draw since boot or resume.
    pub const fn audit(&self) -> &RngAuditLog {
        &self.audit
    }

    /// The most recent snapshot (genesis, resumed, or on cadence).
    pub const fn latest_snapshot(&self) -> &Snapshot {
        &self.latest_snapshot
    }

    /// The report of the fatal error that halted the pipeline, if any.
    pub const fn divergence(&self) -> Option<&DivergenceReport> {
        self.halted.as_ref()
    }

    /// Whether the pipeline refuses further ticks.
    pub const fn is_halted(&self) -> bool {
        self.halted.is_some()
    }

    /// Fingerprint of the genesis this pipeline runs under.
    pub const fn genesis_fingerprint(&self) -> Digest {
        self.genesis_fingerprint
    }

    /// Advance the world by exactly one tick.
    ///
    /// # Errors
    ///
    /// Every error is fatal: the pipeline records a [`DivergenceReport`] and
    /// refuses further ticks with [`KernelError::Halted`].
    pub fn tick(&mut self, inputs: &mut dyn InputSource) -> Result<TickReport, KernelError> {
        if let Some(report) = &self.halted {
            return Err(KernelError::Halted { tick: report.tick });
        }
        let tick = match self.clock.peek_next() {
            Ok(tick) => tick,
            Err(err) => return Err(self.halt(self.clock.current(), err.into())),
        };
        match self.compute(tick, &*inputs) {
            Ok(staged) => self.commit(staged, inputs),
            Err(err) => Err(self.halt(tick, err)),
        }
    }

    /// Steps 1 to 7 on a working copy.
    fn compute(&self, tick: u64, inputs: &dyn InputSource) -> Result<StagedTick, KernelError> {
        let mut world = self.world.clone();
        let mut rng = self.rng.clone();
        rng.begin_tick(tick);
        let mut emitter = Emitter {
            tick,
            next_id: self.next_observation_id,
            events: Vec::new(),
        };

        let mut events = inputs.inputs_for_tick(tick);
        events.sort_by_key(InputEvent::key);
        let (mut applied, mut vetoed, mut rejected) = (0_usize, 0_usize, 0_usize);

        for event in &events {
            let key = event.key();
            if let Err(rejection) = validate_input(event, tick, &world) {
                warn!(
                    tick,
                    key = %key,
                    reason = ?rejection.reason,
                    detail = %rejection.detail,
                    "Input rejected"
                );
                emitter.emit(
                    Some(key),
                    ObservationPayload::Rejected {
                        reason: rejection.reason,
                        detail: rejection.detail,
                    },
                )?;
                rejected = rejected.saturating_add(1);
                continue;
            }

            let mut draft = world.clone();
            let mut veto = None;
            for pass in &APPLY_ORDER {
                let mut ctx = PassContext {
                    tick,
                    event,
                    rng: &mut rng,
                };
                if let PassOutcome::Veto { reason, detail } = pass.apply(&mut draft, &mut ctx)? {
                    veto = Some((pass.subsystem(), reason, detail));
                    break;
                }
            }

            if let Some((subsystem, reason, detail)) = veto {
                let rolled_back = rng.abort_action();
                debug!(
                    tick,
                    key = %key,
                    %subsystem,
                    ?reason,
                    rolled_back,
                    "Action vetoed"
                );
                emitter.emit(
                    Some(key),
                    ObservationPayload::Vetoed {
                        subsystem,
                        reason,
                        detail,
                    },
                )?;
                vetoed = vetoed.saturating_add(1);
            } else {
                rng.commit_action();
                let entries = diff_states(&world, &draft);
                debug!(
                    tick,
                    key = %key,
                    kind = event.action.kind(),
                    changes = entries.len(),
                    "Action applied"
                );
                world = draft;
                emitter.emit(
                    Some(key),
                    ObservationPayload::StateDiff {
                        origin: event.action.kind().to_owned(),
                        entries,
                    },
                )?;
                applied = applied.saturating_add(1);
            }
        }

        let before_step = world.clone();
        regenerate_nodes(&mut world, &mut rng)?;
        rng.commit_action();
        let step_diff = diff_states(&before_step, &world);
        if !step_diff.is_empty() {
            emitter.emit(
                None,
                ObservationPayload::StateDiff {
                    origin: "environment".to_owned(),
                    entries: step_diff,
                },
            )?;
        }

        let draws = rng.take_committed();
        if !draws.is_empty() {
            emitter.emit(
                None,
                ObservationPayload::RngDraws {
                    draws: summarize_draws(&draws),
                },
            )?;
        }

        let state_bytes = encode_state(tick, &world, &rng.counters())?;
        let prev_hash = self.chain.head();
        let world_hash = HashChain::link(&prev_hash, &state_bytes);
        if let Some(expected) = self.expected.get(&tick).copied()
            && expected != world_hash
        {
            return Err(KernelError::Divergence {
                report: Box::new(DivergenceReport {
                    tick,
                    kind: DivergenceKind::HashMismatch {
                        expected,
                        actual: world_hash,
                    },
                    last_good_tick: self.clock.current(),
                    last_good_hash: prev_hash,
                }),
            });
        }
        emitter.emit(None, ObservationPayload::Checkpoint { world_hash })?;

        Ok(StagedTick {
            tick,
            world,
            rng,
            state_bytes,
            world_hash,
            draws,
            observations: emitter.events,
            next_observation_id: emitter.next_id,
            inputs: events.len(),
            applied,
            vetoed,
            rejected,
        })
    }

    /// Step 8: swap the working copy in and record the checkpoint.
    fn commit(
        &mut self,
        staged: StagedTick,
        inputs: &mut dyn InputSource,
    ) -> Result<TickReport, KernelError> {
        let snapshot = if self.on_cadence(staged.tick) {
            match self.capture(&staged) {
                Ok(snapshot) => Some(snapshot),
                Err(err) => return Err(self.halt(staged.tick, err)),
            }
        } else {
            None
        };

        let prev_hash = self.chain.head();
        self.world = staged.world;
        self.rng = staged.rng;
        self.chain = HashChain::resume(staged.world_hash);
        self.clock = TickClock::resume_at(staged.tick);
        self.checkpoints.push(Checkpoint {
            tick: staged.tick,
            world_hash: staged.world_hash,
        });
        let rng_draws = staged.draws.len();
        self.audit.extend(staged.draws);
        self.next_observation_id = staged.next_observation_id;
        if let Some(snapshot) = &snapshot {
            self.latest_snapshot = snapshot.clone();
        }
        inputs.seal_through(staged.tick);

        info!(
            tick = staged.tick,
            world_hash = %staged.world_hash,
            prev_hash = %prev_hash.short(),
            inputs = staged.inputs,
            applied = staged.applied,
            vetoed = staged.vetoed,
            rejected = staged.rejected,
            rng_draws,
            snapshot = snapshot.is_some(),
            "Tick committed"
        );

        Ok(TickReport {
            tick: staged.tick,
            world_hash: staged.world_hash,
            inputs: staged.inputs,
            applied: staged.applied,
            vetoed: staged.vetoed,
            rejected: staged.rejected,
            rng_draws,
            observations: staged.observations,
            snapshot,
        })
    }

    fn on_cadence(&self, tick: u64) -> bool {
        tick.checked_rem(self.snapshot_cadence) == Some(0)
    }

    fn capture(&self, staged: &StagedTick) -> Result<Snapshot, KernelError> {
        Ok(Snapshot::seal(SnapshotParts {
            genesis_fingerprint: self.genesis_fingerprint,
            tick: staged.tick,
            canonical_state_bytes: staged.state_bytes.clone(),
            rng_stream_counters: staged.rng.counter_list(),
            prev_world_hash: self.chain.head(),
            world_hash: staged.world_hash,
            prev_checkpoint_hash: self.latest_snapshot.checksum,
        })?)
    }

    /// Record the divergence report and log it. Returns the error to hand
    /// back to the caller.
    fn halt(&mut self, tick: u64, err: KernelError) -> KernelError {
        let report = match &err {
            KernelError::Divergence { report } => (**report).clone(),
            other => DivergenceReport {
                tick,
                kind: DivergenceKind::Fault {
                    message: other.to_string(),
                },
                last_good_tick: self.clock.current(),
                last_good_hash: self.chain.head(),
            },
        };
        let rendered = serde_json::to_string(&report).unwrap_or_else(|_| format!("{report:?}"));
        error!(tick = report.tick, report = %rendered, "Pipeline halted");
        self.halted = Some(report);
        err
    }
}

/// The Environment world step: every node below capacity rolls once.
fn regenerate_nodes(world: &mut WorldState, rng: &mut RngStreamManager) -> Result<(), KernelError> {
    let chance = world.rules.regen_chance_per_mille;
    for node in world.nodes.values_mut() {
        if node.amount >= node.capacity {
            continue;
        }
        let roll = rng.draw_below(
            Subsystem::Environment,
            REGEN_STREAM,
            REGEN_ROLL_BOUND,
            "environment.regen",
        )?;
        if regen_roll_succeeds(roll, chance) {
            regenerate(node)?;
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use lockstep_events::EventLog;
    use lockstep_rng::RngError;
    use lockstep_types::{Action, EntityId, RejectionReason, SourceId, VetoReason};
    use lockstep_world::{NodeSpec, WorldSpec};

    use super::*;
    use crate::passes::fixtures;

    fn genesis(cadence: u64) -> Genesis {
        Genesis::new(
            42,
            cadence,
            SourceId(1),
            [
                StreamKey::new(Subsystem::Biology, 0),
                StreamKey::new(Subsystem::Cognition, 0),
                StreamKey::new(Subsystem::Environment, 0),
            ],
            fixtures::world(),
        )
        .unwrap()
    }

    fn log_with(events: Vec<InputEvent>) -> EventLog {
        let mut log = EventLog::new();
        for event in events {
            log.append(event).unwrap();
        }
        log
    }

    #[test]
    fn empty_tick_advances_by_one() {
        let g = genesis(10);
        let mut pipeline = AuthorityPipeline::new(&g).unwrap();
        let mut log = EventLog::new();
        let report = pipeline.tick(&mut log).unwrap();
        assert_eq!(report.tick, 1);
        assert_eq!(pipeline.tick_count(), 1);
        assert_eq!(pipeline.checkpoints().len(), 2);
        assert_eq!(log.sealed_through(), Some(1));
        assert_ne!(report.world_hash, g.world_hash_zero().unwrap());
    }

    #[test]
    fn genesis_checkpoint_matches_world_hash_zero() {
        let g = genesis(10);
        let pipeline = AuthorityPipeline::new(&g).unwrap();
        assert_eq!(pipeline.world_hash(), g.world_hash_zero().unwrap());
        assert_eq!(pipeline.latest_snapshot().tick, 0);
    }

    #[test]
    fn rejected_and_vetoed_inputs_are_observed() {
        let g = genesis(10);
        let mut pipeline = AuthorityPipeline::new(&g).unwrap();
        let mut log = log_with(vec![
            InputEvent::new(1, SourceId::KERNEL, 0, Action::Rest { entity: EntityId(1) }),
            InputEvent::new(1, SourceId(20), 0, Action::Plan { entity: EntityId(2) }),
            InputEvent::new(1, SourceId(10), 0, Action::Rest { entity: EntityId(1) }),
        ]);
        let report = pipeline.tick(&mut log).unwrap();
        assert_eq!((report.rejected, report.vetoed, report.applied), (1, 1, 1));

        let rejected = report.observations.iter().find(|o| o.is_rejection()).unwrap();
        assert!(matches!(
            rejected.payload,
            ObservationPayload::Rejected {
                reason: RejectionReason::ReservedSource,
                ..
            }
        ));
        let vetoed = report.observations.iter().find(|o| o.is_veto()).unwrap();
        assert!(matches!(
            vetoed.payload,
            ObservationPayload::Vetoed {
                subsystem: Subsystem::Biology,
                reason: VetoReason::InsufficientEnergy,
                ..
            }
        ));
        assert!(matches!(
            report.observations.last().map(|o| &o.payload),
            Some(ObservationPayload::Checkpoint { .. })
        ));
    }

    #[test]
    fn observation_ids_increase_across_ticks() {
        let g = genesis(10);
        let mut pipeline = AuthorityPipeline::new(&g).unwrap();
        let mut log = EventLog::new();
        let first = pipeline.tick(&mut log).unwrap();
        let second = pipeline.tick(&mut log).unwrap();
        let ids: Vec<u64> = first
            .observations
            .iter()
            .chain(&second.observations)
            .map(|o| o.id)
            .collect();
        assert!(ids.len() >= 2);
        assert!(ids.windows(2).all(|w| w.first() < w.last()));
    }

    #[test]
    fn snapshots_follow_the_cadence() {
        let g = genesis(2);
        let mut pipeline = AuthorityPipeline::new(&g).unwrap();
        let mut log = EventLog::new();
        let first = pipeline.tick(&mut log).unwrap();
        let second = pipeline.tick(&mut log).unwrap();
        assert!(first.snapshot.is_none());
        let snapshot = second.snapshot.unwrap();
        assert_eq!(snapshot.tick, 2);
        assert_eq!(snapshot.world_hash, second.world_hash);
        assert_eq!(snapshot.prev_world_hash, first.world_hash);
        snapshot.verify(g.fingerprint()).unwrap();
    }

    #[test]
    fn expected_checkpoint_mismatch_halts() {
        let g = genesis(10);
        let bogus = Checkpoint {
            tick: 2,
            world_hash: Digest::ZERO,
        };
        let mut pipeline = AuthorityPipeline::new(&g)
            .unwrap()
            .with_expected_checkpoints([bogus]);
        let mut log = EventLog::new();
        let first = pipeline.tick(&mut log).unwrap();

        let err = pipeline.tick(&mut log).unwrap_err();
        assert!(matches!(err, KernelError::Divergence { .. }));
        let report = pipeline.divergence().unwrap();
        assert_eq!(report.tick, 2);
        assert_eq!(report.last_good_tick, 1);
        assert_eq!(report.last_good_hash, first.world_hash);

        // Nothing was committed and nothing more will be.
        assert_eq!(pipeline.tick_count(), 1);
        assert!(matches!(
            pipeline.tick(&mut log),
            Err(KernelError::Halted { tick: 2 })
        ));
    }

    #[test]
    fn undeclared_stream_is_fatal() {
        let g = Genesis::new(
            42,
            10,
            SourceId(1),
            [StreamKey::new(Subsystem::Environment, 0)],
            fixtures::world(),
        )
        .unwrap();
        let mut pipeline = AuthorityPipeline::new(&g).unwrap();
        let mut log = log_with(vec![InputEvent::new(
            1,
            SourceId(10),
            0,
            Action::Forage { entity: EntityId(1) },
        )]);
        assert!(matches!(
            pipeline.tick(&mut log),
            Err(KernelError::Rng {
                source: RngError::Undeclared { .. }
            })
        ));
        assert!(pipeline.is_halted());
        assert!(matches!(
            pipeline.divergence().map(|r| &r.kind),
            Some(DivergenceKind::Fault { .. })
        ));
    }

    #[test]
    fn undeclared_environment_stream_is_the_same_fault() {
        let world = WorldSpec {
            nodes: vec![NodeSpec {
                x: 0,
                y: 0,
                amount: 0,
                capacity: 3,
                regen: 1,
            }],
            ..WorldSpec::default()
        }
        .build(SourceId(1))
        .unwrap();
        let g = Genesis::new(
            42,
            10,
            SourceId(1),
            [StreamKey::new(Subsystem::Biology, 0)],
            world,
        )
        .unwrap();
        let mut pipeline = AuthorityPipeline::new(&g).unwrap();
        assert!(matches!(
            pipeline.tick(&mut EventLog::new()),
            Err(KernelError::Rng {
                source: RngError::Undeclared { .. }
            })
        ));
        assert_eq!(pipeline.divergence().map(|r| r.tick), Some(1));
    }

    #[test]
    fn clock_overflow_names_the_last_committed_tick() {
        let g = genesis(10);
        let mut state = g.initial_state();
        state.tick = u64::MAX;
        let bytes = lockstep_hash::to_canonical_bytes(&state).unwrap();
        let snapshot = Snapshot::seal(SnapshotParts {
            genesis_fingerprint: g.fingerprint(),
            tick: u64::MAX,
            canonical_state_bytes: bytes.clone(),
            rng_stream_counters: AuthorityPipeline::new(&g)
                .unwrap()
                .latest_snapshot()
                .rng_stream_counters
                .clone(),
            prev_world_hash: Digest::ZERO,
            world_hash: HashChain::link(&Digest::ZERO, &bytes),
            prev_checkpoint_hash: Digest::ZERO,
        })
        .unwrap();

        let mut pipeline = AuthorityPipeline::from_snapshot(&g, &snapshot).unwrap();
        assert!(matches!(
            pipeline.tick(&mut EventLog::new()),
            Err(KernelError::Clock { .. })
        ));
        let report = pipeline.divergence().unwrap();
        assert_eq!(report.tick, pipeline.tick_count());
        assert_eq!(report.last_good_tick, u64::MAX);
        assert!(matches!(report.kind, DivergenceKind::Fault { .. }));
    }

    #[test]
    fn report_serializes_with_kind_tag() {
        let report = DivergenceReport {
            tick: 4,
            kind: DivergenceKind::Fault {
                message: "boom".to_owned(),
            },
            last_good_tick: 3,
            last_good_hash: Digest::ZERO,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json.get("kind").and_then(|k| k.get("kind")).and_then(|k| k.as_str()),
            Some("fault")
        );
    }
}
