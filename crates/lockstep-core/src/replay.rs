//! Replay harness.
//!
//! Replays drive a fresh [`AuthorityPipeline`] over a recorded [`EventLog`]
//! without touching the log: the log is read through [`ReplaySource`],
//! which never seals. Two replays of the same log under the same genesis
//! must produce identical checkpoint feeds, and a replay started from a
//! snapshot must agree with a full replay at every tick after it.

use lockstep_events::{EventLog, InputSource};
use lockstep_hash::Digest;
use lockstep_types::InputEvent;
use tracing::{info, warn};

use crate::error::KernelError;
use crate::genesis::Genesis;
use crate::snapshot::Snapshot;
use crate::tick::{AuthorityPipeline, Checkpoint, DivergenceKind, DivergenceReport};

/// Read-only view of a recorded log.
#[derive(Debug, Clone, Copy)]
pub struct ReplaySource<'a> {
    log: &'a EventLog,
}

impl<'a> ReplaySource<'a> {
    /// Wrap a log.
    pub const fn new(log: &'a EventLog) -> Self {
        Self { log }
    }
}

impl InputSource for ReplaySource<'_> {
    fn inputs_for_tick(&self, tick: u64) -> Vec<InputEvent> {
        self.log.inputs_for_tick(tick)
    }
}

/// Counters gathered during a replay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStatistics {
    /// Ticks committed by the replay.
    pub ticks_replayed: u64,
    /// Inputs fetched across those ticks.
    pub events_replayed: u64,
}

/// Result of a replay.
#[derive(Debug, Clone)]
pub struct ReplayOutcome {
    /// Checkpoint feed, starting at the tick the replay started from.
    pub checkpoints: Vec<Checkpoint>,
    /// Hash of the last committed tick.
    pub final_hash: Digest,
    /// Counters.
    pub statistics: ReplayStatistics,
}

fn drive(
    mut pipeline: AuthorityPipeline,
    log: &EventLog,
    through_tick: u64,
) -> Result<ReplayOutcome, KernelError> {
    let mut source = ReplaySource::new(log);
    let mut statistics = ReplayStatistics::default();
    while pipeline.tick_count() < through_tick {
        let report = pipeline.tick(&mut source)?;
        statistics.ticks_replayed = statistics.ticks_replayed.saturating_add(1);
        statistics.events_replayed = statistics
            .events_replayed
            .saturating_add(u64::try_from(report.inputs).unwrap_or(u64::MAX));
    }
    Ok(ReplayOutcome {
        checkpoints: pipeline.checkpoints().to_vec(),
        final_hash: pipeline.world_hash(),
        statistics,
    })
}

/// Replay from genesis through `through_tick`.
///
/// # Errors
///
/// Returns the fatal [`KernelError`] that halted the replay.
pub fn full_replay(
    genesis: &Genesis,
    log: &EventLog,
    through_tick: u64,
) -> Result<ReplayOutcome, KernelError> {
    let outcome = drive(AuthorityPipeline::new(genesis)?, log, through_tick)?;
    info!(
        ticks = outcome.statistics.ticks_replayed,
        events = outcome.statistics.events_replayed,
        final_hash = %outcome.final_hash,
        "Full replay finished"
    );
    Ok(outcome)
}

/// Replay from a verified snapshot through `through_tick`.
///
/// # Errors
///
/// Returns [`KernelError::Snapshot`] if the snapshot fails verification,
/// or the fatal error that halted the replay.
pub fn replay_from_snapshot(
    genesis: &Genesis,
    snapshot: &Snapshot,
    log: &EventLog,
    through_tick: u64,
) -> Result<ReplayOutcome, KernelError> {
    let outcome = drive(
        AuthorityPipeline::from_snapshot(genesis, snapshot)?,
        log,
        through_tick,
    )?;
    info!(
        from_tick = snapshot.tick,
        ticks = outcome.statistics.ticks_replayed,
        final_hash = %outcome.final_hash,
        "Snapshot replay finished"
    );
    Ok(outcome)
}

/// Replay from genesis against a recorded checkpoint feed. The replay halts
/// at the first tick whose recomputed hash disagrees.
///
/// # Errors
///
/// Returns [`KernelError::Divergence`] naming the first diverging tick.
pub fn replay_against(
    genesis: &Genesis,
    log: &EventLog,
    recorded: &[Checkpoint],
) -> Result<ReplayOutcome, KernelError> {
    let through_tick = recorded.iter().map(|c| c.tick).max().unwrap_or(0);
    let pipeline = AuthorityPipeline::new(genesis)?.with_expected_checkpoints(recorded.iter().copied());
    if let Some(genesis_tick) = recorded.iter().find(|c| c.tick == 0)
        && genesis_tick.world_hash != pipeline.world_hash()
    {
        return Err(KernelError::Divergence {
            report: Box::new(DivergenceReport {
                tick: 0,
                kind: DivergenceKind::HashMismatch {
                    expected: genesis_tick.world_hash,
                    actual: pipeline.world_hash(),
                },
                last_good_tick: 0,
                last_good_hash: Digest::ZERO,
            }),
        });
    }
    drive(pipeline, log, through_tick)
}

/// The first tick present in both feeds whose hashes differ.
pub fn first_divergence(a: &[Checkpoint], b: &[Checkpoint]) -> Option<u64> {
    a.iter()
        .filter_map(|left| {
            b.iter()
                .find(|right| right.tick == left.tick)
                .filter(|right| right.world_hash != left.world_hash)
                .map(|_| left.tick)
        })
        .min()
}

/// Replay twice from genesis and check that both runs agree at every tick.
///
/// # Errors
///
/// Returns [`KernelError::Divergence`] naming the first tick where the two
/// runs disagree, or the fatal error that halted either run.
pub fn verify_determinism(
    genesis: &Genesis,
    log: &EventLog,
    through_tick: u64,
) -> Result<ReplayOutcome, KernelError> {
    let first = full_replay(genesis, log, through_tick)?;
    let second = full_replay(genesis, log, through_tick)?;
    if let Some(tick) = first_divergence(&first.checkpoints, &second.checkpoints) {
        warn!(tick, "Replays diverged");
        let expected = hash_at(&first.checkpoints, tick);
        let actual = hash_at(&second.checkpoints, tick);
        let last_good_tick = tick.saturating_sub(1);
        return Err(KernelError::Divergence {
            report: Box::new(DivergenceReport {
                tick,
                kind: DivergenceKind::HashMismatch { expected, actual },
                last_good_tick,
                last_good_hash: hash_at(&first.checkpoints, last_good_tick),
            }),
        });
    }
    Ok(second)
}

fn hash_at(checkpoints: &[Checkpoint], tick: u64) -> Digest {
    checkpoints
        .iter()
        .find(|c| c.tick == tick)
        .map_or(Digest::ZERO, |c| c.world_hash)
}
