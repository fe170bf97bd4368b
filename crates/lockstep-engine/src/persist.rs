//! Tick observer that moves kernel output to durable storage.
//!
//! [`PersistObserver`] runs on the scheduler task and only enqueues work:
//! accepted records, each tick's observations, and cadence snapshots.
//! [`persist_loop`] runs on its own task and performs the blocking writes
//! on the blocking pool, each bounded by the configured I/O timeout. Jobs
//! are handled in the order they were queued, so the snapshot for tick `t`
//! is written only after the journal holds every input accepted before
//! tick `t` ran.

use std::time::Duration;

use lockstep_core::runner::TickObserver;
use lockstep_core::snapshot::Snapshot;
use lockstep_core::tick::{DivergenceReport, TickReport};
use lockstep_db::{EventJournal, FileSnapshotStore, ObservationFeed};
use lockstep_events::LogRecord;
use lockstep_types::ObservationEvent;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::error::EngineError;

/// Work queued for the persistence task.
#[derive(Debug)]
pub enum PersistJob {
    /// Records newly appended to the event log.
    Records(Vec<LogRecord>),
    /// Observations emitted by one tick.
    Observations(Vec<ObservationEvent>),
    /// A cadence snapshot.
    Snapshot(Box<Snapshot>),
}

/// Observer that forwards accepted records, observations and snapshots to
/// [`persist_loop`].
pub struct PersistObserver {
    jobs: mpsc::UnboundedSender<PersistJob>,
    disconnected: bool,
}

impl PersistObserver {
    /// Create an observer feeding the given queue.
    pub const fn new(jobs: mpsc::UnboundedSender<PersistJob>) -> Self {
        Self {
            jobs,
            disconnected: false,
        }
    }

    fn send(&mut self, job: PersistJob) {
        if self.jobs.send(job).is_err() && !self.disconnected {
            self.disconnected = true;
            error!("Persistence task is gone; output is no longer stored");
        }
    }
}

impl TickObserver for PersistObserver {
    fn on_accepted(&mut self, records: &[LogRecord]) {
        self.send(PersistJob::Records(records.to_vec()));
    }

    fn on_tick(&mut self, report: &TickReport) {
        debug!(
            tick = report.tick,
            applied = report.applied,
            vetoed = report.vetoed,
            rejected = report.rejected,
            rng_draws = report.rng_draws,
            "Tick observed"
        );
        if !report.observations.is_empty() {
            self.send(PersistJob::Observations(report.observations.clone()));
        }
        if let Some(snapshot) = &report.snapshot {
            self.send(PersistJob::Snapshot(Box::new(snapshot.clone())));
        }
    }

    fn on_halt(&mut self, report: &DivergenceReport) {
        error!(
            tick = report.tick,
            last_good_tick = report.last_good_tick,
            "Halt observed; flushing queued persistence work"
        );
    }
}

/// What the persistence task wrote before its queue closed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistStats {
    /// Journal lines written.
    pub records_written: u64,
    /// Observation lines written.
    pub observations_written: u64,
    /// Snapshot files written.
    pub snapshots_written: u64,
}

/// Drain the job queue until every sender is dropped.
///
/// # Errors
///
/// Returns the first storage failure or timeout. Remaining jobs are not
/// attempted.
pub async fn persist_loop(
    mut jobs: mpsc::UnboundedReceiver<PersistJob>,
    store: FileSnapshotStore,
    mut journal: EventJournal,
    mut feed: ObservationFeed,
    io_timeout: Duration,
) -> Result<PersistStats, EngineError> {
    let mut stats = PersistStats::default();

    while let Some(job) = jobs.recv().await {
        match job {
            PersistJob::Records(records) => {
                let (returned, result) = run_blocking("journal append", io_timeout, move || {
                    let result = journal.append(&records);
                    (journal, result)
                })
                .await?;
                journal = returned;
                let written = u64::try_from(result?).unwrap_or(u64::MAX);
                stats.records_written = stats.records_written.saturating_add(written);
            }
            PersistJob::Observations(events) => {
                let (returned, result) = run_blocking("observation append", io_timeout, move || {
                    let result = feed.append(&events);
                    (feed, result)
                })
                .await?;
                feed = returned;
                let written = u64::try_from(result?).unwrap_or(u64::MAX);
                stats.observations_written = stats.observations_written.saturating_add(written);
            }
            PersistJob::Snapshot(snapshot) => {
                let writer = store.clone();
                let id =
                    run_blocking("snapshot write", io_timeout, move || writer.write(&snapshot))
                        .await??;
                debug!(file = %id, "Snapshot persisted");
                stats.snapshots_written = stats.snapshots_written.saturating_add(1);
            }
        }
    }

    info!(
        records_written = stats.records_written,
        observations_written = stats.observations_written,
        snapshots_written = stats.snapshots_written,
        journal_len = journal.len(),
        "Persistence drained"
    );
    Ok(stats)
}

/// Run blocking storage work under the I/O timeout.
async fn run_blocking<T, F>(what: &'static str, timeout: Duration, work: F) -> Result<T, EngineError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
    tokio::time::timeout(timeout, tokio::task::spawn_blocking(work))
        .await
        .map_err(|_elapsed| EngineError::IoTimeout { what, timeout_ms })?
        .map_err(|e| EngineError::Persistence {
            message: format!("{what} task failed: {e}"),
        })
}
