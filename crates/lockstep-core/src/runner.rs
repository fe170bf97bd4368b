//! Wall-clock scheduling around the authority pipeline.
//!
//! [`run_schedule`] owns the only loop in the kernel. Between ticks it
//! drains the ingress queue into the event log; on each interval tick it
//! calls [`AuthorityPipeline::tick`] and hands the report to a
//! [`TickObserver`]. Wall-clock time decides *when* a tick runs, never what
//! it computes.

use std::time::Duration;

use lockstep_events::{EventLog, IngressReceiver, LogRecord};
use lockstep_hash::Digest;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::error::KernelError;
use crate::tick::{AuthorityPipeline, DivergenceReport, TickReport};

/// Callback invoked around each tick.
///
/// Implementations forward reports to observers, persist snapshots, or
/// journal accepted events. Callbacks run on the scheduler task and must
/// not block for long.
pub trait TickObserver: Send {
    /// Called with the records appended by an ingress drain, before the
    /// tick that consumes them.
    fn on_accepted(&mut self, records: &[LogRecord]) {
        let _ = records;
    }

    /// Called after a tick commits. The report carries the tick's
    /// observations; the pipeline keeps no copy.
    fn on_tick(&mut self, report: &TickReport);

    /// Called once if the pipeline halts.
    fn on_halt(&mut self, report: &DivergenceReport) {
        let _ = report;
    }
}

/// A no-op observer for testing.
pub struct NoOpObserver;

impl TickObserver for NoOpObserver {
    fn on_tick(&mut self, _report: &TickReport) {}
}

/// How long and how fast to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleOptions {
    /// Wall-clock time between ticks.
    pub interval: Duration,
    /// Stop once this tick has committed.
    pub max_ticks: Option<u64>,
}

/// Why the schedule stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScheduleEnd {
    /// `max_ticks` was reached.
    TickLimit,
    /// Every producer hung up and the queue is empty.
    IngressClosed,
}

/// Result of a scheduled run.
#[derive(Debug, Clone)]
pub struct ScheduleResult {
    /// Why the run ended.
    pub end: ScheduleEnd,
    /// Ticks committed during this run.
    pub ticks_run: u64,
    /// Last committed tick.
    pub final_tick: u64,
    /// `WorldHash(final_tick)`.
    pub final_hash: Digest,
    /// Inputs appended to the log during this run.
    pub events_accepted: usize,
    /// Inputs the log refused during this run.
    pub events_refused: usize,
}

/// Run ticks on a fixed wall-clock interval.
///
/// # Errors
///
/// Returns the fatal [`KernelError`] that halted the pipeline. The observer
/// has already received the [`DivergenceReport`] when this happens.
pub async fn run_schedule(
    pipeline: &mut AuthorityPipeline,
    log: &mut EventLog,
    ingress: &mut IngressReceiver,
    observer: &mut dyn TickObserver,
    options: ScheduleOptions,
) -> Result<ScheduleResult, KernelError> {
    let mut ticks_run: u64 = 0;
    let mut events_accepted: usize = 0;
    let mut events_refused: usize = 0;

    info!(
        start_tick = pipeline.tick_count(),
        interval_ms = u64::try_from(options.interval.as_millis()).unwrap_or(u64::MAX),
        max_ticks = options.max_ticks,
        "Schedule starting"
    );

    let mut interval = tokio::time::interval(options.interval.max(Duration::from_millis(1)));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let end = loop {
        if options
            .max_ticks
            .is_some_and(|max| pipeline.tick_count() >= max)
        {
            info!(tick = pipeline.tick_count(), "Tick limit reached");
            break ScheduleEnd::TickLimit;
        }

        interval.tick().await;

        // --- Drain producers into the log ---
        let before = log.len();
        let drained = ingress.drain_into(log);
        events_accepted = events_accepted.saturating_add(drained.accepted);
        events_refused = events_refused.saturating_add(drained.refused.len());
        for (key, err) in &drained.refused {
            warn!(key = %key, error = %err, "Input refused by the event log");
        }
        if let Some(appended) = log.records().get(before..)
            && !appended.is_empty()
        {
            observer.on_accepted(appended);
        }

        // --- Commit one tick ---
        match pipeline.tick(log) {
            Ok(report) => {
                ticks_run = ticks_run.saturating_add(1);
                observer.on_tick(&report);
            }
            Err(err) => {
                if let Some(report) = pipeline.divergence() {
                    observer.on_halt(report);
                }
                return Err(err);
            }
        }

        if drained.closed && log.last_event_tick().is_none_or(|t| t <= pipeline.tick_count()) {
            info!(tick = pipeline.tick_count(), "Ingress closed");
            break ScheduleEnd::IngressClosed;
        }
    };

    let result = ScheduleResult {
        end,
        ticks_run,
        final_tick: pipeline.tick_count(),
        final_hash: pipeline.world_hash(),
        events_accepted,
        events_refused,
    };
    info!(
        reason = ?result.end,
        ticks_run = result.ticks_run,
        final_tick = result.final_tick,
        final_hash = %result.final_hash,
        "Schedule ended"
    );
    Ok(result)
}
