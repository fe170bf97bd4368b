//! Engine binary for the Lockstep kernel.
//!
//! Loads configuration, rebuilds the event log from its journal, resumes
//! from the newest verified snapshot (or starts from genesis), and runs the
//! tick schedule until the tick limit is reached, the input file is
//! exhausted and applied, or the process is interrupted.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `LOCKSTEP_CONFIG` or `lockstep-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the genesis and its fingerprint
//! 4. Open the snapshot directory, the event journal and the observation feed
//! 5. Resume from the newest verified snapshot, or persist the genesis one
//! 6. Open the ingress, start the input feed and the persistence task
//! 7. Run the schedule
//! 8. Flush persistence and log the result

mod error;
mod feed;
mod persist;

use std::path::PathBuf;
use std::time::Duration;

use lockstep_core::config::{KernelConfig, LoggingConfig};
use lockstep_core::runner::{ScheduleOptions, ScheduleResult, run_schedule};
use lockstep_core::tick::AuthorityPipeline;
use lockstep_db::{EventJournal, FileSnapshotStore, ObservationFeed};
use lockstep_events::ingress;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::error::EngineError;
use crate::persist::{PersistObserver, persist_loop};

/// Default configuration file, relative to the working directory.
const CONFIG_FILE: &str = "lockstep-config.yaml";

/// How the schedule stopped.
enum Outcome {
    Finished(Result<ScheduleResult, lockstep_core::error::KernelError>),
    PersistenceStopped(Result<Result<persist::PersistStats, EngineError>, tokio::task::JoinError>),
    Interrupted,
}

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if boot fails, the kernel halts, or persistence fails.
#[tokio::main]
#[allow(clippy::too_many_lines)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let (config, config_path) = load_config()?;

    // 2. Initialize structured logging.
    init_logging(&config.logging);
    info!("lockstep-engine starting");
    match &config_path {
        Some(path) => info!(path = %path.display(), "Configuration loaded"),
        None => info!("Config file not found, using defaults"),
    }
    info!(
        root_seed = config.genesis.root_seed,
        snapshot_cadence = config.genesis.snapshot_cadence,
        streams = config.genesis.streams.len(),
        tick_interval_ms = config.engine.tick_interval_ms,
        max_ticks = config.engine.max_ticks,
        "Configuration validated"
    );

    // 3. Build the genesis.
    let genesis = config.genesis.to_genesis()?;
    info!(
        fingerprint = %genesis.fingerprint(),
        entities = genesis.world().entities.len(),
        nodes = genesis.world().nodes.len(),
        "Genesis built"
    );

    // 4. Open storage.
    let store = FileSnapshotStore::open(&config.engine.snapshot_dir).map_err(EngineError::from)?;
    let (journal, mut log) =
        EventJournal::open(&config.engine.journal_path).map_err(EngineError::from)?;
    let feed = ObservationFeed::open(&config.engine.observation_path).map_err(EngineError::from)?;
    info!(
        snapshot_dir = %store.dir().display(),
        journal = %journal.path().display(),
        journal_records = journal.len(),
        "Storage opened"
    );

    // 5. Resume or start fresh.
    let mut pipeline = match store
        .latest_verified(genesis.fingerprint())
        .map_err(EngineError::from)?
    {
        Some(snapshot) => AuthorityPipeline::from_snapshot(&genesis, &snapshot)
            .map_err(EngineError::from)?,
        None => {
            let pipeline = AuthorityPipeline::new(&genesis).map_err(EngineError::from)?;
            let id = store
                .write(pipeline.latest_snapshot())
                .map_err(EngineError::from)?;
            info!(file = %id, world_hash = %pipeline.world_hash(), "Genesis snapshot persisted");
            pipeline
        }
    };
    if let Some(last) = log.last_event_tick()
        && last > pipeline.tick_count()
    {
        info!(
            from_tick = pipeline.tick_count(),
            through_tick = last,
            "Journaled inputs ahead of the snapshot will be re-applied"
        );
    }
    log.seal(pipeline.tick_count());

    // 6. Ingress, input feed, and persistence.
    let (producer, mut receiver) = ingress(config.engine.ingress_capacity);
    info!(capacity = producer.capacity(), "Ingress open");
    let (feeder, held_producer) = match config.engine.input_path.clone() {
        Some(path) => (Some(tokio::spawn(feed::feed_file(path, producer))), None),
        None => (None, Some(producer)),
    };
    let io_timeout = Duration::from_millis(config.engine.io_timeout_ms);
    let (job_tx, job_rx) = mpsc::unbounded_channel();
    let mut persist_task = tokio::spawn(persist_loop(job_rx, store, journal, feed, io_timeout));
    let mut observer = PersistObserver::new(job_tx);
    info!(
        io_timeout_ms = config.engine.io_timeout_ms,
        feeding = feeder.is_some(),
        "Persistence started, entering tick loop"
    );

    // 7. Run the schedule.
    let options = ScheduleOptions {
        interval: Duration::from_millis(config.engine.tick_interval_ms),
        max_ticks: config.engine.max_ticks,
    };
    let outcome = tokio::select! {
        result = run_schedule(&mut pipeline, &mut log, &mut receiver, &mut observer, options) => {
            Outcome::Finished(result)
        }
        joined = &mut persist_task => Outcome::PersistenceStopped(joined),
        _ = tokio::signal::ctrl_c() => Outcome::Interrupted,
    };
    drop(observer);
    drop(held_producer);
    receiver.close();
    if let Some(feeder) = feeder {
        match feeder.await {
            Ok(Ok(submitted)) => info!(submitted, "Input feed finished"),
            Ok(Err(err)) => warn!(error = %err, "Input feed failed"),
            Err(err) => warn!(error = %err, "Input feed task panicked"),
        }
    }

    // 8. Flush persistence and report.
    let schedule = match outcome {
        Outcome::Finished(result) => result.map_err(EngineError::from),
        Outcome::Interrupted => {
            warn!(
                tick = pipeline.tick_count(),
                world_hash = %pipeline.world_hash(),
                "Interrupted after the last committed tick"
            );
            let stats = flatten_persistence(persist_task.await)?;
            info!(
                records_written = stats.records_written,
                observations_written = stats.observations_written,
                snapshots_written = stats.snapshots_written,
                "lockstep-engine shutdown complete"
            );
            return Ok(());
        }
        Outcome::PersistenceStopped(joined) => {
            let err = flatten_persistence(joined)
                .err()
                .unwrap_or_else(|| EngineError::Persistence {
                    message: "persistence task exited while the schedule was running".to_owned(),
                });
            return Err(err.into());
        }
    };
    let stats = flatten_persistence(persist_task.await)?;
    let result = schedule?;

    info!(
        reason = ?result.end,
        ticks_run = result.ticks_run,
        final_tick = result.final_tick,
        final_hash = %result.final_hash,
        events_accepted = result.events_accepted,
        events_refused = result.events_refused,
        records_written = stats.records_written,
        observations_written = stats.observations_written,
        snapshots_written = stats.snapshots_written,
        "lockstep-engine shutdown complete"
    );
    Ok(())
}

fn flatten_persistence(
    joined: Result<Result<persist::PersistStats, EngineError>, tokio::task::JoinError>,
) -> Result<persist::PersistStats, EngineError> {
    joined.map_err(|e| EngineError::Persistence {
        message: format!("persistence task panicked: {e}"),
    })?
}

/// Load and validate configuration.
///
/// Uses the file named by `LOCKSTEP_CONFIG`, else `lockstep-config.yaml` in
/// the working directory, else defaults. Returns the path actually read.
fn load_config() -> Result<(KernelConfig, Option<PathBuf>), EngineError> {
    let path = std::env::var_os("LOCKSTEP_CONFIG").map_or_else(|| PathBuf::from(CONFIG_FILE), PathBuf::from);
    let (config, read_from) = if path.exists() {
        (KernelConfig::from_file(&path)?, Some(path))
    } else {
        let mut config = KernelConfig::default();
        config.apply_env_overrides();
        (config, None)
    };
    config.validate()?;
    Ok((config, read_from))
}

/// Install the global tracing subscriber. `RUST_LOG` wins over the
/// configured level.
fn init_logging(config: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);
    if config.json {
        builder.json().init();
    } else {
        builder.init();
    }
}
