//! Configuration loading and typed config structures for the Lockstep kernel.
//!
//! The canonical configuration lives in `lockstep-config.yaml` at the project
//! root. The `genesis` section is the boot contract and is hashed into the
//! genesis fingerprint; the `engine` and `logging` sections only affect how
//! the binary schedules ticks and where it writes, never what a tick
//! computes.

use std::path::{Path, PathBuf};

use lockstep_rng::StreamKey;
use lockstep_types::{SourceId, Subsystem};
use lockstep_world::WorldSpec;
use serde::Deserialize;

use crate::genesis::Genesis;
use crate::passes::biology::FORAGE_STREAM;
use crate::passes::cognition::PLANNING_STREAM;
use crate::tick::REGEN_STREAM;

/// Streams the built-in passes draw from. A genesis must declare them all.
pub const REQUIRED_STREAMS: [StreamKey; 3] = [
    StreamKey::new(Subsystem::Biology, FORAGE_STREAM),
    StreamKey::new(Subsystem::Cognition, PLANNING_STREAM),
    StreamKey::new(Subsystem::Environment, REGEN_STREAM),
];

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but describes an unusable kernel.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level kernel configuration.
///
/// Mirrors the structure of `lockstep-config.yaml`. Every field has a
/// default, so an empty file is a valid (if empty) world.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct KernelConfig {
    /// The boot contract.
    #[serde(default)]
    pub genesis: GenesisConfig,

    /// Scheduling and I/O settings for the engine binary.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl KernelConfig {
    /// Load configuration from a YAML file, then apply `LOCKSTEP_*`
    /// environment overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, or
    /// [`ConfigError::Yaml`] if it is not valid YAML for this schema.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Override I/O paths and the log level from the environment.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("LOCKSTEP_SNAPSHOT_DIR") {
            self.engine.snapshot_dir = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("LOCKSTEP_JOURNAL_PATH") {
            self.engine.journal_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("LOCKSTEP_OBSERVATION_PATH") {
            self.engine.observation_path = PathBuf::from(val);
        }
        if let Ok(val) = std::env::var("LOCKSTEP_INPUT_PATH") {
            self.engine.input_path = Some(PathBuf::from(val));
        }
        if let Ok(val) = std::env::var("LOCKSTEP_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Reject configurations the kernel cannot run.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.genesis.validate()?;
        if self.engine.ingress_capacity == 0 {
            return Err(invalid("engine.ingress_capacity must be at least 1"));
        }
        if self.engine.tick_interval_ms == 0 {
            return Err(invalid("engine.tick_interval_ms must be at least 1"));
        }
        if self.engine.io_timeout_ms == 0 {
            return Err(invalid("engine.io_timeout_ms must be at least 1"));
        }
        Ok(())
    }
}

fn invalid(reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        reason: reason.into(),
    }
}

// ---------------------------------------------------------------------------
// Genesis
// ---------------------------------------------------------------------------

/// The `genesis` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct GenesisConfig {
    /// Root seed every RNG stream key derives from.
    #[serde(default = "default_root_seed")]
    pub root_seed: u64,

    /// Ticks between snapshots.
    #[serde(default = "default_snapshot_cadence")]
    pub snapshot_cadence: u64,

    /// The only source allowed to issue governance actions.
    #[serde(default = "default_governor")]
    pub governor: SourceId,

    /// Declared RNG streams.
    #[serde(default = "default_streams")]
    pub streams: Vec<StreamKey>,

    /// The tick-0 world.
    #[serde(default)]
    pub world: WorldSpec,
}

const fn default_root_seed() -> u64 {
    42
}

const fn default_snapshot_cadence() -> u64 {
    100
}

const fn default_governor() -> SourceId {
    SourceId(1)
}

fn default_streams() -> Vec<StreamKey> {
    REQUIRED_STREAMS.to_vec()
}

impl Default for GenesisConfig {
    fn default() -> Self {
        Self {
            root_seed: default_root_seed(),
            snapshot_cadence: default_snapshot_cadence(),
            governor: default_governor(),
            streams: default_streams(),
            world: WorldSpec::default(),
        }
    }
}

impl GenesisConfig {
    /// Reject a boot contract the kernel cannot run.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first problem.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.snapshot_cadence == 0 {
            return Err(invalid("genesis.snapshot_cadence must be at least 1"));
        }
        if self.streams.is_empty() {
            return Err(invalid("genesis.streams must declare at least one stream"));
        }
        if let Some(missing) = REQUIRED_STREAMS.iter().find(|k| !self.streams.contains(k)) {
            return Err(invalid(format!("genesis.streams must declare {missing}")));
        }
        if self.governor.is_reserved() {
            return Err(invalid(format!(
                "genesis.governor {} is reserved for the kernel",
                self.governor
            )));
        }
        self.world
            .build(self.governor)
            .map_err(|err| invalid(format!("genesis.world: {err}")))?;
        Ok(())
    }

    /// Validate and build the [`Genesis`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if validation fails or the genesis
    /// cannot be encoded.
    pub fn to_genesis(&self) -> Result<Genesis, ConfigError> {
        self.validate()?;
        let world = self
            .world
            .build(self.governor)
            .map_err(|err| invalid(format!("genesis.world: {err}")))?;
        Genesis::new(
            self.root_seed,
            self.snapshot_cadence,
            self.governor,
            self.streams.iter().copied(),
            world,
        )
        .map_err(|err| invalid(format!("genesis cannot be encoded: {err}")))
    }
}

// ---------------------------------------------------------------------------
// Engine and logging
// ---------------------------------------------------------------------------

/// The `engine` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct EngineConfig {
    /// Wall-clock milliseconds between ticks.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Stop after this tick. Runs until interrupted when absent.
    #[serde(default)]
    pub max_ticks: Option<u64>,

    /// Bounded ingress queue length.
    #[serde(default = "default_ingress_capacity")]
    pub ingress_capacity: usize,

    /// Timeout for each snapshot or journal write.
    #[serde(default = "default_io_timeout_ms")]
    pub io_timeout_ms: u64,

    /// Directory for snapshot documents.
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: PathBuf,

    /// Append-only event journal.
    #[serde(default = "default_journal_path")]
    pub journal_path: PathBuf,

    /// JSON Lines file receiving every observation event.
    #[serde(default = "default_observation_path")]
    pub observation_path: PathBuf,

    /// JSON Lines file of inputs to submit through the ingress at boot.
    /// The ingress closes once the file is exhausted.
    #[serde(default)]
    pub input_path: Option<PathBuf>,
}

const fn default_tick_interval_ms() -> u64 {
    1000
}

const fn default_ingress_capacity() -> usize {
    1024
}

const fn default_io_timeout_ms() -> u64 {
    5000
}

fn default_snapshot_dir() -> PathBuf {
    PathBuf::from("data/snapshots")
}

fn default_journal_path() -> PathBuf {
    PathBuf::from("data/events.jsonl")
}

fn default_observation_path() -> PathBuf {
    PathBuf::from("data/observations.jsonl")
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            max_ticks: None,
            ingress_capacity: default_ingress_capacity(),
            io_timeout_ms: default_io_timeout_ms(),
            snapshot_dir: default_snapshot_dir(),
            journal_path: default_journal_path(),
            observation_path: default_observation_path(),
            input_path: None,
        }
    }
}

/// The `logging` section.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_owned()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
