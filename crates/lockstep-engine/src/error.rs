//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during boot, the tick schedule, and persistence.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading or validation failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: lockstep_core::config::ConfigError,
    },

    /// The kernel failed or halted.
    #[error("kernel error: {source}")]
    Kernel {
        /// The underlying kernel error.
        #[from]
        source: lockstep_core::error::KernelError,
    },

    /// Snapshot or journal storage failed.
    #[error("storage error: {source}")]
    Store {
        /// The underlying storage error.
        #[from]
        source: lockstep_db::StoreError,
    },

    /// A storage operation did not finish within the I/O timeout.
    #[error("{what} timed out after {timeout_ms}ms")]
    IoTimeout {
        /// The operation that stalled.
        what: &'static str,
        /// Configured timeout.
        timeout_ms: u64,
    },

    /// The input file could not be read or parsed.
    #[error("input error at line {line}: {message}")]
    Input {
        /// One-based line number, or 0 if the file could not be read.
        line: usize,
        /// Description of the failure.
        message: String,
    },

    /// The persistence task stopped unexpectedly.
    #[error("persistence error: {message}")]
    Persistence {
        /// Description of the failure.
        message: String,
    },
}
