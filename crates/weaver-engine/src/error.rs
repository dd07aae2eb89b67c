//! Error types for the engine binary.
//!
//! [`EngineError`] wraps every failure that can stop the engine during
//! startup, the run itself or the final flush.

use weaver_core::config::ConfigError;
use weaver_core::runner::RunnerError;
use weaver_core::snapshot::SnapshotError;
use weaver_core::tick::TickError;

/// Top-level error for the engine binary.
///
/// Each variant wraps a subsystem error so `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: ConfigError,
    },

    /// Species assembly or population seeding failed.
    #[error("setup error: {source}")]
    Setup {
        /// The underlying tick error.
        #[from]
        source: TickError,
    },

    /// Simulation runner failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: RunnerError,
    },

    /// A snapshot could not be written or restored.
    #[error("snapshot error: {source}")]
    Snapshot {
        /// The underlying snapshot error.
        #[from]
        source: SnapshotError,
    },

    /// An output file could not be written.
    #[error("output error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The simulation worker panicked or was cancelled.
    #[error("simulation worker failed: {source}")]
    Worker {
        /// The underlying join error.
        #[from]
        source: tokio::task::JoinError,
    },
}
