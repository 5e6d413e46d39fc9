//! Error types for the engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during engine startup and episode execution.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: agora_core::config::ConfigError,
    },

    /// The environment could not be built.
    #[error("environment error: {source}")]
    Env {
        /// The underlying environment error.
        #[from]
        source: agora_core::env::EnvError,
    },

    /// An episode failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: agora_core::runner::RunnerError,
    },

    /// The telemetry writer failed to shut down.
    #[error("telemetry error: {source}")]
    Telemetry {
        /// The underlying telemetry error.
        #[from]
        source: agora_telemetry::TelemetryError,
    },

    /// The blocking episode task panicked or was cancelled.
    #[error("episode task failed: {source}")]
    Join {
        /// The underlying join error.
        #[from]
        source: tokio::task::JoinError,
    },
}
