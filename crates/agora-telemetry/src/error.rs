//! Error types for the telemetry layer.
//!
//! Nothing in this crate returns a [`TelemetryError`] to the simulation.
//! The writer task logs failures and moves on; errors only surface from
//! setup calls and from [`LoggerHandle::shutdown`](crate::LoggerHandle::shutdown).

/// Errors that can occur in the telemetry layer.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// Writing a JSON-lines file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The background writer task panicked or was cancelled.
    #[error("writer task failed: {0}")]
    Writer(#[from] tokio::task::JoinError),
}
