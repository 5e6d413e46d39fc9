//! Telemetry for the Agora simulation.
//!
//! The engine reports state changes through the write-only
//! [`SimulationLogger`](agora_core::logger::SimulationLogger) trait. This
//! crate implements it with [`BatchedLogger`], which hands rows to a
//! background task and never blocks a round.
//!
//! # Modules
//!
//! - [`batched`] -- [`BatchedLogger`] and the writer task behind it
//! - [`rows`] -- Row types for `agent_states`, `transactions`,
//!   `governance_log`, and `simulation_runs`
//! - [`sink`] -- `PostgreSQL`, JSON-lines, and discard destinations
//! - [`error`] -- Shared error types

pub mod batched;
pub mod error;
pub mod rows;
pub mod sink;

// Re-export primary types for convenience.
pub use batched::{BatchedLogger, LoggerHandle, WriterStats};
pub use error::TelemetryError;
pub use rows::{
    AgentStateRow, GovernanceRow, SimulationRunRow, Table, TelemetryRecord, TransactionRow,
};
pub use sink::{JsonLinesStore, LogSink, PgLogStore};
