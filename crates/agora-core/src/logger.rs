//! The write-only logging collaborator.
//!
//! The environment reports every state change it makes through
//! [`SimulationLogger`]. Calls are notifications: they return nothing, and
//! an implementation must never block the round or fail into it. Batching,
//! persistence, and error handling belong to the implementation.
//!
//! The logger is injected into [`EconomyEnv`](crate::env::EconomyEnv) at
//! construction; there is no process-wide instance.

use std::sync::{Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, info};

use agora_types::{AgentId, AgentState, GovernanceEventKind, TradeKind};

/// Receives notifications of every state change the engine makes.
pub trait SimulationLogger: Send + Sync {
    /// An agent's record at the end of a round.
    fn log_agent_state(&self, agent_id: AgentId, state: &AgentState);

    /// A successful trade at its execution price.
    fn log_transaction(&self, agent_id: AgentId, kind: TradeKind, price: f64, quantity: u32);

    /// A governance lifecycle event.
    fn log_governance_event(
        &self,
        kind: GovernanceEventKind,
        agent_id: Option<AgentId>,
        details: serde_json::Value,
    );

    /// The start of an episode.
    fn log_simulation_run(&self, agent_count: u32, details: serde_json::Value);
}

// ---------------------------------------------------------------------------
// LogRecord
// ---------------------------------------------------------------------------

/// One logger notification as a value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "table", rename_all = "snake_case")]
pub enum LogRecord {
    /// See [`SimulationLogger::log_agent_state`].
    AgentState {
        /// Agent the record belongs to.
        agent_id: AgentId,
        /// The record.
        state: AgentState,
    },
    /// See [`SimulationLogger::log_transaction`].
    Transaction {
        /// Trading agent.
        agent_id: AgentId,
        /// Side of the trade.
        kind: TradeKind,
        /// Execution price.
        price: f64,
        /// Units traded.
        quantity: u32,
    },
    /// See [`SimulationLogger::log_governance_event`].
    GovernanceEvent {
        /// Event type.
        kind: GovernanceEventKind,
        /// Agent the event concerns, if any.
        agent_id: Option<AgentId>,
        /// Event-specific details.
        details: serde_json::Value,
    },
    /// See [`SimulationLogger::log_simulation_run`].
    SimulationRun {
        /// Roster size.
        agent_count: u32,
        /// Episode parameters.
        details: serde_json::Value,
    },
}

// ---------------------------------------------------------------------------
// Implementations
// ---------------------------------------------------------------------------

/// Discards every notification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLogger;

impl SimulationLogger for NullLogger {
    fn log_agent_state(&self, _agent_id: AgentId, _state: &AgentState) {}

    fn log_transaction(&self, _agent_id: AgentId, _kind: TradeKind, _price: f64, _quantity: u32) {}

    fn log_governance_event(
        &self,
        _kind: GovernanceEventKind,
        _agent_id: Option<AgentId>,
        _details: serde_json::Value,
    ) {
    }

    fn log_simulation_run(&self, _agent_count: u32, _details: serde_json::Value) {}
}

/// Emits every notification as a `tracing` event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl SimulationLogger for TracingLogger {
    fn log_agent_state(&self, agent_id: AgentId, state: &AgentState) {
        debug!(
            agent = %agent_id,
            cash = state.cash,
            assets = state.assets,
            reputation = state.reputation,
            tokens = state.tokens,
            "agent state"
        );
    }

    fn log_transaction(&self, agent_id: AgentId, kind: TradeKind, price: f64, quantity: u32) {
        debug!(agent = %agent_id, action = kind.as_str(), price, quantity, "transaction");
    }

    fn log_governance_event(
        &self,
        kind: GovernanceEventKind,
        agent_id: Option<AgentId>,
        details: serde_json::Value,
    ) {
        info!(
            event = kind.as_str(),
            agent = ?agent_id.map(|id| id.to_string()),
            %details,
            "governance event"
        );
    }

    fn log_simulation_run(&self, agent_count: u32, details: serde_json::Value) {
        info!(agent_count, %details, "simulation run");
    }
}

/// Keeps every notification in memory, in call order.
#[derive(Debug, Default)]
pub struct RecordingLogger {
    records: Mutex<Vec<LogRecord>>,
}

impl RecordingLogger {
    /// Create an empty recorder.
    pub const fn new() -> Self {
        Self {
            records: Mutex::new(Vec::new()),
        }
    }

    /// Copy of every record so far.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return every record so far.
    pub fn take(&self) -> Vec<LogRecord> {
        std::mem::take(&mut *self.records.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn push(&self, record: LogRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }
}

impl SimulationLogger for RecordingLogger {
    fn log_agent_state(&self, agent_id: AgentId, state: &AgentState) {
        self.push(LogRecord::AgentState {
            agent_id,
            state: *state,
        });
    }

    fn log_transaction(&self, agent_id: AgentId, kind: TradeKind, price: f64, quantity: u32) {
        self.push(LogRecord::Transaction {
            agent_id,
            kind,
            price,
            quantity,
        });
    }

    fn log_governance_event(
        &self,
        kind: GovernanceEventKind,
        agent_id: Option<AgentId>,
        details: serde_json::Value,
    ) {
        self.push(LogRecord::GovernanceEvent {
            kind,
            agent_id,
            details,
        });
    }

    fn log_simulation_run(&self, agent_count: u32, details: serde_json::Value) {
        self.push(LogRecord::SimulationRun {
            agent_count,
            details,
        });
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn recording_logger_keeps_call_order() {
        let logger = RecordingLogger::new();
        logger.log_simulation_run(4, json!({"seed": 1}));
        logger.log_transaction(AgentId::new(2), TradeKind::Buy, 100.0, 1);
        logger.log_governance_event(GovernanceEventKind::VoteCast, Some(AgentId::new(1)), json!({}));

        let records = logger.records();
        assert_eq!(records.len(), 3);
        assert!(matches!(records.first(), Some(LogRecord::SimulationRun { agent_count: 4, .. })));
        assert!(matches!(
            records.get(1),
            Some(LogRecord::Transaction { kind: TradeKind::Buy, quantity: 1, .. })
        ));
    }

    #[test]
    fn take_drains_records() {
        let logger = RecordingLogger::new();
        logger.log_simulation_run(1, json!(null));
        assert_eq!(logger.take().len(), 1);
        assert!(logger.records().is_empty());
    }

    #[test]
    fn log_record_serializes_with_table_tag() {
        let record = LogRecord::Transaction {
            agent_id: AgentId::new(3),
            kind: TradeKind::Sell,
            price: 99.5,
            quantity: 1,
        };
        let value = serde_json::to_value(&record).unwrap_or_default();
        assert_eq!(value.get("table").and_then(|v| v.as_str()), Some("transaction"));
        assert_eq!(value.get("agent_id").and_then(serde_json::Value::as_u64), Some(3));
    }

    #[test]
    fn null_and_tracing_loggers_accept_everything() {
        let loggers: [&dyn SimulationLogger; 2] = [&NullLogger, &TracingLogger];
        for logger in loggers {
            logger.log_agent_state(
                AgentId::new(0),
                &AgentState {
                    cash: 1.0,
                    assets: 0,
                    reputation: 1.0,
                    tokens: 0,
                    voting_power: 1.0,
                    last_action: None,
                    total_trades: 0,
                },
            );
            logger.log_simulation_run(1, serde_json::Value::Null);
        }
    }
}
