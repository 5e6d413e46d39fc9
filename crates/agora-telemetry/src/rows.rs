//! Row types for the four telemetry tables.
//!
//! | table             | written                         |
//! |-------------------|---------------------------------|
//! | `agent_states`    | batched, every agent every round |
//! | `transactions`    | batched, every successful trade |
//! | `governance_log`  | batched, every governance event |
//! | `simulation_runs` | immediately, once per episode   |
//!
//! Every row carries the [`RunId`] of the engine process that wrote it and
//! the wall-clock time it was recorded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use agora_types::{AgentId, AgentState, GovernanceEventKind, RunId, TradeKind};

/// A telemetry table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    /// Per-round agent records.
    AgentStates,
    /// Trades.
    Transactions,
    /// Governance events.
    GovernanceLog,
    /// Episode starts.
    SimulationRuns,
}

impl Table {
    /// The SQL table name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AgentStates => "agent_states",
            Self::Transactions => "transactions",
            Self::GovernanceLog => "governance_log",
            Self::SimulationRuns => "simulation_runs",
        }
    }
}

impl core::fmt::Display for Table {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of `agent_states`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStateRow {
    /// Engine process.
    pub run_id: RunId,
    /// Agent label, e.g. `agent_3`.
    pub agent_id: String,
    /// Cash held.
    pub cash_balance: f64,
    /// Asset units held.
    pub assets_held: i64,
    /// Reputation.
    pub reputation: f64,
    /// Governance tokens.
    pub tokens: i64,
    /// Trades made so far.
    pub total_trades: i64,
    /// Wall-clock time of the record.
    pub recorded_at: DateTime<Utc>,
}

impl AgentStateRow {
    /// Build a row from an agent record.
    pub fn new(run_id: RunId, agent_id: AgentId, state: &AgentState) -> Self {
        Self {
            run_id,
            agent_id: agent_id.to_string(),
            cash_balance: state.cash,
            assets_held: i64::from(state.assets),
            reputation: state.reputation,
            tokens: i64::from(state.tokens),
            total_trades: i64::from(state.total_trades),
            recorded_at: Utc::now(),
        }
    }
}

/// One row of `transactions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRow {
    /// Engine process.
    pub run_id: RunId,
    /// Agent label.
    pub agent_id: String,
    /// `buy` or `sell`.
    pub action_type: String,
    /// Execution price.
    pub price: f64,
    /// Units traded.
    pub quantity: i32,
    /// Wall-clock time of the record.
    pub recorded_at: DateTime<Utc>,
}

impl TransactionRow {
    /// Build a row from a trade notification.
    pub fn new(
        run_id: RunId,
        agent_id: AgentId,
        kind: TradeKind,
        price: f64,
        quantity: u32,
    ) -> Self {
        Self {
            run_id,
            agent_id: agent_id.to_string(),
            action_type: kind.as_str().to_owned(),
            price,
            quantity: i32::try_from(quantity).unwrap_or(i32::MAX),
            recorded_at: Utc::now(),
        }
    }
}

/// One row of `governance_log`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GovernanceRow {
    /// Engine process.
    pub run_id: RunId,
    /// Event name, e.g. `vote_cast`.
    pub event_type: String,
    /// Agent label, if the event concerns one agent.
    pub agent_id: Option<String>,
    /// Event-specific details.
    pub details: serde_json::Value,
    /// Wall-clock time of the record.
    pub recorded_at: DateTime<Utc>,
}

impl GovernanceRow {
    /// Build a row from a governance notification.
    pub fn new(
        run_id: RunId,
        kind: GovernanceEventKind,
        agent_id: Option<AgentId>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            run_id,
            event_type: kind.as_str().to_owned(),
            agent_id: agent_id.map(|id| id.to_string()),
            details,
            recorded_at: Utc::now(),
        }
    }
}

/// One row of `simulation_runs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRunRow {
    /// Engine process.
    pub run_id: RunId,
    /// Roster size.
    pub agent_count: i32,
    /// Episode parameters.
    pub details: serde_json::Value,
    /// Wall-clock time of the record.
    pub recorded_at: DateTime<Utc>,
}

impl SimulationRunRow {
    /// Build a row from an episode start notification.
    pub fn new(run_id: RunId, agent_count: u32, details: serde_json::Value) -> Self {
        Self {
            run_id,
            agent_count: i32::try_from(agent_count).unwrap_or(i32::MAX),
            details,
            recorded_at: Utc::now(),
        }
    }
}

/// Any telemetry row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "table", rename_all = "snake_case")]
pub enum TelemetryRecord {
    /// See [`AgentStateRow`].
    AgentStates(AgentStateRow),
    /// See [`TransactionRow`].
    Transactions(TransactionRow),
    /// See [`GovernanceRow`].
    GovernanceLog(GovernanceRow),
    /// See [`SimulationRunRow`].
    SimulationRuns(SimulationRunRow),
}

impl TelemetryRecord {
    /// The table this row belongs to.
    pub const fn table(&self) -> Table {
        match self {
            Self::AgentStates(_) => Table::AgentStates,
            Self::Transactions(_) => Table::Transactions,
            Self::GovernanceLog(_) => Table::GovernanceLog,
            Self::SimulationRuns(_) => Table::SimulationRuns,
        }
    }
}
