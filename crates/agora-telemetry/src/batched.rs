//! Asynchronous, batched implementation of the simulation logger.
//!
//! [`BatchedLogger`] turns each notification into a row and pushes it onto
//! an unbounded channel, so the simulation never waits on I/O. A background
//! writer task owns the [`LogSink`] and keeps one batch per table:
//!
//! ```text
//! EconomyEnv --log_*--> BatchedLogger --mpsc--> writer task
//!                                                  |-- agent_states   (batch_size)
//!                                                  |-- transactions   (batch_size)
//!                                                  |-- governance_log (batch_size)
//!                                                  +-- simulation_runs (immediate)
//! ```
//!
//! A batch that fails to write is logged and dropped. Remaining batches are
//! drained when [`LoggerHandle::shutdown`] is called or every sender is
//! gone.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use agora_core::logger::SimulationLogger;
use agora_types::{AgentId, AgentState, GovernanceEventKind, RunId, TradeKind};

use crate::error::TelemetryError;
use crate::rows::{
    AgentStateRow, GovernanceRow, SimulationRunRow, Table, TelemetryRecord, TransactionRow,
};
use crate::sink::LogSink;

/// Messages from the logger to the writer task.
#[derive(Debug)]
enum Command {
    Record(TelemetryRecord),
    Shutdown,
}

/// Counters reported by the writer task when it stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WriterStats {
    /// Rows written successfully.
    pub rows_written: u64,
    /// Rows dropped because their batch failed to write.
    pub rows_dropped: u64,
    /// Batches that failed to write.
    pub failed_batches: u64,
}

/// Non-blocking [`SimulationLogger`] backed by a background writer task.
#[derive(Debug, Clone)]
pub struct BatchedLogger {
    run_id: RunId,
    sender: mpsc::UnboundedSender<Command>,
}

/// Controls the writer task behind a [`BatchedLogger`].
#[derive(Debug)]
pub struct LoggerHandle {
    sender: mpsc::UnboundedSender<Command>,
    task: JoinHandle<WriterStats>,
}

impl BatchedLogger {
    /// Spawn the writer task on the current Tokio runtime.
    ///
    /// `batch_size` is clamped to at least 1.
    pub fn spawn(sink: LogSink, batch_size: usize, run_id: RunId) -> (Self, LoggerHandle) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let writer = Writer::new(sink, batch_size.max(1));
        let task = tokio::spawn(writer.run(receiver));
        info!(%run_id, batch_size, "Telemetry writer started");
        (
            Self {
                run_id,
                sender: sender.clone(),
            },
            LoggerHandle { sender, task },
        )
    }

    /// The run id stamped on every row.
    pub const fn run_id(&self) -> RunId {
        self.run_id
    }

    fn send(&self, record: TelemetryRecord) {
        if self.sender.send(Command::Record(record)).is_err() {
            debug!("Telemetry writer stopped; record dropped");
        }
    }
}

impl SimulationLogger for BatchedLogger {
    fn log_agent_state(&self, agent_id: AgentId, state: &AgentState) {
        self.send(TelemetryRecord::AgentStates(AgentStateRow::new(
            self.run_id,
            agent_id,
            state,
        )));
    }

    fn log_transaction(&self, agent_id: AgentId, kind: TradeKind, price: f64, quantity: u32) {
        self.send(TelemetryRecord::Transactions(TransactionRow::new(
            self.run_id,
            agent_id,
            kind,
            price,
            quantity,
        )));
    }

    fn log_governance_event(
        &self,
        kind: GovernanceEventKind,
        agent_id: Option<AgentId>,
        details: serde_json::Value,
    ) {
        self.send(TelemetryRecord::GovernanceLog(GovernanceRow::new(
            self.run_id,
            kind,
            agent_id,
            details,
        )));
    }

    fn log_simulation_run(&self, agent_count: u32, details: serde_json::Value) {
        self.send(TelemetryRecord::SimulationRuns(SimulationRunRow::new(
            self.run_id,
            agent_count,
            details,
        )));
    }
}

impl LoggerHandle {
    /// Flush every pending batch and stop the writer.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Writer`] if the writer task panicked.
    pub async fn shutdown(self) -> Result<WriterStats, TelemetryError> {
        // A send error means the task already stopped; join it either way.
        let _ = self.sender.send(Command::Shutdown);
        let stats = self.task.await?;
        info!(
            rows_written = stats.rows_written,
            rows_dropped = stats.rows_dropped,
            failed_batches = stats.failed_batches,
            "Telemetry writer stopped"
        );
        Ok(stats)
    }
}

// ---------------------------------------------------------------------------
// Writer task
// ---------------------------------------------------------------------------

struct Writer {
    sink: LogSink,
    batch_size: usize,
    agent_states: Vec<AgentStateRow>,
    transactions: Vec<TransactionRow>,
    governance: Vec<GovernanceRow>,
    stats: WriterStats,
}

impl Writer {
    fn new(sink: LogSink, batch_size: usize) -> Self {
        Self {
            sink,
            batch_size,
            agent_states: Vec::with_capacity(batch_size),
            transactions: Vec::with_capacity(batch_size),
            governance: Vec::with_capacity(batch_size),
            stats: WriterStats::default(),
        }
    }

    async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<Command>) -> WriterStats {
        while let Some(command) = receiver.recv().await {
            match command {
                Command::Record(record) => self.accept(record).await,
                Command::Shutdown => break,
            }
        }
        // Drain anything sent before the shutdown request was seen.
        receiver.close();
        while let Ok(Command::Record(record)) = receiver.try_recv() {
            self.accept(record).await;
        }
        for table in [Table::AgentStates, Table::Transactions, Table::GovernanceLog] {
            self.flush(table).await;
        }
        self.sink.close().await;
        self.stats
    }

    async fn accept(&mut self, record: TelemetryRecord) {
        let table = record.table();
        let pending = match record {
            TelemetryRecord::AgentStates(row) => {
                self.agent_states.push(row);
                self.agent_states.len()
            }
            TelemetryRecord::Transactions(row) => {
                self.transactions.push(row);
                self.transactions.len()
            }
            TelemetryRecord::GovernanceLog(row) => {
                self.governance.push(row);
                self.governance.len()
            }
            TelemetryRecord::SimulationRuns(row) => {
                let result = self.sink.write_simulation_run(&row).await;
                self.record_outcome(table, 1, result);
                return;
            }
        };
        if pending >= self.batch_size {
            self.flush(table).await;
        }
    }

    async fn flush(&mut self, table: Table) {
        let (count, result) = match table {
            Table::AgentStates => {
                let batch = std::mem::take(&mut self.agent_states);
                (batch.len(), self.sink.write_agent_states(&batch).await)
            }
            Table::Transactions => {
                let batch = std::mem::take(&mut self.transactions);
                (batch.len(), self.sink.write_transactions(&batch).await)
            }
            Table::GovernanceLog => {
                let batch = std::mem::take(&mut self.governance);
                (batch.len(), self.sink.write_governance(&batch).await)
            }
            Table::SimulationRuns => return,
        };
        if count > 0 {
            self.record_outcome(table, count, result);
        }
    }

    fn record_outcome(&mut self, table: Table, count: usize, result: Result<(), TelemetryError>) {
        let count = u64::try_from(count).unwrap_or(u64::MAX);
        match result {
            Ok(()) => {
                self.stats.rows_written = self.stats.rows_written.saturating_add(count);
            }
            Err(error) => {
                warn!(
                    table = table.as_str(),
                    sink = self.sink.name(),
                    rows = count,
                    %error,
                    "Telemetry batch write failed; batch dropped"
                );
                self.stats.rows_dropped = self.stats.rows_dropped.saturating_add(count);
                self.stats.failed_batches = self.stats.failed_batches.saturating_add(1);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn state() -> AgentState {
        AgentState {
            cash: 1000.0,
            assets: 0,
            reputation: 1.0,
            tokens: 100,
            voting_power: 1.0,
            last_action: None,
            total_trades: 0,
        }
    }

    #[tokio::test]
    async fn discard_sink_counts_every_row() {
        let (logger, handle) = BatchedLogger::spawn(LogSink::Discard, 2, RunId::new());
        logger.log_simulation_run(3, json!({}));
        for n in 0..3 {
            logger.log_agent_state(AgentId::new(n), &state());
        }
        logger.log_transaction(AgentId::new(0), TradeKind::Buy, 100.0, 1);
        logger.log_governance_event(GovernanceEventKind::ProposalStarted, None, json!({}));

        let stats = handle.shutdown().await.unwrap();
        assert_eq!(stats.rows_written, 6);
        assert_eq!(stats.failed_batches, 0);
    }

    #[tokio::test]
    async fn logging_after_shutdown_is_harmless() {
        let (logger, handle) = BatchedLogger::spawn(LogSink::Discard, 5, RunId::new());
        handle.shutdown().await.unwrap();
        logger.log_agent_state(AgentId::new(0), &state());
    }

    #[tokio::test]
    async fn zero_batch_size_is_clamped() {
        let (logger, handle) = BatchedLogger::spawn(LogSink::Discard, 0, RunId::new());
        logger.log_agent_state(AgentId::new(0), &state());
        let stats = handle.shutdown().await.unwrap();
        assert_eq!(stats.rows_written, 1);
    }
}
