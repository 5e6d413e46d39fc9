//! Telemetry destinations.
//!
//! A [`LogSink`] accepts whole batches of rows for one table. The writer
//! task owns the sink exclusively, so none of these types need interior
//! locking.
//!
//! - [`PgLogStore`] -- bulk inserts into `PostgreSQL` using `UNNEST` arrays.
//! - [`JsonLinesStore`] -- appends one JSON object per row to a file.
//! - [`LogSink::Discard`] -- drops everything.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Serialize;
use sqlx::PgPool;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use agora_core::config::{LogSinkKind, LoggingConfig};

use crate::error::TelemetryError;
use crate::rows::{AgentStateRow, GovernanceRow, SimulationRunRow, Table, TransactionRow};

/// Maximum number of connections in the telemetry pool.
const MAX_CONNECTIONS: u32 = 4;

/// Connection timeout in seconds.
const CONNECT_TIMEOUT_SECS: u64 = 5;

/// Schema created on connect. Each statement is idempotent.
const SCHEMA: [&str; 4] = [
    r"CREATE TABLE IF NOT EXISTS simulation_runs (
        id BIGSERIAL PRIMARY KEY,
        run_id UUID NOT NULL,
        agent_count INTEGER NOT NULL,
        details JSONB NOT NULL,
        recorded_at TIMESTAMPTZ NOT NULL
    )",
    r"CREATE TABLE IF NOT EXISTS agent_states (
        id BIGSERIAL PRIMARY KEY,
        run_id UUID NOT NULL,
        agent_id TEXT NOT NULL,
        cash_balance DOUBLE PRECISION NOT NULL,
        assets_held BIGINT NOT NULL,
        reputation DOUBLE PRECISION NOT NULL,
        tokens BIGINT NOT NULL,
        total_trades BIGINT NOT NULL,
        recorded_at TIMESTAMPTZ NOT NULL
    )",
    r"CREATE TABLE IF NOT EXISTS transactions (
        id BIGSERIAL PRIMARY KEY,
        run_id UUID NOT NULL,
        agent_id TEXT NOT NULL,
        action_type TEXT NOT NULL,
        price DOUBLE PRECISION NOT NULL,
        quantity INTEGER NOT NULL,
        recorded_at TIMESTAMPTZ NOT NULL
    )",
    r"CREATE TABLE IF NOT EXISTS governance_log (
        id BIGSERIAL PRIMARY KEY,
        run_id UUID NOT NULL,
        event_type TEXT NOT NULL,
        agent_id TEXT,
        details JSONB NOT NULL,
        recorded_at TIMESTAMPTZ NOT NULL
    )",
];

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

/// Writes telemetry rows to `PostgreSQL`.
#[derive(Clone)]
pub struct PgLogStore {
    pool: PgPool,
}

impl PgLogStore {
    /// Connect and create the schema if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Config`] if the URL cannot be parsed, or
    /// [`TelemetryError::Postgres`] if the connection or schema setup fails.
    pub async fn connect(url: &str) -> Result<Self, TelemetryError> {
        let connect_options: PgConnectOptions = url.parse().map_err(|e: sqlx::Error| {
            TelemetryError::Config(format!("Invalid database URL: {e}"))
        })?;

        let pool = PgPoolOptions::new()
            .max_connections(MAX_CONNECTIONS)
            .acquire_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .connect_with(connect_options)
            .await?;

        let store = Self { pool };
        store.ensure_schema().await?;
        tracing::info!(max_connections = MAX_CONNECTIONS, "Connected to PostgreSQL telemetry store");
        Ok(store)
    }

    /// Create the four telemetry tables if they do not exist.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Postgres`] if a statement fails.
    pub async fn ensure_schema(&self) -> Result<(), TelemetryError> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    /// Return a reference to the underlying [`PgPool`].
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Batch-insert agent state rows.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Postgres`] if the insert fails.
    pub async fn insert_agent_states(&self, rows: &[AgentStateRow]) -> Result<(), TelemetryError> {
        if rows.is_empty() {
            return Ok(());
        }

        let len = rows.len();
        let mut run_ids: Vec<Uuid> = Vec::with_capacity(len);
        let mut agent_ids = Vec::with_capacity(len);
        let mut cash = Vec::with_capacity(len);
        let mut assets = Vec::with_capacity(len);
        let mut reputation = Vec::with_capacity(len);
        let mut tokens = Vec::with_capacity(len);
        let mut trades = Vec::with_capacity(len);
        let mut timestamps = Vec::with_capacity(len);

        for row in rows {
            run_ids.push(row.run_id.into_inner());
            agent_ids.push(row.agent_id.clone());
            cash.push(row.cash_balance);
            assets.push(row.assets_held);
            reputation.push(row.reputation);
            tokens.push(row.tokens);
            trades.push(row.total_trades);
            timestamps.push(row.recorded_at);
        }

        sqlx::query(
            r"INSERT INTO agent_states (run_id, agent_id, cash_balance, assets_held, reputation, tokens, total_trades, recorded_at)
              SELECT * FROM UNNEST($1::UUID[], $2::TEXT[], $3::FLOAT8[], $4::BIGINT[], $5::FLOAT8[], $6::BIGINT[], $7::BIGINT[], $8::TIMESTAMPTZ[])",
        )
        .bind(&run_ids)
        .bind(&agent_ids)
        .bind(&cash)
        .bind(&assets)
        .bind(&reputation)
        .bind(&tokens)
        .bind(&trades)
        .bind(&timestamps)
        .execute(&self.pool)
        .await?;

        tracing::debug!(count = len, "Inserted agent states (batch UNNEST)");
        Ok(())
    }

    /// Batch-insert transaction rows.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Postgres`] if the insert fails.
    pub async fn insert_transactions(&self, rows: &[TransactionRow]) -> Result<(), TelemetryError> {
        if rows.is_empty() {
            return Ok(());
        }

        let len = rows.len();
        let mut run_ids: Vec<Uuid> = Vec::with_capacity(len);
        let mut agent_ids = Vec::with_capacity(len);
        let mut action_types = Vec::with_capacity(len);
        let mut prices = Vec::with_capacity(len);
        let mut quantities = Vec::with_capacity(len);
        let mut timestamps = Vec::with_capacity(len);

        for row in rows {
            run_ids.push(row.run_id.into_inner());
            agent_ids.push(row.agent_id.clone());
            action_types.push(row.action_type.clone());
            prices.push(row.price);
            quantities.push(row.quantity);
            timestamps.push(row.recorded_at);
        }

        sqlx::query(
            r"INSERT INTO transactions (run_id, agent_id, action_type, price, quantity, recorded_at)
              SELECT * FROM UNNEST($1::UUID[], $2::TEXT[], $3::TEXT[], $4::FLOAT8[], $5::INTEGER[], $6::TIMESTAMPTZ[])",
        )
        .bind(&run_ids)
        .bind(&agent_ids)
        .bind(&action_types)
        .bind(&prices)
        .bind(&quantities)
        .bind(&timestamps)
        .execute(&self.pool)
        .await?;

        tracing::debug!(count = len, "Inserted transactions (batch UNNEST)");
        Ok(())
    }

    /// Batch-insert governance log rows.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Postgres`] if the insert fails.
    pub async fn insert_governance(&self, rows: &[GovernanceRow]) -> Result<(), TelemetryError> {
        if rows.is_empty() {
            return Ok(());
        }

        let len = rows.len();
        let mut run_ids: Vec<Uuid> = Vec::with_capacity(len);
        let mut event_types = Vec::with_capacity(len);
        let mut agent_ids: Vec<Option<String>> = Vec::with_capacity(len);
        let mut details = Vec::with_capacity(len);
        let mut timestamps = Vec::with_capacity(len);

        for row in rows {
            run_ids.push(row.run_id.into_inner());
            event_types.push(row.event_type.clone());
            agent_ids.push(row.agent_id.clone());
            details.push(row.details.clone());
            timestamps.push(row.recorded_at);
        }

        sqlx::query(
            r"INSERT INTO governance_log (run_id, event_type, agent_id, details, recorded_at)
              SELECT * FROM UNNEST($1::UUID[], $2::TEXT[], $3::TEXT[], $4::JSONB[], $5::TIMESTAMPTZ[])",
        )
        .bind(&run_ids)
        .bind(&event_types)
        .bind(&agent_ids)
        .bind(&details)
        .bind(&timestamps)
        .execute(&self.pool)
        .await?;

        tracing::debug!(count = len, "Inserted governance events (batch UNNEST)");
        Ok(())
    }

    /// Insert one simulation run row.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Postgres`] if the insert fails.
    pub async fn insert_simulation_run(&self, row: &SimulationRunRow) -> Result<(), TelemetryError> {
        sqlx::query(
            r"INSERT INTO simulation_runs (run_id, agent_count, details, recorded_at)
              VALUES ($1, $2, $3, $4)",
        )
        .bind(row.run_id.into_inner())
        .bind(row.agent_count)
        .bind(&row.details)
        .bind(row.recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Count rows in a telemetry table.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Postgres`] if the query fails.
    pub async fn count_rows(&self, table: Table, run_id: Uuid) -> Result<i64, TelemetryError> {
        let query = format!("SELECT COUNT(*) FROM {} WHERE run_id = $1", table.as_str());
        let count: i64 = sqlx::query_scalar(&query)
            .bind(run_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Close all connections in the pool gracefully.
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::info!("PostgreSQL telemetry pool closed");
    }
}

// ---------------------------------------------------------------------------
// JSON lines
// ---------------------------------------------------------------------------

/// Appends telemetry rows to a file, one JSON object per line.
///
/// Each object carries a `table` field naming its table. The file is opened
/// in append mode for every batch, so a missing directory fails that batch
/// only.
#[derive(Debug, Clone)]
pub struct JsonLinesStore {
    path: PathBuf,
}

#[derive(Serialize)]
struct JsonLine<'a, T> {
    table: Table,
    #[serde(flatten)]
    row: &'a T,
}

impl JsonLinesStore {
    /// Create a store writing to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The output file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append rows for one table.
    ///
    /// # Errors
    ///
    /// Returns [`TelemetryError::Serialization`] if a row cannot be encoded,
    /// or [`TelemetryError::Io`] if the file cannot be written.
    pub async fn append<T: Serialize>(&self, table: Table, rows: &[T]) -> Result<(), TelemetryError> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut buffer = Vec::new();
        for row in rows {
            serde_json::to_writer(&mut buffer, &JsonLine { table, row })?;
            buffer.push(b'\n');
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(&buffer).await?;
        file.flush().await?;

        tracing::debug!(table = table.as_str(), count = rows.len(), "Appended JSON lines");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LogSink
// ---------------------------------------------------------------------------

/// The destination the writer task flushes to.
pub enum LogSink {
    /// `PostgreSQL` tables.
    Postgres(PgLogStore),
    /// A local JSON-lines file.
    JsonLines(JsonLinesStore),
    /// Drop every row.
    Discard,
}

impl LogSink {
    /// Build the sink named by the logging config.
    ///
    /// An unreachable database degrades to [`LogSink::Discard`] with a
    /// warning, so the simulation still runs without persistence.
    pub async fn from_config(config: &LoggingConfig) -> Self {
        match config.sink {
            LogSinkKind::Discard => Self::Discard,
            LogSinkKind::JsonLines => {
                Self::JsonLines(JsonLinesStore::new(config.json_lines_path.clone()))
            }
            LogSinkKind::Postgres => match PgLogStore::connect(&config.database_url).await {
                Ok(store) => Self::Postgres(store),
                Err(error) => {
                    tracing::warn!(
                        %error,
                        "PostgreSQL telemetry unavailable; running without database logging"
                    );
                    Self::Discard
                }
            },
        }
    }

    /// Short name for log fields.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Postgres(_) => "postgres",
            Self::JsonLines(_) => "json_lines",
            Self::Discard => "discard",
        }
    }

    /// Write agent state rows.
    ///
    /// # Errors
    ///
    /// Returns the underlying store's error.
    pub async fn write_agent_states(&self, rows: &[AgentStateRow]) -> Result<(), TelemetryError> {
        match self {
            Self::Postgres(store) => store.insert_agent_states(rows).await,
            Self::JsonLines(store) => store.append(Table::AgentStates, rows).await,
            Self::Discard => Ok(()),
        }
    }

    /// Write transaction rows.
    ///
    /// # Errors
    ///
    /// Returns the underlying store's error.
    pub async fn write_transactions(&self, rows: &[TransactionRow]) -> Result<(), TelemetryError> {
        match self {
            Self::Postgres(store) => store.insert_transactions(rows).await,
            Self::JsonLines(store) => store.append(Table::Transactions, rows).await,
            Self::Discard => Ok(()),
        }
    }

    /// Write governance rows.
    ///
    /// # Errors
    ///
    /// Returns the underlying store's error.
    pub async fn write_governance(&self, rows: &[GovernanceRow]) -> Result<(), TelemetryError> {
        match self {
            Self::Postgres(store) => store.insert_governance(rows).await,
            Self::JsonLines(store) => store.append(Table::GovernanceLog, rows).await,
            Self::Discard => Ok(()),
        }
    }

    /// Write one simulation run row.
    ///
    /// # Errors
    ///
    /// Returns the underlying store's error.
    pub async fn write_simulation_run(&self, row: &SimulationRunRow) -> Result<(), TelemetryError> {
        match self {
            Self::Postgres(store) => store.insert_simulation_run(row).await,
            Self::JsonLines(store) => {
                store
                    .append(Table::SimulationRuns, std::slice::from_ref(row))
                    .await
            }
            Self::Discard => Ok(()),
        }
    }

    /// Release any resources held by the sink.
    pub async fn close(&self) {
        if let Self::Postgres(store) = self {
            store.close().await;
        }
    }
}

impl core::fmt::Debug for LogSink {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("LogSink").field(&self.name()).finish()
    }
}
