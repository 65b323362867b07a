//! # Fundflow Warehouse
//!
//! DuckDB-backed storage for ingested entity metrics and the append-only
//! ingestion run log.
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `entity_records` | One parent record per persisted entity fetch |
//! | `entity_metrics` | Metric values attached to a parent record |
//! | `ingest_runs` | One row per pipeline run with retry statistics |
//! | `ingest_log` | One row per entity per run (append-only) |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fundflow_warehouse::{EntityMetricsRecord, MetricRow, Warehouse};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open_default()?;
//!     let receipt = warehouse.store_entity_metrics(&EntityMetricsRecord {
//!         entity_id: String::from("AAPL"),
//!         source: String::from("alphavantage"),
//!         as_of: String::from("2024-01-01T00:00:00Z"),
//!         metrics: vec![MetricRow::numeric("pe_ratio", 28.4)],
//!     })?;
//!     println!("stored {} metrics under {}", receipt.stored, receipt.record_id);
//!     Ok(())
//! }
//! ```
//!
//! All values are bound as statement parameters; nothing user supplied is
//! interpolated into SQL.

pub mod duckdb;
pub mod migrations;

use std::env;
use std::fs;
use std::path::PathBuf;

use ::duckdb::{params, Connection};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

pub use crate::duckdb::{AccessMode, ConnectionPool, PooledConnection};

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The caller handed over a record the schema cannot hold.
    #[error("invalid record: {0}")]
    InvalidRecord(String),
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for fundflow data.
    pub home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Idle connections kept per access mode.
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        let home = resolve_fundflow_home();
        let db_path = home.join("warehouse.duckdb");
        Self {
            home,
            db_path,
            max_pool_size: 4,
        }
    }
}

impl WarehouseConfig {
    /// Default configuration with the database file relocated to `db_path`.
    pub fn with_db_path(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
            ..Self::default()
        }
    }
}

/// One metric value to persist. Exactly one of the two value columns is set.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRow {
    pub metric: String,
    pub numeric_value: Option<f64>,
    /// ISO 8601 calendar date (`YYYY-MM-DD`).
    pub date_value: Option<String>,
}

impl MetricRow {
    pub fn numeric(metric: impl Into<String>, value: f64) -> Self {
        Self {
            metric: metric.into(),
            numeric_value: Some(value),
            date_value: None,
        }
    }

    pub fn date(metric: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            metric: metric.into(),
            numeric_value: None,
            date_value: Some(value.into()),
        }
    }
}

/// All metrics fetched for one entity in one attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityMetricsRecord {
    pub entity_id: String,
    pub source: String,
    /// RFC 3339 UTC timestamp of the fetch.
    pub as_of: String,
    pub metrics: Vec<MetricRow>,
}

/// Outcome of a successful metric write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistReceipt {
    pub record_id: Uuid,
    pub stored: usize,
}

/// Metric read back from the warehouse.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredMetric {
    pub metric: String,
    pub numeric_value: Option<f64>,
    pub date_value: Option<String>,
}

/// Per-entity line of a run, as written to `ingest_log`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunEntityRecord {
    pub entity_id: String,
    /// `succeeded`, `failed` or `not_attempted`.
    pub outcome: String,
    pub error_category: Option<String>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub metrics_fetched: usize,
    pub metrics_stored: usize,
    pub record_id: Option<Uuid>,
}

/// A finished run, as written to `ingest_runs` and `ingest_log`.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub started_at: String,
    pub finished_at: String,
    pub cancelled: bool,
    pub entities: Vec<RunEntityRecord>,
}

/// One run of the retry trend returned by [`Warehouse::retry_history`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryTrendRow {
    pub run_id: String,
    pub started_at: String,
    pub entity_count: i64,
    pub succeeded: i64,
    pub failed: i64,
    pub not_attempted: i64,
    pub total_retry_attempts: i64,
    pub recovered_via_retry: i64,
}

/// Metric store and run log backed by a single `DuckDB` file.
#[derive(Clone)]
pub struct Warehouse {
    config: WarehouseConfig,
    pool: ConnectionPool,
}

impl Warehouse {
    /// Open a warehouse with default configuration.
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open (creating if needed) the database file and apply migrations.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let pool = ConnectionPool::open(config.db_path.clone(), config.max_pool_size)?;
        let warehouse = Self { config, pool };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Throwaway in-memory warehouse.
    pub fn open_in_memory() -> Result<Self, WarehouseError> {
        let config = WarehouseConfig {
            home: PathBuf::from("."),
            db_path: PathBuf::from(":memory:"),
            max_pool_size: 2,
        };
        let pool = ConnectionPool::in_memory(config.max_pool_size)?;
        let warehouse = Self { config, pool };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.pool.acquire(AccessMode::ReadWrite)?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    /// Persist one entity's metrics under a fresh parent record.
    ///
    /// The parent row and every metric row are written in one transaction.
    pub fn store_entity_metrics(
        &self,
        record: &EntityMetricsRecord,
    ) -> Result<PersistReceipt, WarehouseError> {
        if record.metrics.is_empty() {
            return Err(WarehouseError::InvalidRecord(format!(
                "no metrics to store for '{}'",
                record.entity_id
            )));
        }
        if let Some(row) = record
            .metrics
            .iter()
            .find(|row| row.numeric_value.is_some() == row.date_value.is_some())
        {
            return Err(WarehouseError::InvalidRecord(format!(
                "metric '{}' must carry exactly one value",
                row.metric
            )));
        }

        let record_id = Uuid::new_v4();
        let record_key = record_id.to_string();
        let metric_count = record.metrics.len() as i64;

        let connection = self.pool.acquire(AccessMode::ReadWrite)?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, WarehouseError> {
            connection.execute(
                "INSERT INTO entity_records (record_id, entity_id, source, as_of, metric_count) \
                 VALUES (?, ?, ?, ?, ?)",
                params![
                    record_key,
                    record.entity_id,
                    record.source,
                    record.as_of,
                    metric_count
                ],
            )?;

            let mut stored = 0;
            for row in &record.metrics {
                stored += connection.execute(
                    "INSERT INTO entity_metrics \
                     (record_id, entity_id, metric, numeric_value, date_value) \
                     VALUES (?, ?, ?, ?, TRY_CAST(? AS DATE))",
                    params![
                        record_key,
                        record.entity_id,
                        row.metric,
                        row.numeric_value,
                        row.date_value
                    ],
                )?;
            }
            Ok(stored)
        })();

        let stored = finalize_transaction(&connection, result)?;
        Ok(PersistReceipt { record_id, stored })
    }

    /// Metrics of the most recently stored record for `entity_id`.
    pub fn latest_metrics(&self, entity_id: &str) -> Result<Vec<StoredMetric>, WarehouseError> {
        let connection = self.pool.acquire(AccessMode::ReadOnly)?;
        let mut statement = connection.prepare(
            "SELECT m.metric, m.numeric_value, CAST(m.date_value AS VARCHAR) \
             FROM entity_metrics m \
             WHERE m.record_id = ( \
                 SELECT r.record_id FROM entity_records r \
                 WHERE r.entity_id = ? ORDER BY r.seq DESC LIMIT 1) \
             ORDER BY m.metric",
        )?;
        let rows = statement.query_map(params![entity_id], |row| {
            Ok(StoredMetric {
                metric: row.get(0)?,
                numeric_value: row.get(1)?,
                date_value: row.get(2)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(WarehouseError::from)
    }

    /// Append a finished run to `ingest_runs` and `ingest_log`.
    pub fn append_run(&self, run: &RunRecord) -> Result<(), WarehouseError> {
        let count = |outcome: &str| {
            run.entities
                .iter()
                .filter(|entity| entity.outcome == outcome)
                .count() as i64
        };
        let total_retry_attempts: i64 = run
            .entities
            .iter()
            .map(|entity| i64::from(entity.retry_count))
            .sum();
        let recovered_via_retry = run
            .entities
            .iter()
            .filter(|entity| entity.retry_count > 0 && entity.outcome == "succeeded")
            .count() as i64;
        let run_key = run.run_id.to_string();

        let connection = self.pool.acquire(AccessMode::ReadWrite)?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<(), WarehouseError> {
            connection.execute(
                "INSERT INTO ingest_runs \
                 (run_id, started_at, finished_at, cancelled, entity_count, succeeded, failed, \
                  not_attempted, total_retry_attempts, recovered_via_retry) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    run_key,
                    run.started_at,
                    run.finished_at,
                    run.cancelled,
                    run.entities.len() as i64,
                    count("succeeded"),
                    count("failed"),
                    count("not_attempted"),
                    total_retry_attempts,
                    recovered_via_retry
                ],
            )?;

            for (position, entity) in run.entities.iter().enumerate() {
                connection.execute(
                    "INSERT INTO ingest_log \
                     (run_id, position, entity_id, outcome, error_category, error_message, \
                      retry_count, metrics_fetched, metrics_stored, record_id) \
                     VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                    params![
                        run_key,
                        position as i64,
                        entity.entity_id,
                        entity.outcome,
                        entity.error_category,
                        entity.error_message,
                        i64::from(entity.retry_count),
                        entity.metrics_fetched as i64,
                        entity.metrics_stored as i64,
                        entity.record_id.map(|id| id.to_string())
                    ],
                )?;
            }
            Ok(())
        })();

        finalize_transaction(&connection, result)
    }

    /// Most recently appended runs first, at most `limit` of them.
    pub fn retry_history(&self, limit: usize) -> Result<Vec<RetryTrendRow>, WarehouseError> {
        let connection = self.pool.acquire(AccessMode::ReadOnly)?;
        let mut statement = connection.prepare(
            "SELECT run_id, started_at, entity_count, succeeded, failed, not_attempted, \
                    total_retry_attempts, recovered_via_retry \
             FROM ingest_runs ORDER BY seq DESC LIMIT ?",
        )?;
        let rows = statement.query_map(params![limit as i64], |row| {
            Ok(RetryTrendRow {
                run_id: row.get(0)?,
                started_at: row.get(1)?,
                entity_count: row.get(2)?,
                succeeded: row.get(3)?,
                failed: row.get(4)?,
                not_attempted: row.get(5)?,
                total_retry_attempts: row.get(6)?,
                recovered_via_retry: row.get(7)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(WarehouseError::from)
    }
}

/// Commit on success, roll back on failure.
fn finalize_transaction<T>(
    connection: &Connection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            let _ = connection.execute_batch("ROLLBACK");
            Err(error)
        }
    }
}

fn resolve_fundflow_home() -> PathBuf {
    if let Some(path) = env::var_os("FUNDFLOW_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".fundflow");
    }

    PathBuf::from(".fundflow")
}
