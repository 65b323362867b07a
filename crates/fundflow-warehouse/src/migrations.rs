//! Versioned schema migrations for the metric warehouse.

use ::duckdb::{params, Connection};

struct Migration {
    version: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "0001_entity_metrics",
        sql: r#"
CREATE SEQUENCE IF NOT EXISTS entity_record_seq START 1;

CREATE TABLE IF NOT EXISTS entity_records (
    record_id TEXT PRIMARY KEY,
    seq BIGINT NOT NULL DEFAULT nextval('entity_record_seq'),
    entity_id TEXT NOT NULL,
    source TEXT NOT NULL,
    as_of TEXT NOT NULL,
    metric_count BIGINT NOT NULL,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS entity_metrics (
    record_id TEXT NOT NULL,
    entity_id TEXT NOT NULL,
    metric TEXT NOT NULL,
    numeric_value DOUBLE,
    date_value DATE,
    PRIMARY KEY(record_id, metric)
);
"#,
    },
    Migration {
        version: "0002_run_log",
        sql: r#"
CREATE SEQUENCE IF NOT EXISTS ingest_run_seq START 1;

CREATE TABLE IF NOT EXISTS ingest_runs (
    run_id TEXT PRIMARY KEY,
    seq BIGINT NOT NULL DEFAULT nextval('ingest_run_seq'),
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    cancelled BOOLEAN NOT NULL,
    entity_count BIGINT NOT NULL,
    succeeded BIGINT NOT NULL,
    failed BIGINT NOT NULL,
    not_attempted BIGINT NOT NULL,
    total_retry_attempts BIGINT NOT NULL,
    recovered_via_retry BIGINT NOT NULL
);

CREATE TABLE IF NOT EXISTS ingest_log (
    run_id TEXT NOT NULL,
    position BIGINT NOT NULL,
    entity_id TEXT NOT NULL,
    outcome TEXT NOT NULL,
    error_category TEXT,
    error_message TEXT,
    retry_count BIGINT NOT NULL,
    metrics_fetched BIGINT NOT NULL,
    metrics_stored BIGINT NOT NULL,
    record_id TEXT,
    logged_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    PRIMARY KEY(run_id, position)
);
"#,
    },
    Migration {
        version: "0003_indexes",
        sql: r#"
CREATE INDEX IF NOT EXISTS idx_entity_records_entity_seq ON entity_records(entity_id, seq);
CREATE INDEX IF NOT EXISTS idx_ingest_log_entity ON ingest_log(entity_id);
"#,
    },
];

/// Apply every migration not yet recorded in `schema_migrations`.
///
/// # Errors
/// Returns an error if a migration statement fails.
pub fn apply_migrations(connection: &Connection) -> Result<(), ::duckdb::Error> {
    connection.execute_batch(
        r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);
"#,
    )?;

    for migration in MIGRATIONS {
        let applied: i64 = connection.query_row(
            "SELECT COUNT(*) FROM schema_migrations WHERE version = ?",
            params![migration.version],
            |row| row.get(0),
        )?;
        if applied > 0 {
            continue;
        }

        connection.execute_batch(migration.sql)?;
        connection.execute(
            "INSERT INTO schema_migrations (version) VALUES (?)",
            params![migration.version],
        )?;
    }

    Ok(())
}
