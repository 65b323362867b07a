//! DuckDB-backed collaborators.
//!
//! [`Warehouse`] calls are blocking, so each write runs on the blocking pool.

use fundflow_warehouse::{
    EntityMetricsRecord, MetricRow, RunEntityRecord, RunRecord, Warehouse, WarehouseError,
};

use crate::result::{IngestionResult, RunSummary};
use crate::source::{BoxFuture, MetricsStore, RunLog, StoreError};
use crate::{MetricDatum, StoredMetrics, ValidatedMetrics};

impl From<WarehouseError> for StoreError {
    fn from(error: WarehouseError) -> Self {
        Self::Backend(error.to_string())
    }
}

impl MetricsStore for Warehouse {
    fn persist_metrics<'a>(
        &'a self,
        source: &'a str,
        metrics: &'a ValidatedMetrics,
    ) -> BoxFuture<'a, Result<StoredMetrics, StoreError>> {
        let record = entity_record(source, metrics);
        let warehouse = self.clone();
        Box::pin(async move {
            let receipt = tokio::task::spawn_blocking(move || warehouse.store_entity_metrics(&record))
                .await
                .map_err(|e| StoreError::Backend(format!("metric write task failed: {e}")))??;
            Ok::<_, StoreError>(StoredMetrics {
                stored_count: receipt.stored,
                parent_record_id: receipt.record_id,
            })
        })
    }
}

impl RunLog for Warehouse {
    fn append_run<'a>(&'a self, summary: &'a RunSummary) -> BoxFuture<'a, Result<(), StoreError>> {
        let record = run_record(summary);
        let warehouse = self.clone();
        Box::pin(async move {
            tokio::task::spawn_blocking(move || warehouse.append_run(&record))
                .await
                .map_err(|e| StoreError::Backend(format!("run log task failed: {e}")))??;
            Ok::<_, StoreError>(())
        })
    }
}

fn entity_record(source: &str, metrics: &ValidatedMetrics) -> EntityMetricsRecord {
    EntityMetricsRecord {
        entity_id: metrics.entity_id.as_str().to_owned(),
        source: source.to_owned(),
        as_of: metrics.as_of.format_rfc3339(),
        metrics: metrics
            .values
            .iter()
            .map(|value| match value.datum {
                MetricDatum::Number(number) => MetricRow::numeric(value.name, number),
                MetricDatum::Date(date) => MetricRow::date(value.name, date.to_string()),
            })
            .collect(),
    }
}

fn run_record(summary: &RunSummary) -> RunRecord {
    RunRecord {
        run_id: summary.run_id(),
        started_at: summary.started_at().format_rfc3339(),
        finished_at: summary.finished_at().format_rfc3339(),
        cancelled: summary.cancelled(),
        entities: summary.results().iter().map(entity_log_row).collect(),
    }
}

fn entity_log_row(result: &IngestionResult) -> RunEntityRecord {
    RunEntityRecord {
        entity_id: result.entity_id().as_str().to_owned(),
        outcome: result.outcome().as_str().to_owned(),
        error_category: result
            .error_category()
            .map(|category| category.as_str().to_owned()),
        error_message: result.error_message().map(str::to_owned),
        retry_count: result.retry_count(),
        metrics_fetched: result.metrics_fetched(),
        metrics_stored: result.metrics_stored(),
        record_id: result.entity_record_id(),
    }
}
