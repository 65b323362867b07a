//! Run reports: pure projections of a [`RunSummary`].

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::Serialize;
use uuid::Uuid;

use crate::result::{IngestionResult, Outcome, RunSummary, Stage};
use crate::{EntityId, ErrorCategory, UtcDateTime};

/// Serializable view of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: UtcDateTime,
    pub finished_at: UtcDateTime,
    pub cancelled: bool,
    pub entity_count: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub not_attempted: usize,
    pub total_retry_attempts: u64,
    pub entities_requiring_retry: Vec<String>,
    pub entities_recovered_via_retry: Vec<String>,
    pub entities_not_attempted: Vec<String>,
    pub failures_by_category: BTreeMap<ErrorCategory, usize>,
    pub results: Vec<EntityReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityReport {
    pub entity_id: String,
    pub outcome: Outcome,
    pub success: bool,
    pub metrics_fetched: usize,
    pub metrics_stored: usize,
    pub error_category: Option<ErrorCategory>,
    pub error_message: Option<String>,
    pub failed_stage: Option<Stage>,
    pub retry_count: u32,
    pub entity_record_id: Option<Uuid>,
    pub elapsed_ms: u64,
}

impl From<&IngestionResult> for EntityReport {
    fn from(result: &IngestionResult) -> Self {
        Self {
            entity_id: result.entity_id().to_string(),
            outcome: result.outcome(),
            success: result.success(),
            metrics_fetched: result.metrics_fetched(),
            metrics_stored: result.metrics_stored(),
            error_category: result.error_category(),
            error_message: result.error_message().map(str::to_owned),
            failed_stage: result.failed_stage(),
            retry_count: result.retry_count(),
            entity_record_id: result.entity_record_id(),
            elapsed_ms: result.elapsed_ms(),
        }
    }
}

impl From<&RunSummary> for RunReport {
    fn from(summary: &RunSummary) -> Self {
        Self {
            run_id: summary.run_id(),
            started_at: summary.started_at(),
            finished_at: summary.finished_at(),
            cancelled: summary.cancelled(),
            entity_count: summary.results().len(),
            succeeded: summary.count(Outcome::Succeeded),
            failed: summary.count(Outcome::Failed),
            not_attempted: summary.count(Outcome::NotAttempted),
            total_retry_attempts: summary.total_retry_attempts(),
            entities_requiring_retry: names(summary.entities_requiring_retry()),
            entities_recovered_via_retry: names(summary.entities_recovered_via_retry()),
            entities_not_attempted: names(summary.entities_not_attempted()),
            failures_by_category: summary.failures_by_category(),
            results: summary.results().iter().map(EntityReport::from).collect(),
        }
    }
}

/// Human-readable report: headline counts, retry statistics, failure
/// breakdown and a per-entity table.
pub fn render_text(summary: &RunSummary) -> String {
    let report = RunReport::from(summary);
    let mut out = String::new();

    let _ = writeln!(out, "Run {}", report.run_id);
    let _ = writeln!(out, "  started   {}", report.started_at);
    let _ = writeln!(out, "  finished  {}", report.finished_at);
    if report.cancelled {
        let _ = writeln!(out, "  CANCELLED before all entities were attempted");
    }
    let _ = writeln!(
        out,
        "  entities  {} total, {} succeeded, {} failed, {} not attempted",
        report.entity_count, report.succeeded, report.failed, report.not_attempted
    );

    let _ = writeln!(out, "\nRetry statistics");
    let _ = writeln!(out, "  total retry attempts       {}", report.total_retry_attempts);
    let _ = writeln!(
        out,
        "  entities requiring retry   {}",
        list_or_none(&report.entities_requiring_retry)
    );
    let _ = writeln!(
        out,
        "  recovered via retry        {}",
        list_or_none(&report.entities_recovered_via_retry)
    );

    if !report.failures_by_category.is_empty() {
        let _ = writeln!(out, "\nFailures by category");
        for (category, count) in &report.failures_by_category {
            let retry_hint = if category.is_retryable() {
                "transient"
            } else {
                "permanent"
            };
            let _ = writeln!(out, "  {:<22} {:>4}  ({retry_hint})", category.as_str(), count);
        }
    }

    if !report.entities_not_attempted.is_empty() {
        let _ = writeln!(
            out,
            "\nNot attempted: {}",
            report.entities_not_attempted.join(", ")
        );
    }

    let _ = writeln!(out, "\nEntities");
    let _ = writeln!(
        out,
        "  {:<10} {:<13} {:>7} {:>6} {:>7} {:<22} {}",
        "ENTITY", "OUTCOME", "FETCHED", "STORED", "RETRIES", "CATEGORY", "DETAIL"
    );
    for row in &report.results {
        let _ = writeln!(
            out,
            "  {:<10} {:<13} {:>7} {:>6} {:>7} {:<22} {}",
            row.entity_id,
            row.outcome.as_str(),
            row.metrics_fetched,
            row.metrics_stored,
            row.retry_count,
            row.error_category.map(ErrorCategory::as_str).unwrap_or("-"),
            row.error_message.as_deref().unwrap_or("")
        );
    }

    out
}

fn names<'a>(ids: impl IntoIterator<Item = &'a EntityId>) -> Vec<String> {
    ids.into_iter().map(EntityId::to_string).collect()
}

fn list_or_none(entities: &[String]) -> String {
    if entities.is_empty() {
        String::from("none")
    } else {
        entities.join(", ")
    }
}
