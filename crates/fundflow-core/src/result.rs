//! Per-entity and per-run results.
//!
//! [`IngestionResult`] values are only built through the crate's constructors,
//! which keep the success, category and count fields consistent with each
//! other. [`RunSummary`] stores the ordered results and nothing else: every
//! statistic is computed from them on demand.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{EntityId, ErrorCategory, StoredMetrics, UtcDateTime};

/// Fixed diagnostic of entities skipped by a cancelled run.
pub const NOT_ATTEMPTED_MESSAGE: &str = "not attempted: run was cancelled before this entity started";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Succeeded,
    Failed,
    NotAttempted,
}

impl Outcome {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::NotAttempted => "not_attempted",
        }
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Worker stage an attempt was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Fetching,
    Validating,
    Persisting,
}

impl Stage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::Validating => "validating",
            Self::Persisting => "persisting",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of ingesting one entity in one run.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestionResult {
    entity_id: EntityId,
    outcome: Outcome,
    metrics_fetched: usize,
    metrics_stored: usize,
    error_category: Option<ErrorCategory>,
    error_message: Option<String>,
    failed_stage: Option<Stage>,
    retry_count: u32,
    entity_record_id: Option<Uuid>,
    elapsed_ms: u64,
}

impl IngestionResult {
    /// `stored.stored_count` must be positive and not exceed `metrics_fetched`.
    pub(crate) fn succeeded(
        entity_id: EntityId,
        metrics_fetched: usize,
        stored: StoredMetrics,
        retry_count: u32,
        elapsed_ms: u64,
    ) -> Self {
        debug_assert!(stored.stored_count > 0);
        debug_assert!(stored.stored_count <= metrics_fetched);
        Self {
            entity_id,
            outcome: Outcome::Succeeded,
            metrics_fetched,
            metrics_stored: stored.stored_count,
            error_category: None,
            error_message: None,
            failed_stage: None,
            retry_count,
            entity_record_id: Some(stored.parent_record_id),
            elapsed_ms,
        }
    }

    pub(crate) fn failed(
        entity_id: EntityId,
        category: ErrorCategory,
        message: impl Into<String>,
        stage: Stage,
        metrics_fetched: usize,
        retry_count: u32,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            entity_id,
            outcome: Outcome::Failed,
            metrics_fetched,
            metrics_stored: 0,
            error_category: Some(category),
            error_message: Some(message.into()),
            failed_stage: Some(stage),
            retry_count,
            entity_record_id: None,
            elapsed_ms,
        }
    }

    pub(crate) fn not_attempted(entity_id: EntityId) -> Self {
        Self {
            entity_id,
            outcome: Outcome::NotAttempted,
            metrics_fetched: 0,
            metrics_stored: 0,
            error_category: None,
            error_message: Some(String::from(NOT_ATTEMPTED_MESSAGE)),
            failed_stage: None,
            retry_count: 0,
            entity_record_id: None,
            elapsed_ms: 0,
        }
    }

    pub fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    pub const fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn success(&self) -> bool {
        self.outcome == Outcome::Succeeded
    }

    pub const fn metrics_fetched(&self) -> usize {
        self.metrics_fetched
    }

    pub const fn metrics_stored(&self) -> usize {
        self.metrics_stored
    }

    pub const fn error_category(&self) -> Option<ErrorCategory> {
        self.error_category
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub const fn failed_stage(&self) -> Option<Stage> {
        self.failed_stage
    }

    pub const fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub const fn entity_record_id(&self) -> Option<Uuid> {
        self.entity_record_id
    }

    pub const fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }
}

/// Outcome of one pipeline invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    run_id: Uuid,
    started_at: UtcDateTime,
    finished_at: UtcDateTime,
    cancelled: bool,
    results: Vec<IngestionResult>,
}

impl RunSummary {
    pub(crate) fn new(
        run_id: Uuid,
        started_at: UtcDateTime,
        finished_at: UtcDateTime,
        cancelled: bool,
        results: Vec<IngestionResult>,
    ) -> Self {
        Self {
            run_id,
            started_at,
            finished_at,
            cancelled,
            results,
        }
    }

    pub const fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub const fn started_at(&self) -> UtcDateTime {
        self.started_at
    }

    pub const fn finished_at(&self) -> UtcDateTime {
        self.finished_at
    }

    pub const fn cancelled(&self) -> bool {
        self.cancelled
    }

    /// Results in request order.
    pub fn results(&self) -> &[IngestionResult] {
        &self.results
    }

    pub fn total_retry_attempts(&self) -> u64 {
        self.results
            .iter()
            .map(|result| u64::from(result.retry_count))
            .sum()
    }

    pub fn entities_requiring_retry(&self) -> BTreeSet<&EntityId> {
        self.results
            .iter()
            .filter(|result| result.retry_count > 0)
            .map(IngestionResult::entity_id)
            .collect()
    }

    pub fn entities_recovered_via_retry(&self) -> BTreeSet<&EntityId> {
        self.results
            .iter()
            .filter(|result| result.retry_count > 0 && result.success())
            .map(IngestionResult::entity_id)
            .collect()
    }

    /// In request order.
    pub fn entities_not_attempted(&self) -> Vec<&EntityId> {
        self.results
            .iter()
            .filter(|result| result.outcome == Outcome::NotAttempted)
            .map(IngestionResult::entity_id)
            .collect()
    }

    pub fn failures_by_category(&self) -> BTreeMap<ErrorCategory, usize> {
        self.results
            .iter()
            .filter_map(IngestionResult::error_category)
            .fold(BTreeMap::new(), |mut counts, category| {
                *counts.entry(category).or_insert(0) += 1;
                counts
            })
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.results
            .iter()
            .filter(|result| result.outcome == outcome)
            .count()
    }

    /// True when every requested entity was ingested.
    pub fn is_clean(&self) -> bool {
        self.results.iter().all(IngestionResult::success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(symbol: &str) -> EntityId {
        EntityId::parse(symbol).expect("valid")
    }

    fn stored(count: usize) -> StoredMetrics {
        StoredMetrics {
            stored_count: count,
            parent_record_id: Uuid::new_v4(),
        }
    }

    fn sample_summary() -> RunSummary {
        let results = vec![
            IngestionResult::succeeded(entity("AAPL"), 10, stored(9), 0, 12),
            IngestionResult::succeeded(entity("MSFT"), 10, stored(10), 2, 12_040),
            IngestionResult::failed(
                entity("IBM"),
                ErrorCategory::NetworkError,
                "connection reset",
                Stage::Fetching,
                0,
                2,
                12_100,
            ),
            IngestionResult::failed(
                entity("XYZ"),
                ErrorCategory::NoData,
                "payload contains none of the expected metric fields",
                Stage::Validating,
                0,
                0,
                30,
            ),
            IngestionResult::failed(
                entity("QQQ"),
                ErrorCategory::NetworkError,
                "HTTP 503",
                Stage::Fetching,
                0,
                1,
                4_020,
            ),
            IngestionResult::not_attempted(entity("TSLA")),
        ];
        RunSummary::new(
            Uuid::new_v4(),
            UtcDateTime::now(),
            UtcDateTime::now(),
            true,
            results,
        )
    }

    #[test]
    fn success_results_carry_no_error() {
        let result = IngestionResult::succeeded(entity("AAPL"), 5, stored(4), 1, 4_010);
        assert!(result.success());
        assert_eq!(result.error_category(), None);
        assert_eq!(result.error_message(), None);
        assert_eq!(result.metrics_stored(), 4);
        assert!(result.entity_record_id().is_some());
    }

    #[test]
    fn not_attempted_results_are_zeroed_and_uncategorized() {
        let result = IngestionResult::not_attempted(entity("TSLA"));
        assert_eq!(result.outcome(), Outcome::NotAttempted);
        assert!(!result.success());
        assert_eq!(result.error_category(), None);
        assert_eq!(result.error_message(), Some(NOT_ATTEMPTED_MESSAGE));
        assert_eq!(result.retry_count(), 0);
        assert_eq!(result.metrics_fetched(), 0);
    }

    #[test]
    fn statistics_are_folds_over_results() {
        let summary = sample_summary();

        assert_eq!(summary.total_retry_attempts(), 5);
        assert_eq!(
            summary.entities_requiring_retry(),
            BTreeSet::from([&entity("MSFT"), &entity("IBM"), &entity("QQQ")])
        );
        assert_eq!(
            summary.entities_recovered_via_retry(),
            BTreeSet::from([&entity("MSFT")])
        );
        assert_eq!(summary.entities_not_attempted(), vec![&entity("TSLA")]);
        assert_eq!(
            summary.failures_by_category(),
            BTreeMap::from([
                (ErrorCategory::NetworkError, 2),
                (ErrorCategory::NoData, 1),
            ])
        );
        assert_eq!(summary.count(Outcome::Succeeded), 2);
        assert_eq!(summary.count(Outcome::Failed), 3);
        assert!(!summary.is_clean());
    }

    #[test]
    fn stages_and_outcomes_serialize_as_snake_case() {
        assert_eq!(
            serde_json::to_string(&Outcome::NotAttempted).expect("encode"),
            "\"not_attempted\""
        );
        assert_eq!(
            serde_json::to_string(&Stage::Persisting).expect("encode"),
            "\"persisting\""
        );
    }
}
