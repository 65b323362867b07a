//! Per-entity ingestion worker.
//!
//! One attempt is `Fetching -> Validating -> Persisting`. A failed attempt is
//! classified by the retry controller, which decides whether the worker starts
//! over at `Fetching`.

use std::sync::Arc;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::classify::{classify, Classification, Classify, IngestError, TaxonomyClassifier};
use crate::payload::PayloadSchema;
use crate::result::{IngestionResult, Stage};
use crate::retry::{RetryController, RetryPolicy};
use crate::source::{MetricsSource, MetricsStore, StoreError};
use crate::validate::validate_payload;
use crate::{EntityId, ErrorCategory, StoredMetrics, UtcDateTime};

/// Failure of a single attempt, tagged with the stage it happened in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptFailure {
    pub error: IngestError,
    pub stage: Stage,
    pub metrics_fetched: usize,
}

impl AttemptFailure {
    fn new(stage: Stage, error: impl Into<IngestError>, metrics_fetched: usize) -> Self {
        Self {
            error: error.into(),
            stage,
            metrics_fetched,
        }
    }
}

impl Classify<AttemptFailure> for TaxonomyClassifier {
    fn classify(&self, failure: &AttemptFailure) -> Classification {
        classify(&failure.error)
    }
}

#[derive(Debug, Clone, Copy)]
struct Persisted {
    metrics_fetched: usize,
    stored: StoredMetrics,
}

pub struct IngestionWorker {
    source: Arc<dyn MetricsSource>,
    store: Arc<dyn MetricsStore>,
    schema: PayloadSchema,
    retry: RetryController,
}

impl IngestionWorker {
    pub fn new(source: Arc<dyn MetricsSource>, store: Arc<dyn MetricsStore>) -> Self {
        Self {
            source,
            store,
            schema: PayloadSchema::default(),
            retry: RetryController::new(RetryPolicy::default()),
        }
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = RetryController::new(policy);
        self
    }

    /// Ingests one entity, retrying transient failures. Never fails: every
    /// error ends up in the returned result.
    #[instrument(skip_all, fields(entity = %entity_id))]
    pub async fn ingest(&self, entity_id: &EntityId, cancel: &CancellationToken) -> IngestionResult {
        let started = Instant::now();
        let outcome = self
            .retry
            .run(cancel, |attempt| self.attempt(entity_id, attempt))
            .await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        let retry_count = outcome.retry_count();

        match outcome.result {
            Ok(persisted) => {
                info!(
                    stored = persisted.stored.stored_count,
                    fetched = persisted.metrics_fetched,
                    retry_count,
                    "entity ingested"
                );
                IngestionResult::succeeded(
                    entity_id.clone(),
                    persisted.metrics_fetched,
                    persisted.stored,
                    retry_count,
                    elapsed_ms,
                )
            }
            Err(failure) => {
                let category = outcome
                    .classification
                    .map(|classification| classification.category)
                    .unwrap_or(ErrorCategory::UnexpectedError);
                warn!(
                    category = %category,
                    stage = %failure.stage,
                    retry_count,
                    error = %failure.error,
                    "entity failed"
                );
                IngestionResult::failed(
                    entity_id.clone(),
                    category,
                    failure.error.to_string(),
                    failure.stage,
                    failure.metrics_fetched,
                    retry_count,
                    elapsed_ms,
                )
            }
        }
    }

    async fn attempt(&self, entity_id: &EntityId, attempt: u32) -> Result<Persisted, AttemptFailure> {
        debug!(attempt, stage = %Stage::Fetching, "attempt stage");
        let payload = self
            .source
            .fetch_entity_metrics(entity_id)
            .await
            .map_err(|error| AttemptFailure::new(Stage::Fetching, error, 0))?;

        debug!(attempt, stage = %Stage::Validating, shape = payload.shape(), "attempt stage");
        let validated = validate_payload(&payload, entity_id, &self.schema, UtcDateTime::now())
            .map_err(|rejection| {
                let fetched = rejection.metrics_fetched();
                AttemptFailure::new(Stage::Validating, rejection, fetched)
            })?;
        let metrics_fetched = validated.metrics_fetched;
        for excluded in &validated.excluded {
            debug!(attempt, field = excluded.field, reason = ?excluded.reason, "field excluded");
        }

        debug!(
            attempt,
            stage = %Stage::Persisting,
            usable = validated.usable_count(),
            "attempt stage"
        );
        let stored = self
            .store
            .persist_metrics(self.source.source_name(), &validated)
            .await
            .map_err(|error| AttemptFailure::new(Stage::Persisting, error, metrics_fetched))?;

        if stored.stored_count == 0 {
            return Err(AttemptFailure::new(
                Stage::Persisting,
                StoreError::NothingStored {
                    entity: entity_id.clone(),
                },
                metrics_fetched,
            ));
        }
        if stored.stored_count > validated.usable_count() {
            return Err(AttemptFailure::new(
                Stage::Persisting,
                StoreError::Backend(format!(
                    "store reported {} rows for {} usable metrics",
                    stored.stored_count,
                    validated.usable_count()
                )),
                metrics_fetched,
            ));
        }

        Ok(Persisted {
            metrics_fetched,
            stored,
        })
    }
}
