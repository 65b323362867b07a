//! Run aggregation.
//!
//! The aggregator drives one [`IngestionWorker`] per entity through an ordered
//! buffered stream: at most `concurrency` entities are in flight and results
//! come back in request order regardless of completion order.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::result::{IngestionResult, Outcome, RunSummary};
use crate::source::{CatalogError, EntityCatalog, MetricsSource, MetricsStore};
use crate::worker::IngestionWorker;
use crate::{EntityId, ErrorCategory, IngestConfig, UtcDateTime};

pub const DEFAULT_CONCURRENCY: usize = 4;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("failed to enumerate entities: {0}")]
    Catalog(#[from] CatalogError),
}

/// Failure counts maintained while results stream in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryTally {
    counts: BTreeMap<ErrorCategory, usize>,
}

impl CategoryTally {
    pub fn record(&mut self, result: &IngestionResult) {
        if let Some(category) = result.error_category() {
            *self.counts.entry(category).or_insert(0) += 1;
        }
    }

    pub fn counts(&self) -> &BTreeMap<ErrorCategory, usize> {
        &self.counts
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }
}

pub struct RunAggregator {
    worker: Arc<IngestionWorker>,
    concurrency: usize,
    run_deadline: Option<Duration>,
}

impl RunAggregator {
    /// `concurrency` is clamped to at least 1.
    pub fn new(worker: IngestionWorker, concurrency: usize) -> Self {
        Self {
            worker: Arc::new(worker),
            concurrency: concurrency.max(1),
            run_deadline: None,
        }
    }

    pub fn from_config(
        source: Arc<dyn MetricsSource>,
        store: Arc<dyn MetricsStore>,
        config: &IngestConfig,
    ) -> Self {
        let worker = IngestionWorker::new(source, store).with_retry_policy(config.retry);
        Self::new(worker, config.concurrency).with_run_deadline(config.run_deadline)
    }

    /// Cancels the run once `deadline` has elapsed since it started.
    pub fn with_run_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.run_deadline = deadline;
        self
    }

    pub const fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub async fn run_catalog(
        &self,
        catalog: &dyn EntityCatalog,
        cancel: CancellationToken,
    ) -> Result<RunSummary, RunError> {
        let entity_ids = catalog.list_entities_to_ingest().await?;
        Ok(self.run(entity_ids, cancel).await)
    }

    /// Runs every entity to a terminal state. Entities that had not started when
    /// `cancel` fired are reported as not attempted.
    #[instrument(skip_all, fields(run_id = tracing::field::Empty))]
    pub async fn run(&self, entity_ids: Vec<EntityId>, cancel: CancellationToken) -> RunSummary {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));
        let started_at = UtcDateTime::now();
        let entities = dedupe(entity_ids);
        let total = entities.len();
        info!(entities = total, concurrency = self.concurrency, "run started");

        let run_token = cancel.child_token();
        let deadline_timer = self.run_deadline.map(|deadline| {
            let token = run_token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(deadline).await;
                warn!(deadline_secs = deadline.as_secs(), "run deadline reached, cancelling");
                token.cancel();
            })
        });

        let mut tally = CategoryTally::default();
        let mut results = Vec::with_capacity(total);
        let mut in_order = stream::iter(entities.into_iter().map(|entity_id| {
            let worker = Arc::clone(&self.worker);
            let token = run_token.clone();
            async move {
                if token.is_cancelled() {
                    return IngestionResult::not_attempted(entity_id);
                }
                worker.ingest(&entity_id, &token).await
            }
        }))
        .buffered(self.concurrency);

        while let Some(result) = in_order.next().await {
            tally.record(&result);
            info!(
                entity = %result.entity_id(),
                outcome = %result.outcome(),
                completed = results.len() + 1,
                total,
                failures = tally.total(),
                "entity finished"
            );
            results.push(result);
        }

        if let Some(timer) = deadline_timer {
            timer.abort();
        }
        let cancelled = run_token.is_cancelled();

        let summary = RunSummary::new(run_id, started_at, UtcDateTime::now(), cancelled, results);
        debug_assert_eq!(tally.counts(), &summary.failures_by_category());
        info!(
            succeeded = summary.count(Outcome::Succeeded),
            failed = summary.count(Outcome::Failed),
            not_attempted = summary.count(Outcome::NotAttempted),
            total_retry_attempts = summary.total_retry_attempts(),
            cancelled,
            "run finished"
        );
        summary
    }
}

/// Keeps the first occurrence of every entity.
fn dedupe(entity_ids: Vec<EntityId>) -> Vec<EntityId> {
    let mut seen = HashSet::with_capacity(entity_ids.len());
    entity_ids
        .into_iter()
        .filter(|entity_id| {
            let first = seen.insert(entity_id.clone());
            if !first {
                warn!(entity = %entity_id, "dropping duplicate entity from run");
            }
            first
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(symbols: &[&str]) -> Vec<EntityId> {
        symbols
            .iter()
            .map(|symbol| EntityId::parse(symbol).expect("valid"))
            .collect()
    }

    #[test]
    fn dedupe_keeps_first_occurrence_order() {
        assert_eq!(
            dedupe(ids(&["msft", "AAPL", "MSFT", "ibm", "aapl"])),
            ids(&["MSFT", "AAPL", "IBM"])
        );
    }

    #[test]
    fn tally_ignores_successes_and_not_attempted() {
        let mut tally = CategoryTally::default();
        tally.record(&IngestionResult::not_attempted(
            EntityId::parse("TSLA").expect("valid"),
        ));
        assert_eq!(tally.total(), 0);
        assert!(tally.counts().is_empty());
    }
}
