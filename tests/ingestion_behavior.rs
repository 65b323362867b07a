//! Behavior-driven tests for the ingestion pipeline: classification, retry
//! timing, validation outcomes and run-level statistics.

use std::sync::Arc;
use std::time::Duration;

use fundflow_core::{
    CategoryTally, ErrorCategory, FetchError, IngestionWorker, Outcome, RawPayload, RetryPolicy,
    Stage,
};
use serde_json::json;
use tokio_util::sync::CancellationToken;

use fundflow_tests::{aggregator, entities, entity, overview, MemoryStore, ScriptedSource, Step};

// =============================================================================
// Retry behavior
// =============================================================================

#[tokio::test(start_paused = true)]
async fn entity_recovers_after_two_network_failures_with_4s_then_8s_backoff() {
    // Given: IBM fails twice at the connection level, then answers
    let source = Arc::new(ScriptedSource::new().script(
        "IBM",
        vec![
            Step::err(FetchError::connect("connection refused")),
            Step::err(FetchError::connect("connection reset by peer")),
            Step::ok(overview("IBM")),
        ],
    ));
    let store = Arc::new(MemoryStore::new());

    // When: The entity is ingested with the default policy
    let result = IngestionWorker::new(source.clone(), store.clone())
        .ingest(&entity("IBM"), &CancellationToken::new())
        .await;

    // Then: It succeeds on the third attempt
    assert!(result.success());
    assert_eq!(result.retry_count(), 2);
    assert_eq!(result.metrics_stored(), 4);
    assert!(result.error_category().is_none());

    // And: The waits between attempts were exactly 4s and 8s
    let fetches = source.fetch_times("IBM");
    assert_eq!(fetches.len(), 3);
    assert_eq!(fetches[1] - fetches[0], Duration::from_secs(4));
    assert_eq!(fetches[2] - fetches[1], Duration::from_secs(8));
}

#[tokio::test(start_paused = true)]
async fn entity_fails_as_network_error_when_every_attempt_fails() {
    // Given: Every attempt for MSFT hits an HTTP 503
    let source = Arc::new(ScriptedSource::new().script(
        "MSFT",
        vec![
            Step::err(FetchError::status(503, "service unavailable")),
            Step::err(FetchError::status(503, "service unavailable")),
            Step::err(FetchError::status(503, "service unavailable")),
        ],
    ));

    // When: The entity is ingested
    let result = IngestionWorker::new(source.clone(), Arc::new(MemoryStore::new()))
        .ingest(&entity("MSFT"), &CancellationToken::new())
        .await;

    // Then: The attempt ceiling is respected and the failure is classified
    assert!(!result.success());
    assert_eq!(result.error_category(), Some(ErrorCategory::NetworkError));
    assert_eq!(result.retry_count(), 2);
    assert_eq!(result.failed_stage(), Some(Stage::Fetching));
    assert_eq!(source.fetch_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn sentinel_only_payload_fails_without_backoff() {
    // Given: The API answers with nothing but placeholder values
    let payload = RawPayload::from_value(json!({
        "Symbol": "TSLA",
        "PERatio": "None",
        "EPS": "-",
        "DividendDate": "None",
    }));
    let source = Arc::new(ScriptedSource::new().script("TSLA", vec![Step::ok(payload)]));
    let started = tokio::time::Instant::now();

    // When: The entity is ingested
    let result = IngestionWorker::new(source.clone(), Arc::new(MemoryStore::new()))
        .ingest(&entity("TSLA"), &CancellationToken::new())
        .await;

    // Then: It is a data quality failure with no retry and no wait
    assert_eq!(result.error_category(), Some(ErrorCategory::DataQualityError));
    assert_eq!(result.retry_count(), 0);
    assert_eq!(result.metrics_fetched(), 3);
    assert_eq!(result.metrics_stored(), 0);
    assert_eq!(source.fetch_count(), 1);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test(start_paused = true)]
async fn timeouts_are_retried_and_a_custom_policy_caps_attempts() {
    // Given: A two-attempt policy and a source that keeps timing out
    let source = Arc::new(ScriptedSource::new().script(
        "NVDA",
        vec![
            Step::err(FetchError::timeout("request timed out after 10000ms")),
            Step::err(FetchError::timeout("request timed out after 10000ms")),
            Step::ok(overview("NVDA")),
        ],
    ));
    let policy = RetryPolicy::new(2, Duration::from_secs(1), 3.0, Duration::from_secs(2))
        .expect("valid policy");

    // When: The entity is ingested
    let result = IngestionWorker::new(source.clone(), Arc::new(MemoryStore::new()))
        .with_retry_policy(policy)
        .ingest(&entity("NVDA"), &CancellationToken::new())
        .await;

    // Then: Only two attempts ran and retry_count stays below the ceiling
    assert_eq!(result.error_category(), Some(ErrorCategory::TimeoutError));
    assert_eq!(result.retry_count(), 1);
    assert_eq!(source.fetch_count(), 2);
}

// =============================================================================
// Validation outcomes
// =============================================================================

#[tokio::test]
async fn mismatched_identity_is_a_validation_error_regardless_of_data() {
    // Given: A complete, well-formed payload for the wrong company
    let source = Arc::new(ScriptedSource::new().script("AAPL", vec![Step::ok(overview("MSFT"))]));
    let store = Arc::new(MemoryStore::new());

    // When: AAPL is ingested
    let result = IngestionWorker::new(source, store.clone())
        .ingest(&entity("AAPL"), &CancellationToken::new())
        .await;

    // Then: Nothing is stored and the identity mismatch is reported
    assert_eq!(result.error_category(), Some(ErrorCategory::DataValidationError));
    assert_eq!(result.failed_stage(), Some(Stage::Validating));
    assert_eq!(result.retry_count(), 0);
    assert!(store.persisted_entities().is_empty());
}

#[tokio::test]
async fn identity_only_payload_reports_no_data() {
    // Given: The API returns the identity field and no overview fields
    let payload = RawPayload::from_value(json!({ "Symbol": "IBM" }));
    let source = Arc::new(ScriptedSource::new().script("IBM", vec![Step::ok(payload)]));

    // When: IBM is ingested
    let result = IngestionWorker::new(source, Arc::new(MemoryStore::new()))
        .ingest(&entity("IBM"), &CancellationToken::new())
        .await;

    // Then: The entity reports no data
    assert_eq!(result.error_category(), Some(ErrorCategory::NoData));
    assert_eq!(result.metrics_fetched(), 0);
}

// =============================================================================
// Run aggregation
// =============================================================================

#[tokio::test(start_paused = true)]
async fn results_follow_request_order_under_variable_latency() {
    // Given: A finishes last, C finishes first
    let source = Arc::new(
        ScriptedSource::new()
            .script("A", vec![Step::ok(overview("A")).after(Duration::from_millis(900))])
            .script("B", vec![Step::ok(overview("B")).after(Duration::from_millis(400))])
            .script("C", vec![Step::ok(overview("C")).after(Duration::from_millis(50))]),
    );
    let store = Arc::new(MemoryStore::new());

    // When: All three run concurrently
    let summary = aggregator(source, store.clone(), 3)
        .run(entities(&["A", "B", "C"]), CancellationToken::new())
        .await;

    // Then: Results keep the requested order even though storage did not
    let order: Vec<&str> = summary.results().iter().map(|r| r.entity_id().as_str()).collect();
    assert_eq!(order, vec!["A", "B", "C"]);
    assert_eq!(store.persisted_entities(), vec!["C", "B", "A"]);
    assert!(summary.is_clean());
}

#[tokio::test(start_paused = true)]
async fn run_statistics_are_folds_over_results() {
    // Given: A mix of clean success, recovered retry, permanent and exhausted failures
    let source = Arc::new(
        ScriptedSource::new()
            .script("IBM", vec![Step::ok(overview("IBM"))])
            .script(
                "MSFT",
                vec![
                    Step::err(FetchError::other("dns error: failed to resolve host")),
                    Step::ok(overview("MSFT")),
                ],
            )
            .script("AAPL", vec![Step::ok(overview("AAPL.L"))])
            .script(
                "TSLA",
                vec![
                    Step::err(FetchError::rate_limited("Thank you for using Alpha Vantage")),
                    Step::err(FetchError::rate_limited("Thank you for using Alpha Vantage")),
                    Step::err(FetchError::rate_limited("Thank you for using Alpha Vantage")),
                ],
            )
            .script("NVDA", vec![Step::ok(RawPayload::from_body("<html>oops</html>"))]),
    );

    // When: The run completes
    let summary = aggregator(source, Arc::new(MemoryStore::new()), 2)
        .run(
            entities(&["IBM", "MSFT", "AAPL", "TSLA", "NVDA"]),
            CancellationToken::new(),
        )
        .await;

    // Then: Retry statistics account for every attempt
    assert_eq!(summary.total_retry_attempts(), 3);
    let requiring: Vec<&str> = summary
        .entities_requiring_retry()
        .into_iter()
        .map(|id| id.as_str())
        .collect();
    assert_eq!(requiring, vec!["MSFT", "TSLA"]);
    let recovered: Vec<&str> = summary
        .entities_recovered_via_retry()
        .into_iter()
        .map(|id| id.as_str())
        .collect();
    assert_eq!(recovered, vec!["MSFT"]);

    // And: Failures are broken down by category
    let by_category = summary.failures_by_category();
    assert_eq!(by_category.get(&ErrorCategory::DataValidationError), Some(&1));
    assert_eq!(by_category.get(&ErrorCategory::NetworkError), Some(&1));
    assert_eq!(by_category.get(&ErrorCategory::ApiFormatError), Some(&1));
    assert_eq!(summary.count(Outcome::Succeeded), 2);

    // And: An incremental tally over the results agrees with the batch fold
    let mut tally = CategoryTally::default();
    for result in summary.results() {
        tally.record(result);
    }
    assert_eq!(tally.counts(), &by_category);
    assert_eq!(tally.total(), summary.count(Outcome::Failed));
}

#[tokio::test]
async fn success_flag_matches_stored_metrics_and_category() {
    // Given: One good entity and one that returns an empty body
    let source = Arc::new(
        ScriptedSource::new()
            .script("IBM", vec![Step::ok(overview("IBM"))])
            .script("META", vec![Step::ok(RawPayload::from_body(""))]),
    );

    // When: Both are ingested
    let summary = aggregator(source, Arc::new(MemoryStore::new()), 2)
        .run(entities(&["IBM", "META"]), CancellationToken::new())
        .await;

    // Then: success holds exactly when metrics were stored without a category
    for result in summary.results() {
        assert_eq!(
            result.success(),
            result.metrics_stored() > 0 && result.error_category().is_none()
        );
        assert!(result.retry_count() < RetryPolicy::default().max_attempts);
    }
    assert_eq!(
        summary.results()[1].error_category(),
        Some(ErrorCategory::ApiFormatError)
    );
}

#[tokio::test]
async fn duplicate_entities_run_once_in_first_position() {
    // Given: A request list naming MSFT twice in different case
    let source = Arc::new(
        ScriptedSource::new()
            .script("MSFT", vec![Step::ok(overview("MSFT"))])
            .script("IBM", vec![Step::ok(overview("IBM"))]),
    );

    // When: The run executes
    let summary = aggregator(source.clone(), Arc::new(MemoryStore::new()), 2)
        .run(entities(&["msft", "IBM", "MSFT"]), CancellationToken::new())
        .await;

    // Then: MSFT is fetched once and reported once
    let order: Vec<&str> = summary.results().iter().map(|r| r.entity_id().as_str()).collect();
    assert_eq!(order, vec!["MSFT", "IBM"]);
    assert_eq!(source.fetch_count(), 2);
}
