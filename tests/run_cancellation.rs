//! Behavior-driven tests for run-level cancellation and run entry points.

use std::sync::Arc;
use std::time::Duration;

use fundflow_core::catalog::{FileCatalog, StaticCatalog};
use fundflow_core::{ErrorCategory, FetchError, Outcome, RunError, NOT_ATTEMPTED_MESSAGE};
use tokio_util::sync::CancellationToken;

use fundflow_tests::{aggregator, entities, overview, MemoryStore, ScriptedSource, Step};

#[tokio::test]
async fn cancelling_after_first_entity_marks_the_rest_not_attempted() {
    // Given: A sequential run where the operator aborts as soon as A is stored
    let cancel = CancellationToken::new();
    let source = Arc::new(
        ScriptedSource::new()
            .script("A", vec![Step::ok(overview("A"))])
            .script("B", vec![Step::ok(overview("B"))])
            .script("C", vec![Step::ok(overview("C"))]),
    );
    let store = Arc::new(MemoryStore::cancelling_after("A", cancel.clone()));

    // When: The run is executed
    let summary = aggregator(source.clone(), store, 1)
        .run(entities(&["A", "B", "C"]), cancel)
        .await;

    // Then: A keeps its real result
    assert!(summary.cancelled());
    let results = summary.results();
    assert_eq!(results.len(), 3);
    assert_eq!(results[0].outcome(), Outcome::Succeeded);

    // And: B and C are explicit not-attempted markers, never silent drops
    for skipped in &results[1..] {
        assert_eq!(skipped.outcome(), Outcome::NotAttempted);
        assert!(!skipped.success());
        assert!(skipped.error_category().is_none());
        assert_eq!(skipped.error_message(), Some(NOT_ATTEMPTED_MESSAGE));
        assert_eq!(skipped.retry_count(), 0);
    }
    let skipped: Vec<&str> = summary
        .entities_not_attempted()
        .into_iter()
        .map(|id| id.as_str())
        .collect();
    assert_eq!(skipped, vec!["B", "C"]);
    assert_eq!(source.fetch_count(), 1);

    // And: Not-attempted entities do not count as failures
    assert!(summary.failures_by_category().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_interrupts_backoff_and_lets_in_flight_fetches_finish() {
    // Given: A is backing off after a connection failure while B is mid-fetch
    let cancel = CancellationToken::new();
    let source = Arc::new(
        ScriptedSource::new()
            .script(
                "A",
                vec![
                    Step::err(FetchError::connect("connection refused")),
                    Step::ok(overview("A")),
                ],
            )
            .script("B", vec![Step::ok(overview("B")).after(Duration::from_secs(3))])
            .script("C", vec![Step::ok(overview("C"))]),
    );
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    // When: The run is cancelled one second in
    let summary = aggregator(source.clone(), Arc::new(MemoryStore::new()), 2)
        .run(entities(&["A", "B", "C"]), cancel)
        .await;

    // Then: A stops with its last failure and no further attempt
    let results = summary.results();
    assert_eq!(results[0].error_category(), Some(ErrorCategory::NetworkError));
    assert_eq!(results[0].retry_count(), 0);
    assert_eq!(source.fetch_times("A").len(), 1);

    // And: B's in-flight attempt completes
    assert_eq!(results[1].outcome(), Outcome::Succeeded);

    // And: C never starts
    assert_eq!(results[2].outcome(), Outcome::NotAttempted);
    assert!(summary.cancelled());
}

#[tokio::test(start_paused = true)]
async fn run_deadline_cancels_remaining_entities() {
    // Given: A slow first entity and a two-second run deadline
    let source = Arc::new(
        ScriptedSource::new()
            .script("A", vec![Step::ok(overview("A")).after(Duration::from_secs(3))])
            .script("B", vec![Step::ok(overview("B"))]),
    );
    let run = aggregator(source, Arc::new(MemoryStore::new()), 1)
        .with_run_deadline(Some(Duration::from_secs(2)));

    // When: The run executes without an operator abort
    let summary = run.run(entities(&["A", "B"]), CancellationToken::new()).await;

    // Then: The deadline stops B but not the in-flight A
    assert!(summary.cancelled());
    assert_eq!(summary.results()[0].outcome(), Outcome::Succeeded);
    assert_eq!(summary.results()[1].outcome(), Outcome::NotAttempted);
}

#[tokio::test]
async fn uncancelled_run_is_not_flagged() {
    // Given: A run with no abort and no deadline
    let source = Arc::new(ScriptedSource::new().script("A", vec![Step::ok(overview("A"))]));

    // When: It completes
    let summary = aggregator(source, Arc::new(MemoryStore::new()), 4)
        .run(entities(&["A"]), CancellationToken::new())
        .await;

    // Then: It is clean and not cancelled
    assert!(!summary.cancelled());
    assert!(summary.is_clean());
    assert!(summary.entities_not_attempted().is_empty());
}

#[tokio::test]
async fn catalog_run_ingests_listed_entities() {
    // Given: A static catalog of two entities
    let source = Arc::new(
        ScriptedSource::new()
            .script("IBM", vec![Step::ok(overview("IBM"))])
            .script("MSFT", vec![Step::ok(overview("MSFT"))]),
    );
    let catalog = StaticCatalog::parse(["ibm", "msft"]).expect("valid catalog");

    // When: The run enumerates the catalog
    let summary = aggregator(source, Arc::new(MemoryStore::new()), 2)
        .run_catalog(&catalog, CancellationToken::new())
        .await
        .expect("catalog run succeeds");

    // Then: Every listed entity has a result
    assert_eq!(summary.results().len(), 2);
    assert!(summary.is_clean());
}

#[tokio::test]
async fn unreadable_catalog_fails_the_run_before_any_fetch() {
    // Given: A catalog file that does not exist
    let source = Arc::new(ScriptedSource::new());
    let catalog = FileCatalog::new("/definitely/not/a/watchlist.txt");

    // When: The run enumerates the catalog
    let error = aggregator(source.clone(), Arc::new(MemoryStore::new()), 2)
        .run_catalog(&catalog, CancellationToken::new())
        .await
        .expect_err("enumeration must fail");

    // Then: The run is rejected and nothing was fetched
    assert!(matches!(error, RunError::Catalog(_)));
    assert_eq!(source.fetch_count(), 0);
}
