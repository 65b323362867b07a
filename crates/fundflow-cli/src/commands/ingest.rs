use std::sync::Arc;
use std::time::Duration;

use fundflow_core::adapters::{AlphaVantageOverviewSource, FixtureSource};
use fundflow_core::catalog::{FileCatalog, StaticCatalog};
use fundflow_core::{
    EntityCatalog, EntityId, IngestConfig, MetricsSource, MetricsStore, RunAggregator, RunLog,
    RunSummary, StoreError,
};
use fundflow_warehouse::Warehouse;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::IngestArgs;
use crate::error::CliError;

/// A finished run and, if the run log rejected it, why.
#[derive(Debug)]
pub struct IngestOutcome {
    pub summary: RunSummary,
    pub run_log_error: Option<StoreError>,
}

pub async fn run(args: &IngestArgs, warehouse: Warehouse) -> Result<IngestOutcome, CliError> {
    let store = Arc::new(warehouse.clone());
    run_with(args, store, &warehouse).await
}

/// Metrics are already stored once the run finishes, so a run log failure
/// is reported next to the summary instead of replacing it.
async fn run_with(
    args: &IngestArgs,
    store: Arc<dyn MetricsStore>,
    run_log: &dyn RunLog,
) -> Result<IngestOutcome, CliError> {
    let config = ingest_config(args, IngestConfig::from_env()?);
    let entities = requested_entities(args).await?;

    let source: Arc<dyn MetricsSource> = if args.mock {
        Arc::new(FixtureSource)
    } else {
        Arc::new(AlphaVantageOverviewSource::from_config(&config)?)
    };
    let aggregator = RunAggregator::from_config(source, store, &config);

    let cancel = CancellationToken::new();
    let interrupt = spawn_interrupt_listener(cancel.clone());
    let summary = aggregator
        .run_catalog(&StaticCatalog::new(entities), cancel)
        .await;
    interrupt.abort();
    let summary = summary?;

    let run_log_error = match run_log.append_run(&summary).await {
        Ok(()) => None,
        Err(error) => {
            warn!(
                run_id = %summary.run_id(),
                %error,
                "run finished but was not written to the run log"
            );
            Some(error)
        }
    };
    Ok(IngestOutcome {
        summary,
        run_log_error,
    })
}

/// Flags override environment values.
fn ingest_config(args: &IngestArgs, mut config: IngestConfig) -> IngestConfig {
    if let Some(concurrency) = args.concurrency {
        config.concurrency = concurrency.get();
    }
    if let Some(secs) = args.deadline_secs {
        config.run_deadline = Some(Duration::from_secs(secs));
    }
    config
}

/// File entries first, then positional symbols.
async fn requested_entities(args: &IngestArgs) -> Result<Vec<EntityId>, CliError> {
    let mut entities = match &args.file {
        Some(path) => FileCatalog::new(path).list_entities_to_ingest().await?,
        None => Vec::new(),
    };
    entities.extend(StaticCatalog::parse(&args.symbols)?.entities().iter().cloned());
    if entities.is_empty() {
        return Err(CliError::Command(String::from(
            "no entities to ingest: pass SYMBOLS or --file",
        )));
    }
    Ok(entities)
}

fn spawn_interrupt_listener(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, finishing in-flight entities");
                cancel.cancel();
            }
            Err(error) => warn!(%error, "could not listen for Ctrl-C"),
        }
    })
}
