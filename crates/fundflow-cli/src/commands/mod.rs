mod history;
mod ingest;

use fundflow_core::{RunSummary, StoreError};
use fundflow_warehouse::{RetryTrendRow, Warehouse, WarehouseConfig};

use crate::cli::{Cli, Command};
use crate::error::CliError;

/// What a command produced, rendered by [`crate::output`].
#[derive(Debug)]
pub enum CommandOutput {
    Run {
        summary: RunSummary,
        run_log_error: Option<StoreError>,
    },
    History(Vec<RetryTrendRow>),
}

impl CommandOutput {
    /// A run that left any entity failed or not attempted exits with 3.
    pub fn is_clean(&self) -> bool {
        match self {
            Self::Run { summary, .. } => summary.is_clean(),
            Self::History(_) => true,
        }
    }

    /// Run log failure to surface once the report has been printed.
    pub fn take_run_log_error(&mut self) -> Option<StoreError> {
        match self {
            Self::Run { run_log_error, .. } => run_log_error.take(),
            Self::History(_) => None,
        }
    }
}

pub async fn run(cli: &Cli) -> Result<CommandOutput, CliError> {
    let warehouse = open_warehouse(cli).await?;
    match &cli.command {
        Command::Ingest(args) => {
            let outcome = ingest::run(args, warehouse).await?;
            Ok(CommandOutput::Run {
                summary: outcome.summary,
                run_log_error: outcome.run_log_error,
            })
        }
        Command::History(args) => history::run(args, warehouse)
            .await
            .map(CommandOutput::History),
    }
}

async fn open_warehouse(cli: &Cli) -> Result<Warehouse, CliError> {
    let config = match &cli.db_path {
        Some(path) => WarehouseConfig::with_db_path(path),
        None => WarehouseConfig::default(),
    };
    tokio::task::spawn_blocking(move || Warehouse::open(config))
        .await
        .map_err(|e| CliError::Command(format!("warehouse open task failed: {e}")))?
        .map_err(CliError::from)
}
