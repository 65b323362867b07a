use fundflow_warehouse::{RetryTrendRow, Warehouse};

use crate::cli::HistoryArgs;
use crate::error::CliError;

pub async fn run(args: &HistoryArgs, warehouse: Warehouse) -> Result<Vec<RetryTrendRow>, CliError> {
    let limit = args.limit;
    tokio::task::spawn_blocking(move || warehouse.retry_history(limit))
        .await
        .map_err(|e| CliError::Command(format!("history task failed: {e}")))?
        .map_err(CliError::from)
}
