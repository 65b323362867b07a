mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use fundflow_core::logging::{init_logging, LogConfig};
use std::process::ExitCode;

use crate::cli::Cli;
use crate::error::CliError;

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();

    let mut log_config = LogConfig::from_env()?;
    if let Some(level) = cli.log_level {
        log_config = log_config.with_level(level.into());
    }
    if let Some(format) = cli.log_format {
        log_config = log_config.with_format(format.into());
    }
    init_logging(&log_config)?;

    let mut output = commands::run(&cli).await?;
    output::render(&output, cli.format, cli.pretty)?;

    if let Some(error) = output.take_run_log_error() {
        return Err(CliError::Store(error));
    }

    if !output.is_clean() {
        return Ok(ExitCode::from(3));
    }

    Ok(ExitCode::SUCCESS)
}
