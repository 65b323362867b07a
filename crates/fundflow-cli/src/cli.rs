//! CLI argument definitions for fundflow.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `ingest` | Run the ingestion pipeline over a list of entities |
//! | `history` | Show the per-run retry trend from the run log |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--format` | `table` | Output format (table, json) |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--log-level` | env or `info` | Log verbosity |
//! | `--log-format` | env or `text` | Log line format (text, json) |
//! | `--db-path` | `$FUNDFLOW_HOME/warehouse.duckdb` | Warehouse database file |
//!
//! # Examples
//!
//! ```bash
//! # Ingest three symbols against Alpha Vantage
//! fundflow ingest IBM MSFT AAPL
//!
//! # Offline run over a watchlist file, JSON report
//! fundflow ingest --file watchlist.txt --mock --format json --pretty
//!
//! # Retry trend of the last 20 runs
//! fundflow history --limit 20
//! ```

use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use fundflow_core::logging::{LogFormat, LogLevel};

/// fundflow - resilient financial metric ingestion
///
/// Fetches company overview metrics per entity, retries transient failures
/// with exponential backoff, stores validated metrics in a local DuckDB
/// warehouse and reports what happened to every entity.
#[derive(Debug, Parser)]
#[command(
    name = "fundflow",
    author,
    version,
    about = "Resilient per-entity financial metric ingestion",
    long_about = "fundflow ingests company overview metrics one entity at a time. \
Transient failures (network, timeout) are retried with exponential backoff; \
every other failure is classified and reported without retry.\n\
\n\
Use 'fundflow <command> --help' for command-specific help."
)]
pub struct Cli {
    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    pub format: OutputFormat,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Log verbosity. Overrides FUNDFLOW_LOG_LEVEL; RUST_LOG still wins.
    #[arg(long, global = true, value_enum)]
    pub log_level: Option<LogLevelArg>,

    /// Log line format. Overrides FUNDFLOW_LOG_FORMAT.
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormatArg>,

    /// Warehouse database file.
    #[arg(long, global = true)]
    pub db_path: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable report.
    Table,
    /// Single JSON object.
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevelArg {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevelArg> for LogLevel {
    fn from(value: LogLevelArg) -> Self {
        match value {
            LogLevelArg::Trace => Self::Trace,
            LogLevelArg::Debug => Self::Debug,
            LogLevelArg::Info => Self::Info,
            LogLevelArg::Warn => Self::Warn,
            LogLevelArg::Error => Self::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(value: LogFormatArg) -> Self {
        match value {
            LogFormatArg::Text => Self::Text,
            LogFormatArg::Json => Self::Json,
        }
    }
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Ingest overview metrics for a list of entities.
    ///
    /// Entities come from positional SYMBOLS, a --file, or both (file
    /// entries first). Ctrl-C stops scheduling new entities; in-flight
    /// entities finish and the rest are reported as not attempted.
    ///
    /// # Examples
    ///
    ///   fundflow ingest IBM MSFT
    ///   fundflow ingest --file watchlist.txt --concurrency 2
    ///   fundflow ingest AAPL --mock --format json
    Ingest(IngestArgs),

    /// Show the per-run retry trend recorded in the run log.
    ///
    /// # Examples
    ///
    ///   fundflow history
    ///   fundflow history --limit 5 --format json
    History(HistoryArgs),
}

/// Arguments for the `ingest` command.
#[derive(Debug, Args)]
pub struct IngestArgs {
    /// Entity identifiers (e.g., IBM, MSFT).
    pub symbols: Vec<String>,

    /// Newline-separated entity file; `#` starts a comment.
    #[arg(long)]
    pub file: Option<PathBuf>,

    /// Entities processed at once. Overrides FUNDFLOW_CONCURRENCY.
    #[arg(long)]
    pub concurrency: Option<NonZeroUsize>,

    /// Cancel the run after this many seconds.
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    pub deadline_secs: Option<u64>,

    /// Use the offline fixture source instead of Alpha Vantage.
    #[arg(long, default_value_t = false)]
    pub mock: bool,
}

/// Arguments for the `history` command.
#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Number of most recent runs to show.
    #[arg(long, default_value_t = 10)]
    pub limit: usize,
}
