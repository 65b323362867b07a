//! Logging configuration and initialization.
//!
//! Library code only emits `tracing` events and spans; binaries call
//! [`init_logging`] once at startup. Logs go to stderr so that report output on
//! stdout stays machine-readable.
//!
//! Environment variables:
//! - `FUNDFLOW_LOG_LEVEL`: `trace`, `debug`, `info`, `warn` or `error`
//! - `FUNDFLOW_LOG_FORMAT`: `text` or `json`
//! - `RUST_LOG`: full filter directives, takes precedence over the level

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub const LOG_LEVEL_ENV: &str = "FUNDFLOW_LOG_LEVEL";
pub const LOG_FORMAT_ENV: &str = "FUNDFLOW_LOG_FORMAT";
pub const LOG_FILTER_ENV: &str = "FUNDFLOW_LOG_FILTER";

/// Dependencies that are noisy at `debug`.
const QUIET_TARGETS: &str = "hyper=warn,hyper_util=warn,reqwest=warn,h2=warn,rustls=warn";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoggingError {
    #[error("invalid log level '{0}' (expected trace, debug, info, warn or error)")]
    InvalidLevel(String),

    #[error("invalid log format '{0}' (expected text or json)")]
    InvalidFormat(String),

    #[error("invalid log filter directives: {0}")]
    InvalidFilter(String),

    #[error("failed to install log subscriber: {0}")]
    Init(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Trace => Level::TRACE,
            Self::Debug => Level::DEBUG,
            Self::Info => Level::INFO,
            Self::Warn => Level::WARN,
            Self::Error => Level::ERROR,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl FromStr for LogLevel {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "trace" => Ok(Self::Trace),
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" | "warning" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(LoggingError::InvalidLevel(s.to_owned())),
        }
    }
}

impl Display for LogLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(LoggingError::InvalidFormat(s.to_owned())),
        }
    }
}

impl Display for LogFormat {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Json => f.write_str("json"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Extra directives appended to the level filter (e.g. `fundflow_core=debug`).
    pub filter_directives: Option<String>,
}

impl LogConfig {
    pub fn from_env() -> Result<Self, LoggingError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, LoggingError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(level) = lookup(LOG_LEVEL_ENV) {
            config.level = level.parse()?;
        }
        if let Some(format) = lookup(LOG_FORMAT_ENV) {
            config.format = format.parse()?;
        }
        config.filter_directives = lookup(LOG_FILTER_ENV)
            .map(|extra| extra.trim().to_owned())
            .filter(|extra| !extra.is_empty());
        Ok(config)
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Filter directives used when `RUST_LOG` is not set.
    pub fn directives(&self) -> String {
        let mut directives = format!("{},{QUIET_TARGETS}", self.level);
        if let Some(extra) = self.filter_directives.as_deref() {
            directives.push(',');
            directives.push_str(extra);
        }
        directives
    }
}

/// Installs the global subscriber. Call once per process.
pub fn init_logging(config: &LogConfig) -> Result<(), LoggingError> {
    let directives = match std::env::var("RUST_LOG") {
        Ok(value) if !value.trim().is_empty() => value,
        _ => config.directives(),
    };
    let filter =
        EnvFilter::try_new(&directives).map_err(|e| LoggingError::InvalidFilter(e.to_string()))?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = match config.format {
        LogFormat::Text => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_span_list(false),
            )
            .try_init(),
    };
    installed.map_err(|e| LoggingError::Init(e.to_string()))
}
