//! Collaborator contracts consumed by the ingestion core.
//!
//! | Trait | Description |
//! |-------|-------------|
//! | [`MetricsSource`] | Fetches the raw payload for one entity |
//! | [`MetricsStore`] | Durably persists a validated metric set |
//! | [`EntityCatalog`] | Supplies the entities to ingest |
//! | [`RunLog`] | Append-only log of finished runs |
//!
//! All traits return boxed futures and must be `Send + Sync`, since one
//! instance is shared across every in-flight worker of a run.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use thiserror::Error;

use crate::result::RunSummary;
use crate::payload::RawPayload;
use crate::{EntityId, StoredMetrics, ValidatedMetrics, ValidationError};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Transport-level failure kind reported by a [`MetricsSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Timeout,
    Connect,
    /// Upstream throttling notice or quota exhaustion.
    RateLimited,
    /// Non-success HTTP status.
    Status(u16),
    /// No structured kind available; only the message is known.
    Other,
}

impl FetchErrorKind {
    pub const fn code(self) -> &'static str {
        match self {
            Self::Timeout => "fetch.timeout",
            Self::Connect => "fetch.connect",
            Self::RateLimited => "fetch.rate_limited",
            Self::Status(_) => "fetch.status",
            Self::Other => "fetch.other",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{message} ({})", .kind.code())]
pub struct FetchError {
    kind: FetchErrorKind,
    message: String,
}

impl FetchError {
    pub fn new(kind: FetchErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Timeout, message)
    }

    pub fn connect(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Connect, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::RateLimited, message)
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Status(status), message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(FetchErrorKind::Other, message)
    }

    pub const fn kind(&self) -> FetchErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store reported zero rows written for entity {entity}")]
    NothingStored { entity: EntityId },

    #[error("storage backend failed: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read entity list '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid entity identifier on line {line}: {source}")]
    InvalidEntity {
        line: usize,
        #[source]
        source: ValidationError,
    },

    #[error("entity catalog unavailable: {0}")]
    Unavailable(String),
}

/// Fetches raw metric payloads from an external data API.
pub trait MetricsSource: Send + Sync {
    /// Short source label recorded next to persisted metrics.
    fn source_name(&self) -> &'static str;

    fn fetch_entity_metrics<'a>(
        &'a self,
        entity_id: &'a EntityId,
    ) -> BoxFuture<'a, Result<RawPayload, FetchError>>;
}

/// Receives validated metric sets.
///
/// A store that reports `stored_count == 0` is treated as a failed write.
pub trait MetricsStore: Send + Sync {
    fn persist_metrics<'a>(
        &'a self,
        source: &'a str,
        metrics: &'a ValidatedMetrics,
    ) -> BoxFuture<'a, Result<StoredMetrics, StoreError>>;
}

pub trait EntityCatalog: Send + Sync {
    fn list_entities_to_ingest(&self) -> BoxFuture<'_, Result<Vec<EntityId>, CatalogError>>;
}

/// Append-only record of finished runs.
pub trait RunLog: Send + Sync {
    fn append_run<'a>(&'a self, summary: &'a RunSummary) -> BoxFuture<'a, Result<(), StoreError>>;
}
