//! # Fundflow Core
//!
//! Resilient per-entity ingestion of financial metrics from a rate-limited,
//! unreliable upstream API.
//!
//! ## Pipeline
//!
//! | Component | Module | Role |
//! |-----------|--------|------|
//! | Error classifier | [`classify`] | Maps every failure to one category and a retry decision |
//! | Response validator | [`validate`] | Checks shape, identity and content of a payload |
//! | Retry controller | [`retry`] | Bounded exponential backoff around one attempt |
//! | Ingestion worker | [`worker`] | Fetch, validate, persist for one entity |
//! | Run aggregator | [`aggregator`] | Bounded-concurrency run producing a [`RunSummary`] |
//! | Reporting | [`report`] | Text and JSON projections of a summary |
//!
//! ## Collaborators
//!
//! The core talks to the outside world only through the traits in [`source`]:
//! [`MetricsSource`], [`MetricsStore`], [`EntityCatalog`] and [`RunLog`].
//! [`adapters`] provides the Alpha Vantage and offline fixture sources,
//! [`catalog`] the static and file-based catalogs, and the `DuckDB`
//! [`Warehouse`](fundflow_warehouse::Warehouse) implements both storage traits.

pub mod adapters;
pub mod aggregator;
pub mod catalog;
pub mod classify;
pub mod config;
pub mod domain;
pub mod error;
pub mod http_client;
pub mod logging;
pub mod payload;
pub mod report;
pub mod result;
pub mod retry;
pub mod source;
pub mod store;
pub mod throttling;
pub mod validate;
pub mod worker;

pub use aggregator::{CategoryTally, RunAggregator, RunError, DEFAULT_CONCURRENCY};
pub use classify::{classify, Classification, Classify, ErrorCategory, IngestError, TaxonomyClassifier};
pub use config::{IngestConfig, RateLimit};
pub use domain::*;
pub use error::{ConfigError, ValidationError};
pub use payload::{PayloadSchema, RawPayload};
pub use report::{render_text, RunReport};
pub use result::{IngestionResult, Outcome, RunSummary, Stage, NOT_ATTEMPTED_MESSAGE};
pub use retry::{RetryController, RetryOutcome, RetryPolicy};
pub use source::{
    BoxFuture, CatalogError, EntityCatalog, FetchError, FetchErrorKind, MetricsSource,
    MetricsStore, RunLog, StoreError,
};
pub use throttling::RateGate;
pub use validate::{validate_payload, PayloadRejection};
pub use worker::{AttemptFailure, IngestionWorker};
