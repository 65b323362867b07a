//! # Domain Models
//!
//! | Type | Description |
//! |------|-------------|
//! | [`EntityId`] | Normalized ticker/entity identifier |
//! | [`UtcDateTime`] | UTC timestamp |
//! | [`ValidatedMetrics`] | Typed metric set ready to persist |
//! | [`StoredMetrics`] | Receipt of a durable write |

mod entity;
mod metrics;
mod timestamp;

pub use entity::EntityId;
pub use metrics::{
    ExcludedField, ExclusionReason, MetricDatum, MetricValue, StoredMetrics, ValidatedMetrics,
};
pub use timestamp::UtcDateTime;
