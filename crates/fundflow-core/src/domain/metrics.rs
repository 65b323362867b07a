use time::Date;
use uuid::Uuid;

use crate::{EntityId, UtcDateTime};

/// A converted metric value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricDatum {
    Number(f64),
    Date(Date),
}

/// One usable metric of a validated payload.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricValue {
    /// Canonical snake_case metric name (e.g. `pe_ratio`).
    pub name: &'static str,
    pub datum: MetricDatum,
}

/// Why a present field did not make it into the usable set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionReason {
    /// Recognizably-empty value such as `"None"` or `"-"`.
    Sentinel,
    /// The value could not be converted to the field's type.
    Unconvertible { value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedField {
    pub field: &'static str,
    pub reason: ExclusionReason,
}

/// Typed metric set that passed every validation check.
///
/// `values` is never empty and `values.len() + excluded.len() == metrics_fetched`.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedMetrics {
    pub entity_id: EntityId,
    pub as_of: UtcDateTime,
    pub metrics_fetched: usize,
    pub values: Vec<MetricValue>,
    pub excluded: Vec<ExcludedField>,
}

impl ValidatedMetrics {
    pub fn usable_count(&self) -> usize {
        self.values.len()
    }
}

/// Receipt returned by a store after a durable write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredMetrics {
    pub stored_count: usize,
    pub parent_record_id: Uuid,
}
