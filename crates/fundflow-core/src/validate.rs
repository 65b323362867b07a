//! Response validation.
//!
//! [`validate_payload`] is pure: the same payload, entity and schema always
//! produce the same verdict. Checks run in a fixed order and the first failing
//! check decides the rejection:
//!
//! 1. the payload is an object carrying the identity field as a string
//! 2. the identity matches the requested entity
//! 3. at least one metric field is present, and at least one converts
//! 4. at least one present field holds a real value rather than a sentinel

use serde_json::{Map, Value};
use thiserror::Error;
use time::format_description::well_known::Iso8601;
use time::Date;

use crate::payload::{is_empty_sentinel, FieldKind, FieldSpec, PayloadSchema, RawPayload};
use crate::{
    EntityId, ExcludedField, ExclusionReason, MetricDatum, MetricValue, UtcDateTime,
    ValidatedMetrics,
};

/// Why a fetched payload cannot be used.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PayloadRejection {
    #[error("response body is empty")]
    Missing,

    #[error("response body is not JSON: {reason}")]
    Malformed { reason: String },

    #[error("expected a JSON object, got {json_type}")]
    NotAnObject { json_type: &'static str },

    #[error("payload has no string '{field}' identity field")]
    MissingIdentity { field: &'static str },

    #[error("payload identifies '{reported}' but '{requested}' was requested")]
    IdentityMismatch { requested: EntityId, reported: String },

    #[error("payload contains none of the expected metric fields")]
    NoMetricFields,

    #[error("field '{field}' value '{value}' cannot be converted to {target}")]
    Unconvertible {
        field: &'static str,
        value: String,
        target: &'static str,
        fetched: usize,
    },

    #[error("all {fetched} metric fields hold empty values")]
    AllSentinels { fetched: usize },
}

impl PayloadRejection {
    /// Number of schema fields the payload carried when it was rejected.
    pub fn metrics_fetched(&self) -> usize {
        match self {
            Self::Unconvertible { fetched, .. } | Self::AllSentinels { fetched } => *fetched,
            _ => 0,
        }
    }
}

pub fn validate_payload(
    payload: &RawPayload,
    requested: &EntityId,
    schema: &PayloadSchema,
    as_of: UtcDateTime,
) -> Result<ValidatedMetrics, PayloadRejection> {
    let object = match payload {
        RawPayload::Object(object) => object,
        RawPayload::Missing => return Err(PayloadRejection::Missing),
        RawPayload::Malformed { reason } => {
            return Err(PayloadRejection::Malformed {
                reason: reason.clone(),
            })
        }
        RawPayload::Unexpected { json_type } => {
            return Err(PayloadRejection::NotAnObject {
                json_type: *json_type,
            })
        }
    };

    let reported = object
        .get(schema.identity_key)
        .and_then(Value::as_str)
        .ok_or(PayloadRejection::MissingIdentity {
            field: schema.identity_key,
        })?;
    if !requested.matches(reported) {
        return Err(PayloadRejection::IdentityMismatch {
            requested: requested.clone(),
            reported: reported.to_owned(),
        });
    }

    let present = present_fields(object, schema);
    let fetched = present.len();
    if fetched == 0 {
        return Err(PayloadRejection::NoMetricFields);
    }

    let mut values = Vec::with_capacity(fetched);
    let mut excluded = Vec::new();
    let mut first_failure: Option<(&FieldSpec, String)> = None;

    for (spec, raw) in present {
        if is_empty_sentinel(raw) {
            excluded.push(ExcludedField {
                field: spec.key,
                reason: ExclusionReason::Sentinel,
            });
            continue;
        }

        match convert(spec.kind, raw) {
            Some(datum) => values.push(MetricValue {
                name: spec.metric,
                datum,
            }),
            None => {
                let value = display_value(raw);
                if first_failure.is_none() {
                    first_failure = Some((spec, value.clone()));
                }
                excluded.push(ExcludedField {
                    field: spec.key,
                    reason: ExclusionReason::Unconvertible { value },
                });
            }
        }
    }

    if values.is_empty() {
        return Err(match first_failure {
            Some((spec, value)) => PayloadRejection::Unconvertible {
                field: spec.key,
                value,
                target: kind_label(spec.kind),
                fetched,
            },
            None => PayloadRejection::AllSentinels { fetched },
        });
    }

    Ok(ValidatedMetrics {
        entity_id: requested.clone(),
        as_of,
        metrics_fetched: fetched,
        values,
        excluded,
    })
}

fn present_fields<'p>(
    object: &'p Map<String, Value>,
    schema: &PayloadSchema,
) -> Vec<(&'static FieldSpec, &'p Value)> {
    schema
        .fields
        .iter()
        .filter_map(|spec| object.get(spec.key).map(|value| (spec, value)))
        .collect()
}

fn convert(kind: FieldKind, raw: &Value) -> Option<MetricDatum> {
    match kind {
        FieldKind::Number => {
            let number = match raw {
                Value::Number(number) => number.as_f64()?,
                Value::String(text) => text.trim().parse::<f64>().ok()?,
                _ => return None,
            };
            number.is_finite().then_some(MetricDatum::Number(number))
        }
        FieldKind::Date => {
            let text = raw.as_str()?;
            Date::parse(text.trim(), &Iso8601::DATE)
                .ok()
                .map(MetricDatum::Date)
        }
    }
}

fn display_value(raw: &Value) -> String {
    match raw {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

const fn kind_label(kind: FieldKind) -> &'static str {
    match kind {
        FieldKind::Number => "a finite number",
        FieldKind::Date => "an ISO 8601 date",
    }
}
