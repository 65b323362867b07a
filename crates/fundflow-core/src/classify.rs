//! Error taxonomy.
//!
//! Every failure an attempt can produce is an [`IngestError`]. The pure
//! [`classify`] function maps it to exactly one [`ErrorCategory`] and decides
//! whether another attempt is allowed. Only infrastructure-transient categories
//! (network and timeout) are retryable.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::source::{FetchError, FetchErrorKind, StoreError};
use crate::validate::PayloadRejection;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    NetworkError,
    TimeoutError,
    DataQualityError,
    ConversionError,
    ApiFormatError,
    DataValidationError,
    NoData,
    DatabaseError,
    UnexpectedError,
}

impl ErrorCategory {
    pub const ALL: [Self; 9] = [
        Self::NetworkError,
        Self::TimeoutError,
        Self::DataQualityError,
        Self::ConversionError,
        Self::ApiFormatError,
        Self::DataValidationError,
        Self::NoData,
        Self::DatabaseError,
        Self::UnexpectedError,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NetworkError => "network_error",
            Self::TimeoutError => "timeout_error",
            Self::DataQualityError => "data_quality_error",
            Self::ConversionError => "conversion_error",
            Self::ApiFormatError => "api_format_error",
            Self::DataValidationError => "data_validation_error",
            Self::NoData => "no_data",
            Self::DatabaseError => "database_error",
            Self::UnexpectedError => "unexpected_error",
        }
    }

    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::NetworkError | Self::TimeoutError)
    }
}

impl Display for ErrorCategory {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict of the classifier for one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub category: ErrorCategory,
    pub retryable: bool,
}

impl From<ErrorCategory> for Classification {
    fn from(category: ErrorCategory) -> Self {
        Self {
            category,
            retryable: category.is_retryable(),
        }
    }
}

/// Any failure of a single fetch, validate and persist attempt.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IngestError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Rejected(#[from] PayloadRejection),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{0}")]
    Unexpected(String),
}

pub fn classify(error: &IngestError) -> Classification {
    let category = match error {
        IngestError::Fetch(fetch) => fetch_category(fetch),
        IngestError::Rejected(rejection) => rejection_category(rejection),
        IngestError::Store(_) => ErrorCategory::DatabaseError,
        IngestError::Unexpected(_) => ErrorCategory::UnexpectedError,
    };
    Classification::from(category)
}

fn fetch_category(error: &FetchError) -> ErrorCategory {
    match error.kind() {
        FetchErrorKind::Timeout => ErrorCategory::TimeoutError,
        FetchErrorKind::Connect | FetchErrorKind::RateLimited => ErrorCategory::NetworkError,
        FetchErrorKind::Status(408) => ErrorCategory::TimeoutError,
        FetchErrorKind::Status(429 | 500..=599) => ErrorCategory::NetworkError,
        FetchErrorKind::Status(_) => ErrorCategory::ApiFormatError,
        FetchErrorKind::Other => category_from_message(error.message()),
    }
}

const TIMEOUT_MARKERS: &[&str] = &["timeout", "timed out", "deadline"];
const NETWORK_MARKERS: &[&str] = &[
    "connection",
    "connect",
    "dns",
    "resolve",
    "reset",
    "refused",
    "unreachable",
    "broken pipe",
];

/// Fallback for opaque transport errors that only carry text.
fn category_from_message(message: &str) -> ErrorCategory {
    let lowered = message.to_ascii_lowercase();
    if TIMEOUT_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        ErrorCategory::TimeoutError
    } else if NETWORK_MARKERS.iter().any(|marker| lowered.contains(marker)) {
        ErrorCategory::NetworkError
    } else {
        ErrorCategory::UnexpectedError
    }
}

fn rejection_category(rejection: &PayloadRejection) -> ErrorCategory {
    match rejection {
        PayloadRejection::Missing
        | PayloadRejection::Malformed { .. }
        | PayloadRejection::NotAnObject { .. }
        | PayloadRejection::MissingIdentity { .. } => ErrorCategory::ApiFormatError,
        PayloadRejection::IdentityMismatch { .. } => ErrorCategory::DataValidationError,
        PayloadRejection::NoMetricFields => ErrorCategory::NoData,
        PayloadRejection::Unconvertible { .. } => ErrorCategory::ConversionError,
        PayloadRejection::AllSentinels { .. } => ErrorCategory::DataQualityError,
    }
}

/// Classifier seam consumed by the retry controller.
pub trait Classify<E: ?Sized> {
    fn classify(&self, error: &E) -> Classification;
}

/// The fixed taxonomy above.
#[derive(Debug, Clone, Copy, Default)]
pub struct TaxonomyClassifier;

impl Classify<IngestError> for TaxonomyClassifier {
    fn classify(&self, error: &IngestError) -> Classification {
        classify(error)
    }
}
