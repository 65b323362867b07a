use thiserror::Error;

/// Validation errors raised by domain constructors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("entity identifier cannot be empty")]
    EmptyEntityId,
    #[error("entity identifier length {len} exceeds max {max}")]
    EntityIdTooLong { len: usize, max: usize },
    #[error("entity identifier contains invalid character {ch:?} at index {index}")]
    EntityIdInvalidChar { ch: char, index: usize },

    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },
}

/// Invalid configuration value read from the environment or flags.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} must be a positive integer, got '{value}'")]
    NotPositive { name: &'static str, value: String },

    #[error("{name} must not be empty")]
    Empty { name: &'static str },

    #[error("{name} is required but not set")]
    Missing { name: &'static str },

    #[error("{name} must be {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
}
