use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::ValidationError;

const MAX_ENTITY_ID_LEN: usize = 32;

/// Normalized identifier of the unit of ingestion (a ticker symbol).
///
/// Identifiers are opaque to the pipeline; parsing only trims, upper-cases and
/// rejects values that could not be a key (empty, whitespace or control
/// characters inside, overly long).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

impl EntityId {
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyEntityId);
        }

        let len = trimmed.chars().count();
        if len > MAX_ENTITY_ID_LEN {
            return Err(ValidationError::EntityIdTooLong {
                len,
                max: MAX_ENTITY_ID_LEN,
            });
        }

        if let Some((index, ch)) = trimmed
            .chars()
            .enumerate()
            .find(|(_, ch)| ch.is_whitespace() || ch.is_control())
        {
            return Err(ValidationError::EntityIdInvalidChar { ch, index });
        }

        Ok(Self(trimmed.to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Case-insensitive comparison against an identifier echoed by an upstream API.
    pub fn matches(&self, reported: &str) -> bool {
        self.0 == reported.trim().to_uppercase()
    }
}

impl Display for EntityId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for EntityId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl TryFrom<&str> for EntityId {
    type Error = ValidationError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<EntityId> for String {
    fn from(value: EntityId) -> Self {
        value.0
    }
}
