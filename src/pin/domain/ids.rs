//! Identifier and validated scalar types for pins.

use super::PinDomainError;
use crate::slug::is_slug;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PinId(Uuid);

impl PinId {
    /// Creates a new random pin identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a pin identifier from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parses an identifier when `value` is syntactically a UUID.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value).ok().map(Self)
    }

    /// Returns the wrapped UUID.
    #[must_use]
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for PinId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PinId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pin name in slug form, unique among live pins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PinName(String);

impl PinName {
    /// Creates a validated pin name.
    ///
    /// # Errors
    ///
    /// Returns [`PinDomainError::InvalidName`] when the value is not a slug.
    pub fn new(value: impl Into<String>) -> Result<Self, PinDomainError> {
        let raw = value.into();
        if !is_slug(&raw) {
            return Err(PinDomainError::InvalidName(raw));
        }
        Ok(Self(raw))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PinName {
    type Error = PinDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PinName> for String {
    fn from(value: PinName) -> Self {
        value.0
    }
}

impl fmt::Display for PinName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// SQL text of a pin, passed verbatim to the target database.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PinQuery(String);

impl PinQuery {
    /// Creates a query, rejecting text with no non-whitespace character.
    ///
    /// The text is stored untrimmed.
    ///
    /// # Errors
    ///
    /// Returns [`PinDomainError::EmptyQuery`] for blank text.
    pub fn new(value: impl Into<String>) -> Result<Self, PinDomainError> {
        let raw = value.into();
        if raw.trim().is_empty() {
            return Err(PinDomainError::EmptyQuery);
        }
        Ok(Self(raw))
    }

    /// Returns the query text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for PinQuery {
    type Error = PinDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<PinQuery> for String {
    fn from(value: PinQuery) -> Self {
        value.0
    }
}
