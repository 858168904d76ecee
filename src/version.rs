//! Record versions used for optimistic locking.
//!
//! Every persisted target and pin carries a [`Version`]. Writers submit the
//! version they last read; stores apply the write only when the stored
//! version still matches, then advance it by exactly one.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Monotonic record version, starting at one for a freshly created record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Version(u64);

/// Error returned when a persisted version is outside the valid range.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid record version: {0}")]
pub struct InvalidVersionError(pub i64);

impl Version {
    /// Version assigned to a record on creation.
    pub const INITIAL: Self = Self(1);

    /// Creates a version from a raw value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the version that follows this one.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Converts the version into its storage representation.
    ///
    /// # Errors
    ///
    /// Returns [`std::num::TryFromIntError`] when the value exceeds `i64::MAX`.
    pub fn to_storage(self) -> Result<i64, std::num::TryFromIntError> {
        i64::try_from(self.0)
    }

    /// Reconstructs a version from its storage representation.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidVersionError`] for zero or negative values.
    pub fn from_storage(value: i64) -> Result<Self, InvalidVersionError> {
        match u64::try_from(value) {
            Ok(raw) if raw > 0 => Ok(Self(raw)),
            _ => Err(InvalidVersionError(value)),
        }
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::{InvalidVersionError, Version};
    use rstest::rstest;

    #[rstest]
    fn next_advances_by_one() {
        assert_eq!(Version::INITIAL.next(), Version::new(2));
    }

    #[rstest]
    #[case(0)]
    #[case(-4)]
    fn from_storage_rejects_non_positive_values(#[case] raw: i64) {
        assert_eq!(Version::from_storage(raw), Err(InvalidVersionError(raw)));
    }

    #[rstest]
    fn storage_conversion_preserves_value() {
        let version = Version::new(42);
        let stored = version.to_storage().expect("fits in i64");
        assert_eq!(Version::from_storage(stored), Ok(version));
    }
}
