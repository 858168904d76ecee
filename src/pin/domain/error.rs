//! Error types for pin domain validation.

use thiserror::Error;

/// Errors returned while constructing pin domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PinDomainError {
    /// The name is not of the form `[a-z0-9-]+`.
    #[error("field name must be of the form [a-z0-9-]+, got '{0}'")]
    InvalidName(String),

    /// The query text is empty or only whitespace.
    #[error("field query must not be empty")]
    EmptyQuery,
}

impl PinDomainError {
    /// Returns the request field that failed validation.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::InvalidName(_) => "name",
            Self::EmptyQuery => "query",
        }
    }
}
