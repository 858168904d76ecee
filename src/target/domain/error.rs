//! Error types for target domain validation.

use thiserror::Error;

/// Errors returned while constructing target domain values.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TargetDomainError {
    /// The name is not of the form `[a-z0-9-]+`.
    #[error("field name must be of the form [a-z0-9-]+, got '{0}'")]
    InvalidName(String),

    /// The connection URL does not parse or does not use the `postgres` scheme.
    #[error("field url must be a valid postgres:// URL")]
    InvalidUrl,
}

impl TargetDomainError {
    /// Returns the request field that failed validation.
    #[must_use]
    pub const fn field(&self) -> &'static str {
        match self {
            Self::InvalidName(_) => "name",
            Self::InvalidUrl => "url",
        }
    }
}
