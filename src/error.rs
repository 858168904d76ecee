//! Error classification shared by the target and pin registries.
//!
//! Registry errors are returned synchronously to callers such as an HTTP
//! layer. Each error maps to an [`ErrorKind`] that decides how the failure is
//! surfaced, and to a stable machine-readable reason code.

use std::fmt;

/// Coarse classification of a registry failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The caller supplied a malformed name, URL, or query.
    Validation,
    /// The referenced entity does not exist or has been deleted.
    NotFound,
    /// Duplicate name, blocked deletion, or stale version.
    Conflict,
    /// Storage, encryption, or other internal fault.
    System,
}

impl ErrorKind {
    /// Returns whether the failure is attributable to the caller.
    #[must_use]
    pub const fn is_user_facing(self) -> bool {
        !matches!(self, Self::System)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Validation => "validation",
            Self::NotFound => "not-found",
            Self::Conflict => "conflict",
            Self::System => "system",
        };
        f.write_str(label)
    }
}

/// Reason codes reported alongside registry errors.
pub mod codes {
    /// A field failed shape validation.
    pub const INVALID: &str = "invalid";
    /// No live target matched the identifier.
    pub const DB_NOT_FOUND: &str = "db-not-found";
    /// No live pin matched the identifier.
    pub const PIN_NOT_FOUND: &str = "pin-not-found";
    /// Another live target already uses the name.
    pub const DUPLICATE_DB_NAME: &str = "duplicate-db-name";
    /// Another live pin already uses the name.
    pub const DUPLICATE_PIN_NAME: &str = "duplicate-pin-name";
    /// The target is still referenced by live pins.
    pub const REMOVING_DB_WITH_PINS: &str = "removing-db-with-pins";
    /// The target was updated from a stale version.
    pub const DB_CONCURRENT_UPDATE: &str = "db-concurrent-update";
    /// The pin was updated from a stale version.
    pub const PIN_CONCURRENT_UPDATE: &str = "pin-concurrent-update";
    /// Internal failure not attributable to the caller.
    pub const INTERNAL: &str = "internal";
}

/// Common accessors for errors returned by registry operations.
pub trait RegistryFailure {
    /// Returns the failure classification.
    fn kind(&self) -> ErrorKind;

    /// Returns the machine-readable reason code.
    fn code(&self) -> &'static str;

    /// Returns the offending field for validation failures.
    fn field(&self) -> Option<&'static str> {
        None
    }
}
