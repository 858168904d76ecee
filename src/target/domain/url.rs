//! Validated connection URL for a target database.

use super::TargetDomainError;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

const ACCEPTED_SCHEMES: [&str; 2] = ["postgres", "postgresql"];
const REDACTED_PASSWORD: &str = "redacted";

/// Connection URL of a target database.
///
/// The URL usually carries credentials, so the `Debug` representation masks
/// the password and there is no `Display` implementation.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetUrl(String);

impl TargetUrl {
    /// Creates a validated connection URL.
    ///
    /// # Errors
    ///
    /// Returns [`TargetDomainError::InvalidUrl`] when the value does not parse
    /// as a URL or its scheme is not `postgres`/`postgresql`.
    pub fn new(value: impl Into<String>) -> Result<Self, TargetDomainError> {
        let raw = value.into();
        let parsed = Url::parse(&raw).map_err(|_| TargetDomainError::InvalidUrl)?;
        if !ACCEPTED_SCHEMES.contains(&parsed.scheme()) {
            return Err(TargetDomainError::InvalidUrl);
        }
        Ok(Self(raw))
    }

    /// Returns the full URL, credentials included.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns the URL with any password replaced by a placeholder.
    #[must_use]
    pub fn redacted(&self) -> String {
        Url::parse(&self.0).map_or_else(
            |_| String::from(REDACTED_PASSWORD),
            |mut parsed| {
                if parsed.password().is_some()
                    && parsed.set_password(Some(REDACTED_PASSWORD)).is_err()
                {
                    return String::from(REDACTED_PASSWORD);
                }
                parsed.into()
            },
        )
    }
}

impl fmt::Debug for TargetUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TargetUrl").field(&self.redacted()).finish()
    }
}

impl TryFrom<String> for TargetUrl {
    type Error = TargetDomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TargetUrl> for String {
    fn from(value: TargetUrl) -> Self {
        value.0
    }
}
