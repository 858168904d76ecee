//! Port for reversible encryption of connection URLs at rest.

use thiserror::Error;

/// Seals and opens connection URLs.
///
/// Implementations are synchronous: the work is CPU-bound and small.
pub trait UrlCipher: Send + Sync {
    /// Encrypts `plaintext` into an opaque token.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::Seal`] when encryption fails.
    fn seal(&self, plaintext: &str) -> Result<Vec<u8>, CipherError>;

    /// Decrypts a token produced by [`UrlCipher::seal`].
    ///
    /// # Errors
    ///
    /// Returns [`CipherError`] when no key opens the token, the token is
    /// malformed, or the token has expired.
    fn open(&self, token: &[u8]) -> Result<String, CipherError>;
}

/// Errors raised by [`UrlCipher`] implementations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CipherError {
    /// No encryption key is configured.
    #[error("no encryption keys configured")]
    NoKeys,

    /// A configured key is not valid base64 or not 32 bytes long.
    #[error("encryption key {index} is invalid: {reason}")]
    InvalidKey {
        /// Position of the key in the configured list.
        index: usize,
        /// Why the key was rejected.
        reason: String,
    },

    /// Encryption failed.
    #[error("failed to seal connection url")]
    Seal,

    /// The token is truncated or its payload is unreadable.
    #[error("sealed connection url is malformed")]
    Malformed,

    /// None of the configured keys authenticates the token.
    #[error("sealed connection url could not be opened with any configured key")]
    Unauthenticated,

    /// The token is older than the configured lifetime.
    #[error("sealed connection url has expired")]
    Expired,
}
