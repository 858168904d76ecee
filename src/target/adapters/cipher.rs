//! AES-256-GCM implementation of [`UrlCipher`].
//!
//! A token is the 12-byte random nonce followed by the authenticated
//! ciphertext of a small JSON envelope holding the URL and the time it was
//! sealed. Sealing always uses the first configured key; opening tries every
//! key in order so that keys can be rotated without re-encrypting rows.

use crate::target::ports::{CipherError, UrlCipher};
use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, TimeDelta, Utc};
use mockable::Clock;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

#[derive(Serialize, Deserialize)]
struct Envelope {
    issued_at: DateTime<Utc>,
    url: String,
}

/// URL cipher backed by one or more AES-256-GCM keys.
pub struct AesGcmUrlCipher<C>
where
    C: Clock + Send + Sync,
{
    keys: Vec<Aes256Gcm>,
    ttl: TimeDelta,
    clock: Arc<C>,
}

impl<C> AesGcmUrlCipher<C>
where
    C: Clock + Send + Sync,
{
    /// Builds a cipher from raw 32-byte keys.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::NoKeys`] for an empty key list and
    /// [`CipherError::InvalidKey`] for a key of the wrong length.
    pub fn new(keys: &[Vec<u8>], ttl: TimeDelta, clock: Arc<C>) -> Result<Self, CipherError> {
        if keys.is_empty() {
            return Err(CipherError::NoKeys);
        }
        let ciphers = keys
            .iter()
            .enumerate()
            .map(|(index, key)| {
                if key.len() != KEY_LEN {
                    return Err(CipherError::InvalidKey {
                        index,
                        reason: format!("expected {KEY_LEN} bytes, got {}", key.len()),
                    });
                }
                Aes256Gcm::new_from_slice(key).map_err(|err| CipherError::InvalidKey {
                    index,
                    reason: err.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            keys: ciphers,
            ttl,
            clock,
        })
    }

    /// Builds a cipher from base64-encoded keys as they appear in configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::InvalidKey`] when a key is not valid base64 or
    /// does not decode to 32 bytes.
    pub fn from_base64_keys<S>(keys: &[S], ttl: TimeDelta, clock: Arc<C>) -> Result<Self, CipherError>
    where
        S: AsRef<str>,
    {
        let decoded = keys
            .iter()
            .enumerate()
            .map(|(index, key)| {
                STANDARD
                    .decode(key.as_ref().trim())
                    .map_err(|err| CipherError::InvalidKey {
                        index,
                        reason: err.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(&decoded, ttl, clock)
    }
}

impl<C> UrlCipher for AesGcmUrlCipher<C>
where
    C: Clock + Send + Sync,
{
    fn seal(&self, plaintext: &str) -> Result<Vec<u8>, CipherError> {
        let key = self.keys.first().ok_or(CipherError::NoKeys)?;
        let envelope = Envelope {
            issued_at: self.clock.utc(),
            url: plaintext.to_owned(),
        };
        let payload = serde_json::to_vec(&envelope).map_err(|_| CipherError::Seal)?;

        let mut nonce_bytes = [0_u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let ciphertext = key
            .encrypt(Nonce::from_slice(&nonce_bytes), payload.as_slice())
            .map_err(|_| CipherError::Seal)?;

        let mut token = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        token.extend_from_slice(&nonce_bytes);
        token.extend_from_slice(&ciphertext);
        Ok(token)
    }

    fn open(&self, token: &[u8]) -> Result<String, CipherError> {
        let (nonce, ciphertext) = token
            .split_at_checked(NONCE_LEN)
            .ok_or(CipherError::Malformed)?;
        let payload = self
            .keys
            .iter()
            .find_map(|key| key.decrypt(Nonce::from_slice(nonce), ciphertext).ok())
            .ok_or(CipherError::Unauthenticated)?;
        let envelope: Envelope =
            serde_json::from_slice(&payload).map_err(|_| CipherError::Malformed)?;

        if self.clock.utc() - envelope.issued_at > self.ttl {
            return Err(CipherError::Expired);
        }
        Ok(envelope.url)
    }
}
