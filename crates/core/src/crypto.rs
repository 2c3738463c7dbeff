//! Encryption-at-rest envelopes.
//!
//! Values are sealed with AES-256-GCM under a per-installation key. A sealed
//! value is stored as an [`Envelope`]: base64 ciphertext (tag included),
//! base64 IV, and the time it was sealed.

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, Utc};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::Error;

const KEY_SIZE: usize = 32;
const NONCE_SIZE: usize = 12;

/// Serialized form of an encrypted value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Envelope {
    pub ciphertext: String,
    pub iv: String,
    pub timestamp: DateTime<Utc>,
}

impl Envelope {
    /// Recognize a stored string as an envelope.
    ///
    /// Returns None for anything that is not exactly an envelope object, so
    /// plaintext JSON payloads never match.
    pub fn parse(raw: &str) -> Option<Self> {
        serde_json::from_str(raw).ok()
    }

    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Symmetric authenticated cipher bound to one installation key.
pub struct Cipher {
    aead: Aes256Gcm,
    key: [u8; KEY_SIZE],
}

impl Cipher {
    /// Create a cipher with a fresh random key.
    pub fn generate() -> Self {
        let mut key = [0u8; KEY_SIZE];
        OsRng.fill_bytes(&mut key);
        Self::from_key(key)
    }

    /// Rebuild a cipher from its exported form.
    pub fn import(exported: &str) -> Result<Self, Error> {
        let bytes = BASE64
            .decode(exported.trim())
            .map_err(|e| Error::Crypto(format!("invalid key encoding: {e}")))?;
        let key: [u8; KEY_SIZE] = bytes
            .try_into()
            .map_err(|b: Vec<u8>| Error::Crypto(format!("invalid key length: {} bytes", b.len())))?;
        Ok(Self::from_key(key))
    }

    fn from_key(key: [u8; KEY_SIZE]) -> Self {
        let aead = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key));
        Self { aead, key }
    }

    /// Exported (base64) key, suitable for persisting.
    pub fn export(&self) -> String {
        BASE64.encode(self.key)
    }

    /// Encrypt `plaintext` under a fresh random IV.
    pub fn seal(&self, plaintext: &str) -> Result<Envelope, Error> {
        let mut iv = [0u8; NONCE_SIZE];
        OsRng.fill_bytes(&mut iv);

        let ciphertext = self
            .aead
            .encrypt(Nonce::from_slice(&iv), plaintext.as_bytes())
            .map_err(|e| Error::Crypto(format!("encryption failed: {e}")))?;

        Ok(Envelope { ciphertext: BASE64.encode(ciphertext), iv: BASE64.encode(iv), timestamp: Utc::now() })
    }

    /// Decrypt an envelope sealed by this key.
    pub fn open(&self, envelope: &Envelope) -> Result<String, Error> {
        let iv = BASE64
            .decode(&envelope.iv)
            .map_err(|e| Error::Crypto(format!("invalid iv encoding: {e}")))?;
        if iv.len() != NONCE_SIZE {
            return Err(Error::Crypto(format!("invalid iv length: {} bytes", iv.len())));
        }
        let ciphertext = BASE64
            .decode(&envelope.ciphertext)
            .map_err(|e| Error::Crypto(format!("invalid ciphertext encoding: {e}")))?;

        let plaintext = self
            .aead
            .decrypt(Nonce::from_slice(&iv), ciphertext.as_ref())
            .map_err(|_| Error::Crypto("decryption failed: wrong key or tampered payload".to_string()))?;

        String::from_utf8(plaintext).map_err(|e| Error::Crypto(format!("decrypted payload is not UTF-8: {e}")))
    }
}

impl fmt::Debug for Cipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cipher").field("key", &"<redacted>").finish()
    }
}
