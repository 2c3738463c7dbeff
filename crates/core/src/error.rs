//! Unified error types for the tabmate data layer.
//!
//! Corruption is never represented here: unreadable payloads are recovered
//! inside the store and surface as "not found". Everything in this enum is
//! something a caller can act on.

use tokio_rusqlite::rusqlite;

/// Unified error type for the durable store.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Missing or malformed caller input (e.g., empty task name).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// A website pattern failed to compile as a regular expression.
    #[error("INVALID_PATTERN: {pattern}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Database operation failed.
    #[error("STORE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// A data or table migration failed to apply.
    #[error("STORE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A value could not be serialized for storage.
    #[error("STORE_ERROR: serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Key generation, import, or encryption failed.
    #[error("CRYPTO_ERROR: {0}")]
    Crypto(String),
}

impl Error {
    /// True for errors caused by the caller's input rather than the store.
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::InvalidInput(_) | Error::InvalidPattern { .. })
    }

    pub(crate) fn invalid_pattern(pattern: &str, err: &regex::Error) -> Self {
        Error::InvalidPattern { pattern: pattern.to_string(), reason: err.to_string() }
    }
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}
