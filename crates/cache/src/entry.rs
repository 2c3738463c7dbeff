//! Cache entries and their stored payloads.

use std::time::Duration;

use tokio::time::Instant;

use crate::compress;

/// Serialized value, possibly gzip'd.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Payload {
    Raw(String),
    Compressed(Vec<u8>),
}

impl Payload {
    /// Encode `raw`, compressing when it is above `threshold` and worth it.
    pub(crate) fn encode(raw: String, compression_enabled: bool, threshold: usize) -> Self {
        if compression_enabled
            && raw.len() > threshold
            && let Some(bytes) = compress::compress(&raw)
        {
            return Payload::Compressed(bytes);
        }
        Payload::Raw(raw)
    }

    pub(crate) fn decode(&self) -> Option<String> {
        match self {
            Payload::Raw(raw) => Some(raw.clone()),
            Payload::Compressed(bytes) => compress::decompress(bytes),
        }
    }

    pub(crate) fn len(&self) -> usize {
        match self {
            Payload::Raw(raw) => raw.len(),
            Payload::Compressed(bytes) => bytes.len(),
        }
    }

    pub(crate) fn is_compressed(&self) -> bool {
        matches!(self, Payload::Compressed(_))
    }
}

/// Stand-in deadline for lifetimes too long to represent as an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(100 * 365 * 24 * 60 * 60);

/// `start + ttl`, saturating to [`FAR_FUTURE`] past `start` on overflow.
pub(crate) fn deadline(start: Instant, ttl: Duration) -> Instant {
    start
        .checked_add(ttl)
        .or_else(|| start.checked_add(FAR_FUTURE))
        .unwrap_or(start)
}

#[derive(Debug, Clone)]
pub(crate) struct CacheEntry {
    pub payload: Payload,
    pub created_at: Instant,
    pub expires_at: Instant,
    pub last_accessed: Instant,
    pub hits: u64,
    /// Key plus stored payload bytes.
    pub size: usize,
    /// Sequence number at insertion.
    pub inserted: u64,
    /// Sequence number at last insertion or hit.
    pub touched: u64,
}

impl CacheEntry {
    pub(crate) fn is_expired_at(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}
