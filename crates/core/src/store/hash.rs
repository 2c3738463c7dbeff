//! Request hashing for the persistent response cache.

use sha2::{Digest, Sha256};

/// Compute the cache key for an AI request.
///
/// `context` is hashed in its serialized form, so callers must build it the
/// same way for equal requests to share an entry.
pub fn compute_response_key(prompt: &str, context: &serde_json::Value, task_type: &str) -> String {
    let context = context.to_string();
    let mut hasher = Sha256::new();
    for field in [prompt, context.as_str(), task_type] {
        // Length prefix keeps field boundaries fixed.
        hasher.update((field.len() as u64).to_le_bytes());
        hasher.update(field.as_bytes());
    }
    hex::encode(hasher.finalize())
}
