//! Request key derivation.
//!
//! Keys look like `<domain>:<hash>` (`global:<hash>` without a domain). The
//! hash is a 32-bit shift-and-subtract rolling hash over a canonical JSON
//! rendering of the request, printed as fixed-width base 36. It is not
//! collision resistant: two requests that collide share a cached value.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Width of the rendered hash; `u32::MAX` fits in 7 base-36 digits.
pub const HASH_WIDTH: usize = 7;

const GLOBAL_SCOPE: &str = "global";

/// Fields of an AI request that decide whether two requests are the same.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheRequest {
    pub prompt: String,
    pub task_type: String,
    pub output_format: String,
    pub domain: Option<String>,
    pub category: Option<String>,
    pub page_type: Option<String>,
    pub user_input: Option<String>,
}

/// How fine-grained keys should be.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KeyOptions {
    /// Fold `user_input` into the key.
    pub include_user_input: bool,
    /// Fold the current time bucket of this width into the key, so entries
    /// stop matching when the bucket rolls over.
    pub time_bucket: Option<Duration>,
}

#[derive(Serialize)]
struct KeyMaterial<'a> {
    prompt: &'a str,
    task_type: &'a str,
    output_format: &'a str,
    domain: Option<&'a str>,
    category: Option<&'a str>,
    page_type: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_input: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    time_bucket: Option<u64>,
}

/// Derive the cache key for `request` using the current time.
pub fn generate_request_key(request: &CacheRequest, options: KeyOptions) -> String {
    generate_request_key_at(request, options, SystemTime::now())
}

/// Derive the cache key for `request` as of `now`.
pub fn generate_request_key_at(request: &CacheRequest, options: KeyOptions, now: SystemTime) -> String {
    let domain = request.domain.as_deref().map(str::to_ascii_lowercase);

    let time_bucket = options.time_bucket.map(|width| {
        let elapsed = now.duration_since(UNIX_EPOCH).unwrap_or_default().as_secs();
        elapsed / width.as_secs().max(1)
    });

    let material = KeyMaterial {
        prompt: &request.prompt,
        task_type: &request.task_type,
        output_format: &request.output_format,
        domain: domain.as_deref(),
        category: request.category.as_deref(),
        page_type: request.page_type.as_deref(),
        user_input: if options.include_user_input { request.user_input.as_deref() } else { None },
        time_bucket,
    };
    // Serializing borrowed strings and integers cannot fail.
    let canonical = serde_json::to_string(&material).unwrap_or_default();

    format!("{}:{}", domain.as_deref().unwrap_or(GLOBAL_SCOPE), rolling_hash(&canonical))
}

/// Key prefix shared by every entry of `domain`.
pub fn domain_prefix(domain: &str) -> String {
    format!("{}:", domain.to_ascii_lowercase())
}

/// `hash = hash * 31 + unit` over UTF-16 code units, wrapping at 32 bits.
pub fn rolling_hash(input: &str) -> String {
    let hash = input
        .encode_utf16()
        .fold(0i32, |hash, unit| hash.wrapping_shl(5).wrapping_sub(hash).wrapping_add(unit as i32));
    to_base36(hash.unsigned_abs(), HASH_WIDTH)
}

fn to_base36(mut value: u32, width: usize) -> String {
    const DIGITS: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut out = vec![b'0'; width];
    for slot in out.iter_mut().rev() {
        *slot = DIGITS[(value % 36) as usize];
        value /= 36;
    }
    String::from_utf8(out).unwrap_or_default()
}
