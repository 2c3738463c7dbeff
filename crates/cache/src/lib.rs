//! In-process runtime cache for tabmate.
//!
//! This crate provides:
//! - Request key derivation (`<domain>:<hash>`)
//! - A size-bounded cache with LRU, LFU, TTL and FIFO eviction
//! - Optional gzip compression of large payloads
//! - Hit-rate metrics and a bounded performance log
//! - A background expiry sweeper

pub mod compress;
pub mod config;
mod entry;
pub mod eviction;
pub mod key;
pub mod metrics;
pub mod runtime;

pub use config::{CacheConfig, CacheConfigError};
pub use eviction::EvictionStrategy;
pub use key::{CacheRequest, KeyOptions, domain_prefix, generate_request_key};
pub use metrics::{CacheMetrics, Operation, PerformanceSample};
pub use runtime::RuntimeCache;
