//! Object cache shared by the application services.
//!
//! A single bounded LRU map holds memoized ACL resolutions, access decisions, path prefixes,
//! rendered sidebars and profile lookups. Every write elsewhere in the system flushes it whole.
//!
//! ```toml
//! [cache]
//! capacity = 2048
//! ```

mod config;
mod keys;
mod lock;
mod store;

pub use config::CacheConfig;
pub use keys::{CacheKey, ViewerKey};
pub use store::{
    CacheStats, METRIC_CACHE_EVICT, METRIC_CACHE_FLUSH, METRIC_CACHE_HIT, METRIC_CACHE_MISS,
    ObjectCache,
};
