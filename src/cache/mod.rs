//! Letterbox query cache.
//!
//! A flat, path-keyed cache shared by every admin view of one session:
//!
//! - [`compute_key`] derives the canonical key of a read
//! - [`CacheStore`] holds the last known value, status and revision per key
//!
//! The cache is session-scoped; entries are created lazily and never evicted.
//! Staleness is controlled via the `[cache]` section of `letterbox.toml`:
//!
//! ```toml
//! [cache]
//! stale_after_ms = 60000
//! ```

mod config;
mod keys;
mod lock;
mod store;

pub use config::CacheConfig;
pub use keys::{CacheKey, InvalidKeyError, ParamValue, QueryParams, compute_key};
pub(crate) use lock::mutex_lock;
pub use store::{
    AppliedWrite, BatchUpdate, CacheEntry, CacheStore, EntryStatus, Listener, Subscription,
    batch_update,
};
