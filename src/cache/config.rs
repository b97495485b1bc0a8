//! Query cache configuration.
//!
//! Read from the `[cache]` section of `letterbox.toml`.

use std::time::Duration;

use serde::Deserialize;

/// Tuning for the query path.
///
/// Entries are never evicted within a session; `stale_after_ms` only decides whether a
/// `ready` entry is refetched when a new consumer observes it.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Age after which a ready entry is refetched on observation. `None` serves it as-is.
    pub stale_after_ms: Option<u64>,
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            stale_after_ms: settings.stale_after.map(|window| {
                u64::try_from(window.as_millis()).unwrap_or(u64::MAX)
            }),
        }
    }
}

impl CacheConfig {
    pub fn stale_after(&self) -> Option<Duration> {
        self.stale_after_ms.map(Duration::from_millis)
    }

    /// Whether an entry written `age` ago should be refetched.
    pub fn is_stale(&self, age: Duration) -> bool {
        self.stale_after().is_some_and(|window| age >= window)
    }
}
