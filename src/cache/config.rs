//! Cache configuration.

use std::num::NonZeroUsize;

use serde::Deserialize;

const DEFAULT_POST_LIMIT: usize = 200;
const DEFAULT_SIGNAL_CAPACITY: usize = 64;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// When false every read misses and writes are dropped.
    pub enabled: bool,
    /// Maximum number of individual posts kept in the session cache.
    pub post_limit: usize,
    /// Buffered invalidations per subscriber before older ones are dropped.
    pub signal_capacity: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            post_limit: DEFAULT_POST_LIMIT,
            signal_capacity: DEFAULT_SIGNAL_CAPACITY,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enabled: settings.enabled,
            post_limit: settings.post_limit.get(),
            signal_capacity: settings.signal_capacity.get(),
        }
    }
}

impl CacheConfig {
    /// Returns the post limit as NonZeroUsize, clamping to 1 if zero.
    pub fn post_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.post_limit).unwrap_or(NonZeroUsize::MIN)
    }

    /// `tokio::sync::broadcast` rejects a zero capacity.
    pub fn signal_capacity_non_zero(&self) -> usize {
        self.signal_capacity.max(1)
    }
}
