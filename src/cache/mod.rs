//! Session cache and collection invalidation.
//!
//! - [`SessionCache`]: get/set/invalidate by [`CacheKey`] over a
//!   [`KeyValueStore`](crate::infra::storage::KeyValueStore). Individual post
//!   entries are LRU-bounded.
//! - [`InvalidationSignal`]: the observable both controllers share. The post
//!   controller publishes, the listing controller subscribes while mounted.
//! - [`CacheTrigger`]: writes the cache first and signals second, so a
//!   listener that refetches never sees the pre-write state.
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enabled = true
//! post_limit = 200
//! signal_capacity = 64
//! ```

mod config;
mod keys;
mod signal;
mod store;
mod trigger;

pub use config::CacheConfig;
pub use keys::CacheKey;
pub use signal::{CacheEvent, Epoch, EventKind, InvalidationSignal, Subscription};
pub use store::SessionCache;
pub use trigger::CacheTrigger;
