//! Session cache over a key/value store.

use std::sync::{Arc, Mutex};

use lru::LruCache;
use metrics::counter;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use writedesk_api_types::{Post, PostId};

use crate::infra::storage::KeyValueStore;
use crate::util::lock;

use super::config::CacheConfig;
use super::keys::CacheKey;

const SOURCE: &str = "cache::store";

pub(crate) const METRIC_CACHE_HIT: &str = "writedesk_cache_hit_total";
pub(crate) const METRIC_CACHE_MISS: &str = "writedesk_cache_miss_total";
pub(crate) const METRIC_CACHE_EVICT: &str = "writedesk_cache_evict_total";

/// Passive, shared cache for one browsing session.
///
/// Posts and the post collection are stored as JSON; the active tag and the
/// last visited id are stored as plain strings. Writes are best effort: a
/// failing store is logged and treated as a cache that forgot the entry.
///
/// Post recency is kept in the store next to the posts, so the `post_limit`
/// bound holds across every cache opened over the same store.
pub struct SessionCache {
    config: CacheConfig,
    store: Arc<dyn KeyValueStore>,
    recent_posts: Mutex<LruCache<PostId, ()>>,
}

impl SessionCache {
    pub fn new(config: CacheConfig, store: Arc<dyn KeyValueStore>) -> Self {
        let recent_posts = Mutex::new(LruCache::new(config.post_limit_non_zero()));
        let cache = Self {
            config,
            store,
            recent_posts,
        };
        if cache.config.enabled {
            cache.restore_recency();
        }
        cache
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    // ========================================================================
    // Keyed access
    // ========================================================================

    /// Read and decode a cached value. Undecodable entries are dropped.
    pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        if !self.config.enabled {
            return None;
        }

        let Some(raw) = self.store.get(&key.storage_key()) else {
            counter!(METRIC_CACHE_MISS, "kind" => key.kind()).increment(1);
            debug!(cache_key = %key, "Session cache miss");
            return None;
        };

        match serde_json::from_str(&raw) {
            Ok(value) => {
                counter!(METRIC_CACHE_HIT, "kind" => key.kind()).increment(1);
                debug!(cache_key = %key, "Session cache hit");
                Some(value)
            }
            Err(err) => {
                warn!(cache_key = %key, error = %err, "Dropping undecodable cache entry");
                self.remove_entry(key);
                counter!(METRIC_CACHE_MISS, "kind" => key.kind()).increment(1);
                None
            }
        }
    }

    /// Encode and store a value; last writer wins.
    pub fn set<T: Serialize>(&self, key: &CacheKey, value: &T) {
        if !self.config.enabled {
            return;
        }

        match serde_json::to_string(value) {
            Ok(raw) => self.write_entry(key, &raw),
            Err(err) => warn!(cache_key = %key, error = %err, "Failed to encode cache entry"),
        }
    }

    pub fn invalidate(&self, key: &CacheKey) {
        if let CacheKey::Post(id) = key {
            let forgotten = lock::lock(&self.recent_posts, SOURCE, "invalidate")
                .pop(id)
                .is_some();
            if forgotten {
                self.save_recency();
            }
        }
        self.remove_entry(key);
        debug!(cache_key = %key, "Session cache entry invalidated");
    }

    // ========================================================================
    // Posts
    // ========================================================================

    pub fn get_post(&self, id: &PostId) -> Option<Post> {
        let post = self.get(&CacheKey::Post(id.clone()))?;
        self.track(id);
        Some(post)
    }

    pub fn set_post(&self, id: &PostId, post: &Post) {
        if !self.config.enabled {
            return;
        }
        self.set(&CacheKey::Post(id.clone()), post);
        self.track(id);
    }

    pub fn remove_post(&self, id: &PostId) {
        self.invalidate(&CacheKey::Post(id.clone()));
    }

    fn track(&self, id: &PostId) {
        let evicted = lock::lock(&self.recent_posts, SOURCE, "track")
            .push(id.clone(), ())
            .filter(|(evicted, _)| evicted != id)
            .map(|(evicted, _)| evicted);

        if let Some(evicted) = evicted {
            self.evict(evicted);
        }
        self.save_recency();
    }

    fn evict(&self, id: PostId) {
        counter!(METRIC_CACHE_EVICT, "kind" => "post").increment(1);
        debug!(post_id = %id, "Evicting least recently used post");
        self.remove_entry(&CacheKey::Post(id));
    }

    /// Rebuild recency from the store, then evict down to the limit.
    ///
    /// Post entries missing from the recorded order (written by a cache that
    /// lost a race on the order key) count as the least recently used.
    fn restore_recency(&self) {
        let stored: Vec<PostId> = self
            .store
            .keys()
            .iter()
            .filter_map(|key| CacheKey::post_id(key))
            .collect();
        let recorded: Vec<PostId> = self
            .store
            .get(&CacheKey::RecentPosts.storage_key())
            .and_then(|raw| match serde_json::from_str(&raw) {
                Ok(order) => Some(order),
                Err(err) => {
                    warn!(error = %err, "Ignoring undecodable post recency");
                    None
                }
            })
            .unwrap_or_default();

        let mut order: Vec<PostId> = stored
            .iter()
            .filter(|id| !recorded.contains(id))
            .cloned()
            .collect();
        order.extend(recorded.into_iter().filter(|id| stored.contains(id)));

        let mut evicted = Vec::new();
        {
            let mut recent = lock::lock(&self.recent_posts, SOURCE, "restore");
            for id in order {
                if let Some((old, _)) = recent.push(id.clone(), ()).filter(|(old, _)| *old != id) {
                    evicted.push(old);
                }
            }
        }

        debug!(
            posts = stored.len(),
            evicted = evicted.len(),
            "Restored post recency"
        );
        for id in evicted {
            self.evict(id);
        }
        if !stored.is_empty() {
            self.save_recency();
        }
    }

    fn save_recency(&self) {
        let order: Vec<PostId> = lock::lock(&self.recent_posts, SOURCE, "save_recency")
            .iter()
            .rev()
            .map(|(id, _)| id.clone())
            .collect();
        match serde_json::to_string(&order) {
            Ok(raw) => self.write_entry(&CacheKey::RecentPosts, &raw),
            Err(err) => warn!(error = %err, "Failed to encode post recency"),
        }
    }

    // ========================================================================
    // Post collection
    // ========================================================================

    pub fn get_posts(&self) -> Option<Vec<Post>> {
        self.get(&CacheKey::PostList)
    }

    pub fn set_posts(&self, posts: &[Post]) {
        self.set(&CacheKey::PostList, &posts);
    }

    /// The next collection load must go to the network.
    pub fn invalidate_posts(&self) {
        self.invalidate(&CacheKey::PostList);
    }

    // ========================================================================
    // Session state
    // ========================================================================

    pub fn active_tag(&self) -> Option<String> {
        self.store
            .get(&CacheKey::ActiveTag.storage_key())
            .filter(|tag| !tag.is_empty())
    }

    pub fn set_active_tag(&self, tag: &str) {
        self.write_entry(&CacheKey::ActiveTag, tag);
    }

    pub fn last_visited(&self) -> Option<PostId> {
        self.store
            .get(&CacheKey::LastVisitedPost.storage_key())
            .filter(|id| !id.is_empty())
            .map(PostId::from)
    }

    pub fn set_last_visited(&self, id: &PostId) {
        self.write_entry(&CacheKey::LastVisitedPost, id.as_str());
    }

    fn write_entry(&self, key: &CacheKey, raw: &str) {
        if let Err(err) = self.store.set(&key.storage_key(), raw) {
            warn!(cache_key = %key, error = %err, "Failed to write session entry");
        }
    }

    fn remove_entry(&self, key: &CacheKey) {
        if let Err(err) = self.store.remove(&key.storage_key()) {
            warn!(cache_key = %key, error = %err, "Failed to remove session entry");
        }
    }
}
