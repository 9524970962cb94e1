//! Cache trigger service.
//!
//! Write operations report their outcome here. The trigger updates the
//! session cache and only then publishes the invalidation, so listeners that
//! refetch on the signal never race the cache write.

use std::sync::Arc;

use tracing::debug;
use writedesk_api_types::{Post, PostId};

use super::signal::{Epoch, EventKind, InvalidationSignal};
use super::store::SessionCache;

#[derive(Clone)]
pub struct CacheTrigger {
    cache: Arc<SessionCache>,
    signal: Arc<InvalidationSignal>,
}

impl CacheTrigger {
    pub fn new(cache: Arc<SessionCache>, signal: Arc<InvalidationSignal>) -> Self {
        Self { cache, signal }
    }

    /// A post was created or updated on the server.
    pub fn post_saved(&self, id: &PostId, post: &Post) -> Epoch {
        self.cache.set_post(id, post);
        self.cache.invalidate_posts();
        debug!(post_id = %id, "Cache updated after save");
        self.signal.publish(EventKind::PostSaved {
            post_id: id.clone(),
        })
    }

    /// A post was deleted on the server.
    pub fn post_deleted(&self, id: &PostId) -> Epoch {
        self.cache.remove_post(id);
        self.cache.invalidate_posts();
        debug!(post_id = %id, "Cache updated after delete");
        self.signal.publish(EventKind::PostDeleted {
            post_id: id.clone(),
        })
    }
}
