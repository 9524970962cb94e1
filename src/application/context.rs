//! Dependencies shared by the post and listing controllers.
//!
//! The two controllers never reference each other; everything they share is
//! in here: the API port, the session cache, the invalidation signal and the
//! UI collaborators.

use std::sync::Arc;

use crate::cache::{CacheTrigger, InvalidationSignal, SessionCache};

use super::auth::Credentials;
use super::ports::{Confirmer, Navigator, Notice, Notifier, PostsApi};

#[derive(Clone)]
pub struct ControllerContext {
    pub api: Arc<dyn PostsApi>,
    pub cache: Arc<SessionCache>,
    pub signal: Arc<InvalidationSignal>,
    pub credentials: Credentials,
    pub navigator: Arc<dyn Navigator>,
    pub confirmer: Arc<dyn Confirmer>,
    pub notifier: Arc<dyn Notifier>,
    /// Tag given to posts created in this session.
    pub default_tag: Option<String>,
}

impl ControllerContext {
    pub fn trigger(&self) -> CacheTrigger {
        CacheTrigger::new(Arc::clone(&self.cache), Arc::clone(&self.signal))
    }

    pub(crate) fn notify(&self, notice: Notice) {
        self.notifier.notify(notice);
    }
}
