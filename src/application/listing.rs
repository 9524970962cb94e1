//! The post collection view.
//!
//! Loads the collection cache-first, keeps it newest first and filters it by
//! tag. While mounted it holds a subscription to the invalidation signal and
//! refetches from the network whenever a post was saved or deleted elsewhere:
//! either continuously through [`ListingController::watch`], or on demand
//! through [`ListingController::sync`].

use std::sync::{Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use writedesk_api_types::{Post, PostId};

use crate::cache::Subscription;
use crate::domain::posts::{self, ALL_TAGS, TagFilter};
use crate::util::lock;

use super::context::ControllerContext;
use super::error::ControllerError;
use super::ports::{Notice, Route};

const SOURCE: &str = "application::listing";

#[derive(Debug)]
struct ListingState {
    posts: Vec<Post>,
    active_tag: String,
    last_error: Option<String>,
}

pub struct ListingController {
    ctx: ControllerContext,
    state: Mutex<ListingState>,
    // Taken by `watch` for as long as it runs.
    subscription: Mutex<Option<Subscription>>,
    mounted: watch::Sender<bool>,
}

impl ListingController {
    pub fn new(ctx: ControllerContext) -> Self {
        let (mounted, _) = watch::channel(false);
        Self {
            ctx,
            state: Mutex::new(ListingState {
                posts: Vec::new(),
                active_tag: ALL_TAGS.to_string(),
                last_error: None,
            }),
            subscription: Mutex::new(None),
            mounted,
        }
    }

    /// Start listening for invalidations, restore the tag, then load.
    pub async fn mount(&self) -> Result<(), ControllerError> {
        *self.subscription() = Some(self.ctx.signal.subscribe());
        self.mounted.send_replace(true);
        if let Some(tag) = self.ctx.cache.active_tag() {
            debug!(tag = %tag, "Restored active tag");
            self.state().active_tag = tag;
        }
        self.load().await
    }

    /// Stop listening and end a running [`watch`](Self::watch). Safe to call
    /// more than once.
    pub fn unmount(&self) {
        self.subscription().take();
        if self.mounted.send_replace(false) {
            debug!("Listing unmounted");
        }
    }

    pub fn is_mounted(&self) -> bool {
        *self.mounted.borrow()
    }

    /// Refetch on every invalidation until the listing is unmounted.
    ///
    /// Invalidations raised between `mount` and the first poll are not lost.
    /// Invalidations that pile up during a refresh are coalesced into one
    /// more refresh. Returns at once when the listing is not mounted or is
    /// already being watched.
    pub async fn watch(&self) {
        let Some(mut events) = self.subscription().take() else {
            debug!("Listing not mounted or already watched");
            return;
        };
        let mut mounted = self.mounted.subscribe();
        debug!("Watching for invalidations");

        loop {
            if !*mounted.borrow_and_update() {
                break;
            }
            tokio::select! {
                event = events.changed() => {
                    let Some(event) = event else {
                        break;
                    };
                    let coalesced = events.drain();
                    debug!(event_epoch = event.epoch, coalesced, "Post list invalidated");
                    if let Err(err) = self.refresh().await {
                        warn!(error = %err, "Refresh after invalidation failed");
                    }
                }
                changed = mounted.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        debug!("Stopped watching for invalidations");
    }

    pub async fn load(&self) -> Result<(), ControllerError> {
        if let Some(mut cached) = self.ctx.cache.get_posts() {
            posts::sort_by_date_desc(&mut cached);
            debug!(count = cached.len(), "Post list served from session cache");
            self.install(cached);
            return Ok(());
        }
        self.refresh().await
    }

    /// Fetch the collection from the server, bypassing the cache.
    pub async fn refresh(&self) -> Result<(), ControllerError> {
        match self.ctx.api.list().await {
            Ok(mut fetched) => {
                posts::sort_by_date_desc(&mut fetched);
                self.ctx.cache.set_posts(&fetched);
                info!(count = fetched.len(), "Post list refreshed");
                self.install(fetched);
                Ok(())
            }
            Err(err) => {
                error!(error = %err, "Failed to load posts");
                self.state().last_error = Some(err.to_string());
                self.ctx
                    .notify(Notice::error(format!("Failed to load posts: {err}")));
                Err(err.into())
            }
        }
    }

    /// Refetch once if any invalidation arrived since the last call.
    ///
    /// Always `false` while [`watch`](Self::watch) runs; it consumes the
    /// invalidations itself.
    pub async fn sync(&self) -> Result<bool, ControllerError> {
        let pending = self
            .subscription()
            .as_mut()
            .map_or(0, Subscription::drain);
        if pending == 0 {
            return Ok(false);
        }
        debug!(pending, "Post list invalidated");
        self.refresh().await?;
        Ok(true)
    }

    fn install(&self, fetched: Vec<Post>) {
        let mut state = self.state();
        state.posts = fetched;
        state.last_error = None;
    }

    // ========================================================================
    // Filtering
    // ========================================================================

    pub fn tags(&self) -> Vec<String> {
        posts::tag_choices(&self.state().posts)
    }

    pub fn active_tag(&self) -> String {
        self.state().active_tag.clone()
    }

    /// Returns `false` when the tag was already selected.
    pub fn select_tag(&self, tag: &str) -> bool {
        {
            let mut state = self.state();
            if state.active_tag == tag {
                return false;
            }
            state.active_tag = tag.to_string();
        }
        self.ctx.cache.set_active_tag(tag);
        debug!(tag, "Active tag changed");
        true
    }

    /// Posts under the active tag, newest first.
    pub fn entries(&self) -> Vec<Post> {
        let state = self.state();
        posts::filter_by_tag(&state.posts, TagFilter::parse(&state.active_tag))
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn posts(&self) -> Vec<Post> {
        self.state().posts.clone()
    }

    pub fn last_error(&self) -> Option<String> {
        self.state().last_error.clone()
    }

    pub fn last_visited(&self) -> Option<PostId> {
        self.ctx.cache.last_visited()
    }

    // ========================================================================
    // Navigation
    // ========================================================================

    pub fn open(&self, id: &PostId) {
        self.ctx.cache.set_last_visited(id);
        self.ctx.navigator.navigate(Route::Post(id.clone()), false);
    }

    pub fn new_post(&self) {
        self.ctx.navigator.navigate(Route::NewPost, false);
    }

    fn state(&self) -> MutexGuard<'_, ListingState> {
        lock::lock(&self.state, SOURCE, "state")
    }

    fn subscription(&self) -> MutexGuard<'_, Option<Subscription>> {
        lock::lock(&self.subscription, SOURCE, "subscription")
    }
}
