//! View/edit session for a single post.
//!
//! The controller owns the post it displays and the editor's current draft.
//! It talks to the listing only through the session cache and the
//! invalidation signal.

use std::fmt;
use std::sync::{Mutex, MutexGuard};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use time::Date;
use tracing::{debug, error, info, warn};
use writedesk_api_types::{Post, PostBody, PostId};

use crate::cache::CacheTrigger;
use crate::domain::posts;
use crate::util::lock;

use super::context::ControllerContext;
use super::error::{ApiError, ControllerError};
use super::ports::{Notice, Route};


const SOURCE: &str = "application::post";

pub const DELETE_PROMPT: &str = "Are you sure you want to delete this post?";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Loading,
    Viewing,
    Editing,
    Saving,
    Deleting,
    /// The session navigated away or was unmounted.
    Closed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Loading => "loading",
            Self::Viewing => "viewing",
            Self::Editing => "editing",
            Self::Saving => "saving",
            Self::Deleting => "deleting",
            Self::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// Which post a controller should show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostRoute {
    New,
    Existing(PostId),
}

/// How the editor collaborator should present the draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderMode {
    Render,
    Editing,
    New,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PostView {
    pub phase: Phase,
    pub post: Option<Post>,
    pub draft: String,
    pub mode: RenderMode,
    pub is_new: bool,
    pub can_edit: bool,
    pub can_save: bool,
    pub can_cancel: bool,
    pub can_delete: bool,
    pub save_label: &'static str,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved(Post),
    /// Another save or delete was in flight; nothing was sent.
    Busy,
    /// The request failed after the view was closed.
    Detached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Server content replaced the local edits.
    Reverted,
    /// A new post was abandoned without a request.
    Discarded,
    Busy,
    Detached,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Declined,
    /// The post has never been saved.
    Unavailable,
    Busy,
    Detached,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    New,
    Existing(PostId),
}

#[derive(Debug)]
struct Session {
    phase: Phase,
    target: Option<Target>,
    post: Option<Post>,
    draft: String,
}

impl Session {
    fn closed() -> Self {
        Self {
            phase: Phase::Closed,
            target: None,
            post: None,
            draft: String::new(),
        }
    }
}

/// Holds the single mutation slot until dropped.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct PostController {
    ctx: ControllerContext,
    trigger: CacheTrigger,
    session: Mutex<Session>,
    in_flight: AtomicBool,
    generation: AtomicU64,
    mounted: AtomicBool,
}

impl PostController {
    pub fn new(ctx: ControllerContext) -> Self {
        let trigger = ctx.trigger();
        Self {
            ctx,
            trigger,
            session: Mutex::new(Session::closed()),
            in_flight: AtomicBool::new(false),
            generation: AtomicU64::new(0),
            mounted: AtomicBool::new(false),
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn phase(&self) -> Phase {
        self.session().phase
    }

    pub fn post(&self) -> Option<Post> {
        self.session().post.clone()
    }

    pub fn draft(&self) -> String {
        self.session().draft.clone()
    }

    pub fn is_new(&self) -> bool {
        matches!(self.session().target, Some(Target::New))
    }

    pub fn post_id(&self) -> Option<PostId> {
        match &self.session().target {
            Some(Target::Existing(id)) => Some(id.clone()),
            _ => None,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.load(Ordering::SeqCst)
    }

    /// Snapshot for the rendering collaborator.
    pub fn view(&self) -> PostView {
        let session = self.session();
        let is_new = matches!(session.target, Some(Target::New));
        let phase = session.phase;
        let mode = if is_new {
            RenderMode::New
        } else if matches!(phase, Phase::Editing | Phase::Saving) {
            RenderMode::Editing
        } else {
            RenderMode::Render
        };
        let save_label = match (phase == Phase::Saving, is_new) {
            (true, true) => "creating...",
            (true, false) => "saving...",
            (false, true) => "create post",
            (false, false) => "save",
        };

        PostView {
            phase,
            post: session.post.clone(),
            draft: session.draft.clone(),
            mode,
            is_new,
            can_edit: phase == Phase::Viewing,
            can_save: phase == Phase::Editing,
            can_cancel: phase == Phase::Editing,
            can_delete: !is_new && matches!(phase, Phase::Viewing | Phase::Editing),
            save_label,
        }
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    pub async fn open(&self, route: PostRoute) -> Result<(), ControllerError> {
        match route {
            PostRoute::New => {
                self.start_new();
                Ok(())
            }
            PostRoute::Existing(id) => self.load(id).await,
        }
    }

    fn start_new(&self) {
        self.begin();
        let post = posts::template(posts::today(), self.ctx.default_tag.clone());
        let mut session = self.session();
        session.draft = post.content.clone();
        session.post = Some(post);
        session.target = Some(Target::New);
        session.phase = Phase::Editing;
        info!("Started new post session");
    }

    /// Show an existing post, from the cache when possible.
    pub async fn load(&self, id: PostId) -> Result<(), ControllerError> {
        let generation = self.begin();
        self.ctx.cache.set_last_visited(&id);
        *self.session() = Session {
            phase: Phase::Loading,
            target: Some(Target::Existing(id.clone())),
            post: None,
            draft: String::new(),
        };

        if let Some(post) = self.ctx.cache.get_post(&id) {
            debug!(post_id = %id, "Post served from session cache");
            self.install(post, &id);
            return Ok(());
        }

        let fetched = self.ctx.api.get(&id).await;
        if !self.is_current(generation) {
            debug!(post_id = %id, "Ignoring post fetched for a closed view");
            return Ok(());
        }

        match fetched {
            Ok(post) => {
                self.ctx.cache.set_post(&id, &post);
                self.install(post, &id);
                Ok(())
            }
            Err(err) => {
                error!(post_id = %id, error = %err, "Failed to load post");
                self.ctx
                    .notify(Notice::error(format!("Failed to load post: {err}")));
                Err(err.into())
            }
        }
    }

    /// Navigate back to the listing.
    pub fn back(&self) {
        self.close();
        self.ctx.navigator.navigate(Route::Listing, false);
    }

    /// Stop caring about this session. Pending responses are dropped quietly.
    pub fn unmount(&self) {
        self.close();
        debug!("Post view unmounted");
    }

    // ========================================================================
    // Editing
    // ========================================================================

    pub fn edit(&self) -> Result<(), ControllerError> {
        let mut session = self.session();
        match session.phase {
            Phase::Viewing => {
                session.phase = Phase::Editing;
                debug!(post_id = ?session.post.as_ref().and_then(|p| p.id.as_ref()), "Editing post");
                Ok(())
            }
            Phase::Editing => Ok(()),
            other => Err(ControllerError::invalid_state("edit", other)),
        }
    }

    pub fn set_title(&self, title: impl Into<String>) -> Result<(), ControllerError> {
        let title = title.into();
        self.modify("change the title", |post| post.title = title)
    }

    pub fn set_description(&self, description: impl Into<String>) -> Result<(), ControllerError> {
        let description = description.into();
        self.modify("change the description", |post| {
            post.description = description;
        })
    }

    pub fn set_date(&self, date: Date) -> Result<(), ControllerError> {
        self.modify("change the date", |post| post.date = date)
    }

    /// Only unsaved posts can be tagged; updates never carry the tag.
    pub fn set_tag(&self, tag: Option<String>) -> Result<(), ControllerError> {
        let mut session = self.session();
        if session.target != Some(Target::New) {
            return Err(ControllerError::invalid_state(
                "retag a saved post",
                session.phase,
            ));
        }
        Self::editable(&mut session, "change the tag")?.tag = tag;
        Ok(())
    }

    /// Editor callback: the document changed.
    pub fn update_draft(&self, content: impl Into<String>) -> Result<(), ControllerError> {
        let mut session = self.session();
        if session.phase != Phase::Editing {
            return Err(ControllerError::invalid_state(
                "change the content",
                session.phase,
            ));
        }
        session.draft = content.into();
        Ok(())
    }

    fn modify(
        &self,
        op: &'static str,
        apply: impl FnOnce(&mut Post),
    ) -> Result<(), ControllerError> {
        let mut session = self.session();
        apply(Self::editable(&mut session, op)?);
        Ok(())
    }

    fn editable<'s>(
        session: &'s mut Session,
        op: &'static str,
    ) -> Result<&'s mut Post, ControllerError> {
        if session.phase != Phase::Editing {
            return Err(ControllerError::invalid_state(op, session.phase));
        }
        session.post.as_mut().ok_or(ControllerError::NotLoaded)
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Create or update the post from the edited fields and the draft.
    pub async fn save(&self) -> Result<SaveOutcome, ControllerError> {
        let Some(_slot) = InFlight::acquire(&self.in_flight) else {
            debug!("Save ignored: a mutation is already in flight");
            return Ok(SaveOutcome::Busy);
        };
        let generation = self.generation.load(Ordering::SeqCst);

        let (existing, body) = match self.prepare_save() {
            Ok(prepared) => prepared,
            Err(ControllerError::Validation(err)) => {
                warn!(reason = err.message(), "Save blocked by validation");
                self.ctx.notify(Notice::error(err.message()));
                return Err(err.into());
            }
            Err(err) => return Err(err),
        };

        let token = self.ctx.credentials.token();
        let result = match &existing {
            None => {
                info!(title = %body.title, "Creating post");
                self.ctx.api.create(&body, token.as_deref()).await
            }
            Some(id) => {
                info!(post_id = %id, "Updating post");
                self.ctx.api.update(id, &body, token.as_deref()).await
            }
        };

        match result {
            Ok(saved) => self.finish_save(saved, existing, body, generation),
            Err(err) => {
                let action = if existing.is_none() { "create" } else { "update" };
                match self.fail_mutation(action, err, Phase::Editing, generation) {
                    Some(err) => Err(err),
                    None => Ok(SaveOutcome::Detached),
                }
            }
        }
    }

    fn prepare_save(&self) -> Result<(Option<PostId>, PostBody), ControllerError> {
        let mut session = self.session();
        if session.phase != Phase::Editing {
            return Err(ControllerError::invalid_state("save", session.phase));
        }
        let existing = match &session.target {
            Some(Target::New) => None,
            Some(Target::Existing(id)) => Some(id.clone()),
            None => return Err(ControllerError::NotLoaded),
        };
        let post = session.post.as_ref().ok_or(ControllerError::NotLoaded)?;
        if existing.is_none() {
            posts::validate_for_create(post)?;
        }

        let body = posts::request_body(post, &session.draft, existing.is_none());
        session.phase = Phase::Saving;
        Ok((existing, body))
    }

    fn finish_save(
        &self,
        mut saved: Post,
        existing: Option<PostId>,
        body: PostBody,
        generation: u64,
    ) -> Result<SaveOutcome, ControllerError> {
        let created = existing.is_none();
        let Some(id) = saved.id.clone().or(existing) else {
            error!("Create response carried no post id");
            if self.is_current(generation) {
                self.set_phase(Phase::Editing);
                self.ctx.notify(Notice::error(
                    "The server did not return an id for the new post.",
                ));
            }
            return Err(ControllerError::MissingId);
        };
        if saved.content.is_empty() {
            saved.content = body.content;
        }
        saved.id = Some(id.clone());

        self.trigger.post_saved(&id, &saved);
        info!(post_id = %id, created, "Post saved");

        if !self.is_current(generation) {
            debug!(post_id = %id, "Save finished after the view was closed");
            return Ok(SaveOutcome::Saved(saved));
        }

        {
            let mut session = self.session();
            session.draft = saved.content.clone();
            session.post = Some(saved.clone());
            session.target = Some(Target::Existing(id.clone()));
            session.phase = Phase::Viewing;
        }
        if created {
            self.ctx.cache.set_last_visited(&id);
            self.ctx.navigator.navigate(Route::Post(id), true);
        }
        Ok(SaveOutcome::Saved(saved))
    }

    /// Throw away local edits.
    ///
    /// Existing posts are re-fetched from the server, never from the cache.
    pub async fn cancel(&self) -> Result<CancelOutcome, ControllerError> {
        let target = {
            let session = self.session();
            if session.phase != Phase::Editing {
                return Err(ControllerError::invalid_state("cancel", session.phase));
            }
            session.target.clone().ok_or(ControllerError::NotLoaded)?
        };

        let id = match target {
            Target::New => {
                info!("Discarding unsaved post");
                self.close();
                self.ctx.navigator.navigate(Route::Listing, false);
                return Ok(CancelOutcome::Discarded);
            }
            Target::Existing(id) => id,
        };

        let Some(_slot) = InFlight::acquire(&self.in_flight) else {
            return Ok(CancelOutcome::Busy);
        };
        let generation = self.generation.load(Ordering::SeqCst);
        let fetched = self.ctx.api.get(&id).await;
        if !self.is_current(generation) {
            return Ok(CancelOutcome::Detached);
        }

        match fetched {
            Ok(post) => {
                self.ctx.cache.set_post(&id, &post);
                self.install(post, &id);
                info!(post_id = %id, "Local edits discarded");
                Ok(CancelOutcome::Reverted)
            }
            Err(err) => {
                error!(post_id = %id, error = %err, "Failed to reload post");
                self.ctx
                    .notify(Notice::error(format!("Failed to discard changes: {err}")));
                Err(err.into())
            }
        }
    }

    /// Delete the post after the user confirms.
    pub async fn delete(&self) -> Result<DeleteOutcome, ControllerError> {
        let Some(id) = self.post_id() else {
            debug!("Delete is unavailable for an unsaved post");
            return Ok(DeleteOutcome::Unavailable);
        };
        let Some(_slot) = InFlight::acquire(&self.in_flight) else {
            return Ok(DeleteOutcome::Busy);
        };

        let prior = match self.phase() {
            phase @ (Phase::Viewing | Phase::Editing) => phase,
            other => return Err(ControllerError::invalid_state("delete", other)),
        };
        if !self.ctx.confirmer.confirm(DELETE_PROMPT) {
            info!(post_id = %id, "Delete declined");
            return Ok(DeleteOutcome::Declined);
        }

        let generation = self.generation.load(Ordering::SeqCst);
        self.set_phase(Phase::Deleting);
        let token = self.ctx.credentials.token();
        info!(post_id = %id, "Deleting post");

        match self.ctx.api.delete(&id, token.as_deref()).await {
            Ok(()) => {
                self.trigger.post_deleted(&id);
                info!(post_id = %id, "Post deleted");
                if self.is_current(generation) {
                    self.close();
                    self.ctx.navigator.navigate(Route::Listing, false);
                }
                Ok(DeleteOutcome::Deleted)
            }
            Err(err) => match self.fail_mutation("delete", err, prior, generation) {
                Some(err) => Err(err),
                None => Ok(DeleteOutcome::Detached),
            },
        }
    }

    /// Handle a failed save or delete. `None` when the view is gone.
    fn fail_mutation(
        &self,
        action: &'static str,
        err: ApiError,
        restore: Phase,
        generation: u64,
    ) -> Option<ControllerError> {
        let current = self.is_current(generation);

        if err.is_authorization() {
            let status = err.status().unwrap_or(401);
            warn!(action, status, "Authorization rejected; clearing token");
            self.ctx.credentials.clear();
            if !current {
                return None;
            }
            self.set_phase(restore);
            self.ctx.notify(Notice::error(
                "Your session has expired. Please log in again.",
            ));
            self.ctx.navigator.navigate(Route::Login, false);
            return Some(ControllerError::Unauthorized { status });
        }

        if !current {
            warn!(action, error = %err, "Request failed after the view was closed");
            return None;
        }
        error!(action, error = %err, "Post request failed");
        self.set_phase(restore);
        self.ctx.notify(Notice::error(format!(
            "Failed to {action} post. Please try again."
        )));
        Some(err.into())
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn session(&self) -> MutexGuard<'_, Session> {
        lock::lock(&self.session, SOURCE, "session")
    }

    fn set_phase(&self, phase: Phase) {
        let mut session = self.session();
        debug!(from = %session.phase, to = %phase, "Post phase changed");
        session.phase = phase;
    }

    fn install(&self, mut post: Post, id: &PostId) {
        if post.id.is_none() {
            post.id = Some(id.clone());
        }
        let mut session = self.session();
        session.draft = post.content.clone();
        session.post = Some(post);
        session.target = Some(Target::Existing(id.clone()));
        session.phase = Phase::Viewing;
    }

    fn begin(&self) -> u64 {
        self.mounted.store(true, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn close(&self) {
        self.mounted.store(false, Ordering::SeqCst);
        self.generation.fetch_add(1, Ordering::SeqCst);
        *self.session() = Session::closed();
    }

    fn is_current(&self, generation: u64) -> bool {
        self.mounted.load(Ordering::SeqCst) && self.generation.load(Ordering::SeqCst) == generation
    }
}
