//! Recording collaborators and a wired-up context for controller tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use httpmock::MockServer;
use writedesk_api_types::{Post, PostBody, PostId};

use crate::cache::{CacheConfig, InvalidationSignal, SessionCache};
use crate::infra::http::HttpPostsClient;
use crate::infra::storage::{KeyValueStore, MemoryStore};

use super::auth::Credentials;
use super::context::ControllerContext;
use super::error::ApiError;
use super::ports::{Confirmer, Navigator, Notice, NoticeLevel, Notifier, PostsApi, Route};

#[derive(Default)]
pub(crate) struct RecordingNavigator {
    routes: Mutex<Vec<(Route, bool)>>,
}

impl RecordingNavigator {
    pub(crate) fn routes(&self) -> Vec<(Route, bool)> {
        self.routes.lock().expect("routes").clone()
    }

    pub(crate) fn last(&self) -> Option<Route> {
        self.routes().last().map(|(route, _)| route.clone())
    }
}

impl Navigator for RecordingNavigator {
    fn navigate(&self, route: Route, replace: bool) {
        self.routes.lock().expect("routes").push((route, replace));
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub(crate) fn errors(&self) -> Vec<String> {
        self.notices
            .lock()
            .expect("notices")
            .iter()
            .filter(|notice| notice.level == NoticeLevel::Error)
            .map(|notice| notice.message.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().expect("notices").push(notice);
    }
}

pub(crate) struct ScriptedConfirmer {
    answer: AtomicBool,
    asked: AtomicUsize,
}

impl ScriptedConfirmer {
    pub(crate) fn new(answer: bool) -> Self {
        Self {
            answer: AtomicBool::new(answer),
            asked: AtomicUsize::new(0),
        }
    }

    pub(crate) fn answer(&self, answer: bool) {
        self.answer.store(answer, Ordering::SeqCst);
    }

    pub(crate) fn asked(&self) -> usize {
        self.asked.load(Ordering::SeqCst)
    }
}

impl Confirmer for ScriptedConfirmer {
    fn confirm(&self, _prompt: &str) -> bool {
        self.asked.fetch_add(1, Ordering::SeqCst);
        self.answer.load(Ordering::SeqCst)
    }
}

/// Counts calls that reach the wrapped API.
pub(crate) struct CountingApi {
    inner: Arc<dyn PostsApi>,
    calls: AtomicUsize,
}

impl CountingApi {
    pub(crate) fn new(inner: Arc<dyn PostsApi>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl PostsApi for CountingApi {
    async fn list(&self) -> Result<Vec<Post>, ApiError> {
        self.hit();
        self.inner.list().await
    }

    async fn get(&self, id: &PostId) -> Result<Post, ApiError> {
        self.hit();
        self.inner.get(id).await
    }

    async fn create(&self, body: &PostBody, token: Option<&str>) -> Result<Post, ApiError> {
        self.hit();
        self.inner.create(body, token).await
    }

    async fn update(
        &self,
        id: &PostId,
        body: &PostBody,
        token: Option<&str>,
    ) -> Result<Post, ApiError> {
        self.hit();
        self.inner.update(id, body, token).await
    }

    async fn delete(&self, id: &PostId, token: Option<&str>) -> Result<(), ApiError> {
        self.hit();
        self.inner.delete(id, token).await
    }
}

/// A controller context backed by a mock server and in-memory stores.
pub(crate) struct Harness {
    pub(crate) server: MockServer,
    pub(crate) api: Arc<CountingApi>,
    pub(crate) session_store: Arc<MemoryStore>,
    pub(crate) token_store: Arc<MemoryStore>,
    pub(crate) navigator: Arc<RecordingNavigator>,
    pub(crate) notifier: Arc<RecordingNotifier>,
    pub(crate) confirmer: Arc<ScriptedConfirmer>,
    pub(crate) ctx: ControllerContext,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_cache(CacheConfig::default())
    }

    pub(crate) fn with_token(token: &str) -> Self {
        let harness = Self::new();
        harness
            .token_store
            .set("token", token)
            .expect("store token");
        harness
    }

    pub(crate) fn with_cache(config: CacheConfig) -> Self {
        let server = MockServer::start();
        let client = HttpPostsClient::new(&server.url("/api"), None).expect("client");
        let api = Arc::new(CountingApi::new(Arc::new(client)));
        let session_store = Arc::new(MemoryStore::new());
        let token_store = Arc::new(MemoryStore::new());
        let navigator = Arc::new(RecordingNavigator::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let confirmer = Arc::new(ScriptedConfirmer::new(true));

        let ctx = ControllerContext {
            api: api.clone(),
            cache: Arc::new(SessionCache::new(config, session_store.clone())),
            signal: Arc::new(InvalidationSignal::new(16)),
            credentials: Credentials::new(token_store.clone()),
            navigator: navigator.clone(),
            confirmer: confirmer.clone(),
            notifier: notifier.clone(),
            default_tag: Some("Personal".to_string()),
        };

        Self {
            server,
            api,
            session_store,
            token_store,
            navigator,
            notifier,
            confirmer,
            ctx,
        }
    }
}

pub(crate) fn post_json(id: u64, title: &str, date: &str, tag: &str) -> String {
    serde_json::json!({
        "id": id,
        "title": title,
        "date": date,
        "description": format!("about {title}"),
        "content": format!("# {title}"),
        "type": tag,
    })
    .to_string()
}
