//! The post and listing controllers cooperating through the shared cache
//! and invalidation signal, against a mock posts API.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use httpmock::MockServer;
use time::macros::date;
use writedesk::api_types::{Post, PostId};
use writedesk::application::auth::Credentials;
use writedesk::application::context::ControllerContext;
use writedesk::application::listing::ListingController;
use writedesk::application::ports::{Confirmer, Navigator, Notice, Notifier, Route};
use writedesk::application::post::{DeleteOutcome, Phase, PostController, PostRoute, SaveOutcome};
use writedesk::cache::{CacheConfig, InvalidationSignal, SessionCache};
use writedesk::infra::http::HttpPostsClient;
use writedesk::infra::storage::MemoryStore;

#[derive(Default)]
struct Recorder {
    routes: Mutex<Vec<Route>>,
    notices: Mutex<Vec<Notice>>,
}

impl Navigator for Recorder {
    fn navigate(&self, route: Route, _replace: bool) {
        self.routes.lock().expect("routes").push(route);
    }
}

impl Notifier for Recorder {
    fn notify(&self, notice: Notice) {
        self.notices.lock().expect("notices").push(notice);
    }
}

impl Confirmer for Recorder {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

fn context(server: &MockServer, recorder: &Arc<Recorder>) -> ControllerContext {
    let client = HttpPostsClient::new(&server.url("/api"), None).expect("client");
    let token_store = Arc::new(MemoryStore::new());
    let credentials = Credentials::new(token_store);
    credentials.set_token("flow-token").expect("token");

    ControllerContext {
        api: Arc::new(client),
        cache: Arc::new(SessionCache::new(
            CacheConfig::default(),
            Arc::new(MemoryStore::new()),
        )),
        signal: Arc::new(InvalidationSignal::new(8)),
        credentials,
        navigator: recorder.clone(),
        confirmer: recorder.clone(),
        notifier: recorder.clone(),
        default_tag: Some("Personal".into()),
    }
}

fn mock_list(server: &MockServer) {
    server.mock(|when, then| {
        when.method("GET").path("/api/posts");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"[{"id":1,"title":"One","date":"2024-01-01","content":"one","type":"Tech"}]"#);
    });
}

#[tokio::test]
async fn saving_a_post_makes_the_listing_refetch() {
    let server = MockServer::start();
    mock_list(&server);
    server.mock(|when, then| {
        when.method("GET").path("/api/posts/1");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"id":1,"title":"One","date":"2024-01-01","content":"one","type":"Tech"}"#);
    });
    let update = server.mock(|when, then| {
        when.method("PUT")
            .path("/api/posts/1")
            .header("authorization", "Bearer flow-token");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"id":1,"title":"One, revised","date":"2024-01-01","content":"two","type":"Tech"}"#);
    });

    let recorder = Arc::new(Recorder::default());
    let ctx = context(&server, &recorder);

    let listing = ListingController::new(ctx.clone());
    listing.mount().await.expect("mount");
    assert_eq!(listing.entries().len(), 1);
    assert!(ctx.cache.get_posts().is_some());

    let post = PostController::new(ctx.clone());
    post.open(PostRoute::Existing(PostId::from(1)))
        .await
        .expect("open");
    post.edit().expect("edit");
    post.set_title("One, revised").expect("title");
    post.update_draft("two").expect("draft");
    let outcome = post.save().await.expect("save");
    update.assert();
    assert!(matches!(outcome, SaveOutcome::Saved(_)));

    // The list entry was dropped before the signal went out.
    assert!(ctx.cache.get_posts().is_none());
    assert!(listing.sync().await.expect("sync"));
    assert!(!listing.sync().await.expect("sync"));
    assert!(ctx.cache.get_posts().is_some());
}

#[tokio::test]
async fn new_post_then_delete_round_trip() {
    let server = MockServer::start();
    mock_list(&server);
    server.mock(|when, then| {
        when.method("POST").path("/api/posts");
        then.status(201)
            .header("content-type", "application/json")
            .body(r##"{"id":"n-1","title":"Fresh","date":"2024-07-07","description":"","content":"# Fresh"}"##);
    });
    let delete = server.mock(|when, then| {
        when.method("DELETE").path("/api/posts/n-1");
        then.status(204);
    });

    let recorder = Arc::new(Recorder::default());
    let ctx = context(&server, &recorder);
    let listing = ListingController::new(ctx.clone());
    listing.mount().await.expect("mount");

    let post = PostController::new(ctx.clone());
    post.open(PostRoute::New).await.expect("open");
    post.set_title("Fresh").expect("title");
    post.save().await.expect("save");

    let id = PostId::from("n-1");
    assert_eq!(post.post_id(), Some(id.clone()));
    assert_eq!(post.phase(), Phase::Viewing);
    assert!(listing.sync().await.expect("sync after create"));

    let outcome = post.delete().await.expect("delete");
    delete.assert();
    assert_eq!(outcome, DeleteOutcome::Deleted);
    assert!(ctx.cache.get_post(&id).is_none());
    assert!(listing.sync().await.expect("sync after delete"));

    listing.unmount();
    assert_eq!(ctx.signal.subscriber_count(), 0);
    assert_eq!(
        *recorder.routes.lock().expect("routes"),
        vec![Route::Post(id), Route::Listing]
    );
    assert!(recorder.notices.lock().expect("notices").is_empty());
}

#[tokio::test]
async fn watched_listing_refetches_after_save_without_polling() {
    let server = MockServer::start();
    mock_list(&server);
    server.mock(|when, then| {
        when.method("POST").path("/api/posts");
        then.status(201)
            .header("content-type", "application/json")
            .body(r#"{"id":2,"title":"Second","date":"2024-02-02","content":"two"}"#);
    });

    let recorder = Arc::new(Recorder::default());
    let ctx = context(&server, &recorder);
    ctx.cache.set_posts(&[Post {
        id: Some(PostId::from(1)),
        title: "Stale".into(),
        date: date!(2024 - 01 - 01),
        description: String::new(),
        content: String::new(),
        tag: None,
    }]);

    let listing = Arc::new(ListingController::new(ctx.clone()));
    listing.mount().await.expect("mount");
    assert_eq!(listing.entries()[0].title, "Stale");
    let watcher = tokio::spawn({
        let listing = Arc::clone(&listing);
        async move { listing.watch().await }
    });

    let post = PostController::new(ctx.clone());
    post.open(PostRoute::New).await.expect("open");
    post.set_title("Second").expect("title");
    assert!(matches!(
        post.save().await.expect("save"),
        SaveOutcome::Saved(_)
    ));

    tokio::time::timeout(Duration::from_secs(5), async {
        while listing.entries().first().map(|post| post.title.as_str()) != Some("One") {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("listing refetched after the save");

    listing.unmount();
    tokio::time::timeout(Duration::from_secs(5), watcher)
        .await
        .expect("watcher stopped")
        .expect("watcher task");
    assert_eq!(ctx.signal.subscriber_count(), 0);
}
