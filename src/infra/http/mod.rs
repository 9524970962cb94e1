//! reqwest-backed implementation of the posts API.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use metrics::{counter, histogram};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use writedesk_api_types::{Post, PostBody, PostId};

use crate::application::error::ApiError;
use crate::application::ports::PostsApi;

const POSTS_SEGMENT: &str = "posts";

pub(crate) const METRIC_API_REQUESTS: &str = "writedesk_api_request_total";
pub(crate) const METRIC_API_LATENCY: &str = "writedesk_api_request_ms";

#[derive(Clone, Debug)]
pub struct HttpPostsClient {
    client: Client,
    base: Url,
}

impl HttpPostsClient {
    /// `base_url` is the API root, e.g. `http://localhost:8000/api`.
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, ApiError> {
        let base = Url::parse(base_url)?;
        if base.cannot_be_a_base() {
            return Err(ApiError::BaseUrl(base_url.to_string()));
        }

        let mut builder = Client::builder().user_agent(Self::user_agent());
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            client: builder.build()?,
            base,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("writedesk/", env!("CARGO_PKG_VERSION"))
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    fn endpoint(&self, id: Option<&PostId>) -> Url {
        let mut url = self.base.clone();
        // Checked in `new`: the base always accepts path segments.
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(POSTS_SEGMENT);
            if let Some(id) = id {
                segments.push(id.as_str());
            }
        }
        url
    }

    fn request(&self, method: Method, url: Url, token: Option<&str>) -> RequestBuilder {
        let req = self.client.request(method, url);
        match token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, req: RequestBuilder) -> Result<Vec<u8>, ApiError> {
        let started = Instant::now();
        let resp = req.send().await?;
        let status = resp.status();
        let url = resp.url().clone();
        let bytes = resp.bytes().await?;
        let elapsed = started.elapsed();
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        info!(
            url = %url,
            status = status.as_u16(),
            elapsed_ms,
            "Posts API responded"
        );
        counter!(METRIC_API_REQUESTS, "status" => status.as_u16().to_string()).increment(1);
        histogram!(METRIC_API_LATENCY).record(elapsed.as_secs_f64() * 1000.0);

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&bytes).into_owned(),
            });
        }
        Ok(bytes.to_vec())
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, ApiError> {
        let bytes = self.send(req).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl PostsApi for HttpPostsClient {
    async fn list(&self) -> Result<Vec<Post>, ApiError> {
        let url = self.endpoint(None);
        debug!(%url, "Listing posts");
        self.send_json(self.request(Method::GET, url, None)).await
    }

    async fn get(&self, id: &PostId) -> Result<Post, ApiError> {
        let url = self.endpoint(Some(id));
        debug!(%url, post_id = %id, "Fetching post");
        self.send_json(self.request(Method::GET, url, None)).await
    }

    async fn create(&self, body: &PostBody, token: Option<&str>) -> Result<Post, ApiError> {
        let url = self.endpoint(None);
        debug!(%url, authorized = token.is_some(), "Creating post");
        self.send_json(self.request(Method::POST, url, token).json(body))
            .await
    }

    async fn update(
        &self,
        id: &PostId,
        body: &PostBody,
        token: Option<&str>,
    ) -> Result<Post, ApiError> {
        let url = self.endpoint(Some(id));
        debug!(%url, post_id = %id, authorized = token.is_some(), "Updating post");
        self.send_json(self.request(Method::PUT, url, token).json(body))
            .await
    }

    async fn delete(&self, id: &PostId, token: Option<&str>) -> Result<(), ApiError> {
        let url = self.endpoint(Some(id));
        debug!(%url, post_id = %id, authorized = token.is_some(), "Deleting post");
        self.send(self.request(Method::DELETE, url, token)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use httpmock::MockServer;
    use time::macros::date;

    use super::*;

    fn client(server: &MockServer) -> HttpPostsClient {
        HttpPostsClient::new(&server.url("/api"), None).expect("client")
    }

    fn body() -> PostBody {
        PostBody {
            date: date!(2024 - 05 - 04),
            title: "T".into(),
            description: "D".into(),
            content: "C".into(),
            tag: None,
        }
    }

    #[test]
    fn endpoints_append_to_the_base_path() {
        let with_slash = HttpPostsClient::new("http://localhost:8000/api/", None).expect("client");
        let without = HttpPostsClient::new("http://localhost:8000/api", None).expect("client");

        assert_eq!(
            with_slash.endpoint(None).as_str(),
            "http://localhost:8000/api/posts"
        );
        assert_eq!(
            without.endpoint(Some(&PostId::from(4))).as_str(),
            "http://localhost:8000/api/posts/4"
        );
    }

    #[test]
    fn ids_are_escaped_as_one_segment() {
        let client = HttpPostsClient::new("http://localhost:8000/api", None).expect("client");
        let url = client.endpoint(Some(&PostId::from("a/b")));
        assert_eq!(url.as_str(), "http://localhost:8000/api/posts/a%2Fb");
    }

    #[test]
    fn rejects_non_hierarchical_base() {
        let err = HttpPostsClient::new("mailto:someone@example.com", None).expect_err("base");
        assert!(matches!(err, ApiError::BaseUrl(_)));
    }

    #[tokio::test]
    async fn list_parses_posts() -> Result<(), ApiError> {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("GET").path("/api/posts");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"[{"id":1,"title":"One","date":"2024-01-01","description":"","content":"x","type":"Tech"}]"#);
        });

        let posts = client(&server).list().await?;
        mock.assert();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].tag.as_deref(), Some("Tech"));
        Ok(())
    }

    #[tokio::test]
    async fn create_sends_bearer_token_and_body() -> Result<(), ApiError> {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("POST")
                .path("/api/posts")
                .header("authorization", "Bearer secret")
                .json_body_includes(r#"{"title":"T","date":"2024-05-04","description":"D","content":"C"}"#);
            then.status(201)
                .header("content-type", "application/json")
                .body(r#"{"id":"abc","title":"T","date":"2024-05-04","description":"D","content":"C"}"#);
        });

        let post = client(&server).create(&body(), Some("secret")).await?;
        mock.assert();
        assert_eq!(post.id, Some(PostId::from("abc")));
        Ok(())
    }

    #[tokio::test]
    async fn update_without_token_sends_no_authorization() -> Result<(), ApiError> {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method("PUT")
                .path("/api/posts/9")
                .header_missing("authorization");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"id":9,"title":"T","date":"2024-05-04"}"#);
        });

        client(&server).update(&PostId::from(9), &body(), None).await?;
        mock.assert();
        Ok(())
    }

    #[tokio::test]
    async fn non_success_status_is_classified() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("DELETE").path("/api/posts/3");
            then.status(403).body("forbidden");
        });

        let err = client(&server)
            .delete(&PostId::from(3), Some("stale"))
            .await
            .expect_err("403");
        assert!(err.is_authorization());
        assert!(matches!(err, ApiError::Status { status: 403, ref body } if body == "forbidden"));
    }

    #[tokio::test]
    async fn malformed_json_is_a_decode_failure() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method("GET").path("/api/posts/1");
            then.status(200).body("<html>");
        });

        let err = client(&server)
            .get(&PostId::from(1))
            .await
            .expect_err("decode");
        assert!(matches!(err, ApiError::Decode(_)));
    }

    #[tokio::test]
    async fn unreachable_server_is_a_network_failure() {
        let client = HttpPostsClient::new("http://127.0.0.1:9/api", Some(Duration::from_secs(2)))
            .expect("client");
        let err = client.list().await.expect_err("network");
        assert!(matches!(err, ApiError::Network(_)));
    }
}
