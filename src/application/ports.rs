//! Collaborator traits the controllers depend on.

use std::fmt;

use async_trait::async_trait;
use writedesk_api_types::{Post, PostBody, PostId};

use super::error::ApiError;

/// CRUD access to the posts resource.
///
/// Mutating calls take the bearer token, if one is held, and attach it as an
/// `Authorization` header. Implementations never retry.
#[async_trait]
pub trait PostsApi: Send + Sync {
    async fn list(&self) -> Result<Vec<Post>, ApiError>;

    async fn get(&self, id: &PostId) -> Result<Post, ApiError>;

    async fn create(&self, body: &PostBody, token: Option<&str>) -> Result<Post, ApiError>;

    async fn update(
        &self,
        id: &PostId,
        body: &PostBody,
        token: Option<&str>,
    ) -> Result<Post, ApiError>;

    async fn delete(&self, id: &PostId, token: Option<&str>) -> Result<(), ApiError>;
}

/// Places the shell can show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    Listing,
    NewPost,
    Post(PostId),
    Login,
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Listing => f.write_str("/"),
            Self::NewPost => f.write_str("/writing/new"),
            Self::Post(id) => write!(f, "/writing/{id}"),
            Self::Login => f.write_str("/login"),
        }
    }
}

pub trait Navigator: Send + Sync {
    /// `replace` swaps the current history entry instead of pushing one.
    fn navigate(&self, route: Route, replace: bool);
}

pub trait Confirmer: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

/// A user-visible message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notice: Notice);
}
