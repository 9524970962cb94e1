//! Session cache keys.
//!
//! The storage names are shared with other views of the same session, so they
//! are kept stable.

use std::fmt;

use writedesk_api_types::PostId;

const POST_PREFIX: &str = "lastVisitedPost_";
const POST_LIST: &str = "cachedPosts";
const ACTIVE_TAG: &str = "activeTag";
const LAST_VISITED_POST: &str = "lastVisitedPost";
const RECENT_POSTS: &str = "recentPosts";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// One post, as last fetched or saved.
    Post(PostId),
    /// The full post collection, sorted newest first.
    PostList,
    /// Tag selected in the listing.
    ActiveTag,
    /// Id of the post most recently opened.
    LastVisitedPost,
    /// Ids of the cached posts, least recently used first.
    RecentPosts,
}

impl CacheKey {
    pub fn storage_key(&self) -> String {
        match self {
            Self::Post(id) => format!("{POST_PREFIX}{id}"),
            Self::PostList => POST_LIST.to_string(),
            Self::ActiveTag => ACTIVE_TAG.to_string(),
            Self::LastVisitedPost => LAST_VISITED_POST.to_string(),
            Self::RecentPosts => RECENT_POSTS.to_string(),
        }
    }

    /// The post id behind a post entry's storage key.
    pub fn post_id(storage_key: &str) -> Option<PostId> {
        storage_key
            .strip_prefix(POST_PREFIX)
            .filter(|id| !id.is_empty())
            .map(PostId::from)
    }

    /// Label used in logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Post(_) => "post",
            Self::PostList => "post_list",
            Self::ActiveTag => "active_tag",
            Self::LastVisitedPost => "last_visited_post",
            Self::RecentPosts => "recent_posts",
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_key())
    }
}
