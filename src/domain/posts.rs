use std::collections::BTreeSet;

use time::{Date, OffsetDateTime};
use writedesk_api_types::{Post, PostBody};

use super::error::DomainError;

/// Tag value that matches every post in the listing.
pub const ALL_TAGS: &str = "All";

/// Tag given to posts created without an explicit one.
pub const DEFAULT_TAG: &str = "Personal";

/// Starting document of a freshly opened post.
pub const NEW_POST_CONTENT: &str = "# New Post\n\nStart writing your post here...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagFilter<'a> {
    All,
    Tag(&'a str),
}

impl<'a> TagFilter<'a> {
    pub fn parse(tag: &'a str) -> Self {
        if tag == ALL_TAGS {
            Self::All
        } else {
            Self::Tag(tag)
        }
    }

    pub fn matches(&self, post: &Post) -> bool {
        match self {
            Self::All => true,
            Self::Tag(tag) => post.tag.as_deref() == Some(*tag),
        }
    }
}

/// Today's calendar date, in local time when the offset is known.
pub fn today() -> Date {
    OffsetDateTime::now_local()
        .unwrap_or_else(|_| OffsetDateTime::now_utc())
        .date()
}

/// The unsaved post a new-post session starts from.
pub fn template(date: Date, tag: Option<String>) -> Post {
    Post {
        id: None,
        title: String::new(),
        date,
        description: String::new(),
        content: NEW_POST_CONTENT.to_string(),
        tag,
    }
}

/// Newest first. Posts sharing a date keep their relative order.
pub fn sort_by_date_desc(posts: &mut [Post]) {
    posts.sort_by(|a, b| b.date.cmp(&a.date));
}

pub fn filter_by_tag<'p>(posts: &'p [Post], filter: TagFilter<'_>) -> Vec<&'p Post> {
    posts.iter().filter(|post| filter.matches(post)).collect()
}

/// `All` followed by each distinct tag in first-seen order.
pub fn tag_choices(posts: &[Post]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    let mut tags = vec![ALL_TAGS.to_string()];
    for tag in posts.iter().filter_map(|post| post.tag.as_deref()) {
        if tag != ALL_TAGS && seen.insert(tag) {
            tags.push(tag.to_string());
        }
    }
    tags
}

/// Creating a post requires a non-blank title.
pub fn validate_for_create(post: &Post) -> Result<(), DomainError> {
    if post.title.trim().is_empty() {
        return Err(DomainError::validation(
            "Please enter a title for your post.",
        ));
    }
    Ok(())
}

/// Build the request body from the editable fields and the current draft.
///
/// The tag travels only with create requests.
pub fn request_body(post: &Post, draft: &str, include_tag: bool) -> PostBody {
    PostBody {
        date: post.date,
        title: post.title.clone(),
        description: post.description.clone(),
        content: draft.to_string(),
        tag: if include_tag { post.tag.clone() } else { None },
    }
}

#[cfg(test)]
mod tests {
    use time::macros::date;
    use writedesk_api_types::PostId;

    use super::*;

    fn post(id: u64, date: Date, tag: Option<&str>) -> Post {
        Post {
            id: Some(PostId::from(id)),
            title: format!("post {id}"),
            date,
            description: String::new(),
            content: String::new(),
            tag: tag.map(str::to_string),
        }
    }

    fn ids(posts: &[&Post]) -> Vec<String> {
        posts
            .iter()
            .filter_map(|post| post.id.as_ref().map(ToString::to_string))
            .collect()
    }

    #[test]
    fn newest_posts_come_first() {
        let mut posts = vec![
            post(1, date!(2024 - 01 - 01), None),
            post(2, date!(2024 - 03 - 01), None),
        ];
        sort_by_date_desc(&mut posts);
        let refs: Vec<&Post> = posts.iter().collect();
        assert_eq!(ids(&refs), ["2", "1"]);
    }

    #[test]
    fn equal_dates_keep_server_order() {
        let mut posts = vec![
            post(1, date!(2024 - 02 - 01), None),
            post(2, date!(2024 - 02 - 01), None),
            post(3, date!(2024 - 05 - 01), None),
        ];
        sort_by_date_desc(&mut posts);
        let refs: Vec<&Post> = posts.iter().collect();
        assert_eq!(ids(&refs), ["3", "1", "2"]);
    }

    #[test]
    fn all_filter_returns_everything_and_tags_match_exactly() {
        let posts = vec![
            post(1, date!(2024 - 01 - 01), Some("Personal")),
            post(2, date!(2024 - 01 - 02), Some("Tech")),
            post(3, date!(2024 - 01 - 03), Some("tech")),
            post(4, date!(2024 - 01 - 04), None),
        ];

        assert_eq!(filter_by_tag(&posts, TagFilter::parse("All")).len(), 4);
        assert_eq!(
            ids(&filter_by_tag(&posts, TagFilter::parse("Tech"))),
            ["2"]
        );
        assert!(filter_by_tag(&posts, TagFilter::parse("Missing")).is_empty());
    }

    #[test]
    fn tag_choices_start_with_all_and_deduplicate() {
        let posts = vec![
            post(1, date!(2024 - 01 - 01), Some("Tech")),
            post(2, date!(2024 - 01 - 02), Some("Personal")),
            post(3, date!(2024 - 01 - 03), Some("Tech")),
            post(4, date!(2024 - 01 - 04), None),
        ];
        assert_eq!(tag_choices(&posts), ["All", "Tech", "Personal"]);
    }

    #[test]
    fn blank_titles_fail_validation() {
        let mut draft = template(date!(2024 - 06 - 01), None);
        draft.title = "   ".into();
        let err = validate_for_create(&draft).expect_err("blank title");
        assert_eq!(err.message(), "Please enter a title for your post.");

        draft.title = "Hello".into();
        assert!(validate_for_create(&draft).is_ok());
    }

    #[test]
    fn template_is_new_and_prefilled() {
        let draft = template(date!(2024 - 06 - 01), Some(DEFAULT_TAG.into()));
        assert!(draft.is_new());
        assert_eq!(draft.content, NEW_POST_CONTENT);
        assert_eq!(draft.tag.as_deref(), Some("Personal"));
    }

    #[test]
    fn request_body_uses_the_draft_not_the_stored_content() {
        let mut current = post(9, date!(2024 - 01 - 01), Some("Tech"));
        current.content = "stale".into();
        let body = request_body(&current, "fresh", false);
        assert_eq!(body.content, "fresh");
        assert_eq!(body.tag, None);

        let body = request_body(&current, "fresh", true);
        assert_eq!(body.tag.as_deref(), Some("Tech"));
    }
}
