//! Wire types for the writedesk posts API.
//!
//! These mirror the JSON representations served under `/posts` and are
//! shared between the HTTP client, the session cache and tests.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::Date;

/// Server-assigned post identifier.
///
/// The API has served both numeric and string identifiers; both are accepted
/// and kept in their textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PostId(String);

impl PostId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PostId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for PostId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<u64> for PostId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl Serialize for PostId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for PostId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Number(u64),
            Text(String),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Number(value) => Self::from(value),
            RawId::Text(value) => Self(value),
        })
    }
}

/// ISO calendar dates (`YYYY-MM-DD`).
///
/// Deserialization also accepts full ISO timestamps and keeps only the date part.
pub mod iso_date {
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _, ser::Error as _};
    use time::{Date, format_description::FormatItem, macros::format_description};

    pub const FORMAT: &[FormatItem<'static>] = format_description!("[year]-[month]-[day]");

    pub fn parse(raw: &str) -> Result<Date, time::error::Parse> {
        let trimmed = raw.trim();
        let head = trimmed.get(..10).unwrap_or(trimmed);
        Date::parse(head, FORMAT)
    }

    pub fn format(date: Date) -> Result<String, time::error::Format> {
        date.format(FORMAT)
    }

    pub fn serialize<S: Serializer>(date: &Date, serializer: S) -> Result<S::Ok, S::Error> {
        let text = format(*date).map_err(S::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Date, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(D::Error::custom)
    }
}

/// A blog entry as served by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<PostId>,
    #[serde(default)]
    pub title: String,
    #[serde(with = "iso_date")]
    pub date: Date,
    #[serde(default)]
    pub description: String,
    /// Markdown document text. Empty when the server omitted it.
    #[serde(default)]
    pub content: String,
    /// Single listing tag, `type` on the wire.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl Post {
    /// A post is new until the server assigns it an identifier.
    pub fn is_new(&self) -> bool {
        self.id.is_none()
    }
}

/// Request body for `POST /posts` and `PUT /posts/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostBody {
    #[serde(with = "iso_date")]
    pub date: Date,
    pub title: String,
    pub description: String,
    pub content: String,
    /// Only sent on create.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}
