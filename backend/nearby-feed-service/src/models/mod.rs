/// Data models for nearby-feed-service
///
/// - `RawDocument`: loosely shaped post payload as the document store returns it
/// - `Post`: validated read model, the only shape handed to HTTP callers
/// - `DisplayIdentity`: public username or anonymous identity link
/// - `NewPost`: write-time builder that derives geo tokens and entities
pub mod new_post;

pub use new_post::{GeoSource, NewPost};

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Entities derived from post content at write time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entities {
    /// Case-folded hashtags
    #[serde(default)]
    pub hashtags: BTreeSet<String>,
    /// Case-preserved mentions
    #[serde(default)]
    pub mentions: BTreeSet<String>,
    #[serde(default)]
    pub urls: Vec<String>,
}

/// Anonymous identity-link pair used instead of a public username.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityLink {
    pub link_id: String,
    pub link_key: String,
}

/// Post payload as stored. Every field is optional so that malformed
/// documents decode and are rejected by `Post::try_from` instead of failing
/// the whole chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDocument {
    pub owner_key: Option<String>,
    pub message_id: Option<String>,
    pub content: Option<String>,
    pub content_type: Option<String>,
    pub time: Option<String>,
    pub media_ref: Option<String>,
    pub category: Option<String>,
    /// Store field name (`r5`, `r7`, `r9`) to cell token
    #[serde(default)]
    pub geo: BTreeMap<String, String>,
    #[serde(default)]
    pub entities: Entities,
    pub username: Option<String>,
    pub identity_link: Option<IdentityLink>,
}

impl RawDocument {
    pub fn from_value(value: serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Composite upsert/delete key `ownerKey:messageId`.
    pub fn composite_key(&self) -> Option<(String, String)> {
        match (non_blank(&self.owner_key), non_blank(&self.message_id)) {
            (Some(owner), Some(message)) => Some((owner.to_string(), message.to_string())),
            _ => None,
        }
    }
}

/// The public attribution of a post.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum DisplayIdentity {
    Username(String),
    IdentityLink(IdentityLink),
}

impl DisplayIdentity {
    pub fn dedup_key(&self) -> String {
        match self {
            DisplayIdentity::Username(name) => format!("u:{}", name),
            DisplayIdentity::IdentityLink(link) => format!("a:{}:{}", link.link_id, link.link_key),
        }
    }

    pub fn username(&self) -> Option<&str> {
        match self {
            DisplayIdentity::Username(name) => Some(name),
            DisplayIdentity::IdentityLink(_) => None,
        }
    }
}

/// Why a stored document is hidden from every read path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invisible {
    MissingKey,
    MissingIdentity,
    AmbiguousIdentity,
    InvalidTime,
}

impl Invisible {
    pub fn as_str(&self) -> &'static str {
        match self {
            Invisible::MissingKey => "missing_key",
            Invisible::MissingIdentity => "missing_identity",
            Invisible::AmbiguousIdentity => "ambiguous_identity",
            Invisible::InvalidTime => "invalid_time",
        }
    }
}

impl fmt::Display for Invisible {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated post, as returned by `/feed` and `/search`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub owner_key: String,
    pub message_id: String,
    pub content: String,
    pub content_type: String,
    pub time: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_ref: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    pub geo_tokens: BTreeMap<String, String>,
    pub entities: Entities,
    #[serde(flatten)]
    pub display_identity: DisplayIdentity,
}

impl Post {
    pub fn dedup_key(&self) -> (String, &str, &str) {
        (
            self.display_identity.dedup_key(),
            self.message_id.as_str(),
            self.time.as_str(),
        )
    }

    pub fn username(&self) -> Option<&str> {
        self.display_identity.username()
    }
}

impl TryFrom<RawDocument> for Post {
    type Error = Invisible;

    fn try_from(doc: RawDocument) -> Result<Self, Self::Error> {
        let (owner_key, message_id) = doc.composite_key().ok_or(Invisible::MissingKey)?;

        let username = non_blank(&doc.username).map(str::to_string);
        let link = doc
            .identity_link
            .filter(|link| !link.link_id.trim().is_empty() && !link.link_key.trim().is_empty());
        let display_identity = match (username, link) {
            (Some(name), None) => DisplayIdentity::Username(name),
            (None, Some(link)) => DisplayIdentity::IdentityLink(link),
            (Some(_), Some(_)) => return Err(Invisible::AmbiguousIdentity),
            (None, None) => return Err(Invisible::MissingIdentity),
        };

        let time = doc.time.ok_or(Invisible::InvalidTime)?;
        if !is_valid_time(&time) {
            return Err(Invisible::InvalidTime);
        }

        Ok(Post {
            owner_key,
            message_id,
            content: doc.content.unwrap_or_default(),
            content_type: doc
                .content_type
                .unwrap_or_else(|| "text/plain".to_string()),
            time,
            media_ref: doc.media_ref,
            category: doc.category,
            geo_tokens: doc.geo,
            entities: doc.entities,
            display_identity,
        })
    }
}

/// ISO-8601 timestamps as produced by clients (RFC 3339 profile).
pub fn is_valid_time(time: &str) -> bool {
    DateTime::parse_from_rfc3339(time).is_ok()
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Response body for `/feed` and `/search`.
#[derive(Debug, Serialize)]
pub struct PostsResponse {
    pub posts: Vec<Post>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> RawDocument {
        RawDocument {
            owner_key: Some("owner-1".into()),
            message_id: Some("m-1".into()),
            content: Some("hello".into()),
            time: Some("2024-05-01T12:00:00Z".into()),
            username: Some("alice".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_visible_document_converts() {
        let post = Post::try_from(doc()).unwrap();
        assert_eq!(post.username(), Some("alice"));
        assert_eq!(post.content_type, "text/plain");
    }

    #[test]
    fn test_missing_identity_is_invisible() {
        let mut raw = doc();
        raw.username = Some("   ".into());
        assert_eq!(Post::try_from(raw), Err(Invisible::MissingIdentity));
    }

    #[test]
    fn test_both_identities_are_ambiguous() {
        let mut raw = doc();
        raw.identity_link = Some(IdentityLink {
            link_id: "l".into(),
            link_key: "k".into(),
        });
        assert_eq!(Post::try_from(raw), Err(Invisible::AmbiguousIdentity));
    }

    #[test]
    fn test_anonymous_identity_is_visible() {
        let mut raw = doc();
        raw.username = None;
        raw.identity_link = Some(IdentityLink {
            link_id: "link".into(),
            link_key: "key".into(),
        });
        let post = Post::try_from(raw).unwrap();
        assert_eq!(post.display_identity.dedup_key(), "a:link:key");
        assert_eq!(post.username(), None);
    }

    #[test]
    fn test_invalid_time_is_invisible() {
        let mut raw = doc();
        raw.time = Some("yesterday".into());
        assert_eq!(Post::try_from(raw), Err(Invisible::InvalidTime));

        let mut raw = doc();
        raw.time = None;
        assert_eq!(Post::try_from(raw), Err(Invisible::InvalidTime));
    }

    #[test]
    fn test_missing_key_is_invisible() {
        let mut raw = doc();
        raw.message_id = None;
        assert_eq!(Post::try_from(raw), Err(Invisible::MissingKey));
    }

    #[test]
    fn test_loose_payload_decodes() {
        let value = serde_json::json!({
            "ownerKey": "o",
            "messageId": "m",
            "time": "2024-01-01T00:00:00Z",
            "geo": {"r7": "872a1072bffffff"},
            "entities": {"hashtags": ["food"]},
            "unexpected": 42
        });
        let raw = RawDocument::from_value(value).unwrap();
        assert_eq!(raw.geo.get("r7").map(String::as_str), Some("872a1072bffffff"));
        assert!(raw.entities.hashtags.contains("food"));
        assert!(raw.username.is_none());
    }

    #[test]
    fn test_post_serializes_flat_identity() {
        let post = Post::try_from(doc()).unwrap();
        let json = serde_json::to_value(&post).unwrap();
        assert_eq!(json["username"], "alice");
        assert_eq!(json["messageId"], "m-1");
        assert!(json.get("mediaRef").is_none());
    }
}
