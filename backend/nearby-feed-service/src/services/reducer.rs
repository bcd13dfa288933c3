//! Result reducer: validity, predicates, dedup, ordering, truncation.
//!
//! Pure CPU work over the raw union returned by the executor. The output does
//! not depend on the order in which chunks completed.

use crate::metrics::query::REDUCER_DROPPED_TOTAL;
use crate::models::{Post, RawDocument};
use crate::tokenizer::ParsedQuery;
use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::debug;

/// In-memory predicates derived from a tokenized search query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityFilters {
    /// Case-folded residual text
    pub text: Option<String>,
    /// Case-folded hashtags
    pub hashtags: Vec<String>,
    /// Case-preserved mentions
    pub mentions: Vec<String>,
    /// Case-folded location names
    pub locations: Vec<String>,
}

impl From<&ParsedQuery> for EntityFilters {
    fn from(parsed: &ParsedQuery) -> Self {
        Self {
            text: parsed.text.as_ref().map(|t| t.to_lowercase()),
            hashtags: parsed.hashtags.iter().map(|h| h.to_lowercase()).collect(),
            mentions: parsed.mentions.clone(),
            locations: parsed
                .locations
                .iter()
                .map(|l| l.name.to_lowercase())
                .collect(),
        }
    }
}

impl EntityFilters {
    pub fn is_empty(&self) -> bool {
        self.text.is_none()
            && self.hashtags.is_empty()
            && self.mentions.is_empty()
            && self.locations.is_empty()
    }

    /// Every present predicate must hold.
    pub fn matches(&self, post: &Post) -> bool {
        let content = post.content.to_lowercase();

        if let Some(text) = &self.text {
            let haystack = format!(
                "{}{}",
                post.username().unwrap_or_default().to_lowercase(),
                content
            );
            if !haystack.contains(text.as_str()) {
                return false;
            }
        }

        if !self.hashtags.is_empty()
            && !self
                .hashtags
                .iter()
                .any(|tag| post.entities.hashtags.contains(tag))
        {
            return false;
        }

        if !self.mentions.is_empty()
            && !self
                .mentions
                .iter()
                .any(|name| post.entities.mentions.contains(name))
        {
            return false;
        }

        self.locations
            .iter()
            .all(|location| content.contains(location.as_str()))
    }
}

/// Total order for the feed: newest first, then stable tie-breakers so that
/// equal timestamps never depend on arrival order.
pub fn feed_order(a: &Post, b: &Post) -> Ordering {
    b.time
        .cmp(&a.time)
        .then_with(|| a.message_id.cmp(&b.message_id))
        .then_with(|| a.owner_key.cmp(&b.owner_key))
        .then_with(|| {
            a.display_identity
                .dedup_key()
                .cmp(&b.display_identity.dedup_key())
        })
        .then_with(|| a.content.cmp(&b.content))
        .then_with(|| a.content_type.cmp(&b.content_type))
}

/// Reduce raw documents to at most `limit` visible posts.
///
/// Duplicates share `(display identity, messageId, time)`; the one that sorts
/// first is kept.
pub fn reduce(raw: Vec<RawDocument>, filters: Option<&EntityFilters>, limit: usize) -> Vec<Post> {
    let raw_count = raw.len();

    let mut posts: Vec<Post> = raw
        .into_iter()
        .filter_map(|doc| match Post::try_from(doc) {
            Ok(post) => Some(post),
            Err(reason) => {
                REDUCER_DROPPED_TOTAL
                    .with_label_values(&[reason.as_str()])
                    .inc();
                None
            }
        })
        .collect();
    let visible = posts.len();

    if let Some(filters) = filters.filter(|f| !f.is_empty()) {
        posts.retain(|post| filters.matches(post));
        let unmatched = visible - posts.len();
        if unmatched > 0 {
            REDUCER_DROPPED_TOTAL
                .with_label_values(&["predicate"])
                .inc_by(unmatched as u64);
        }
    }
    let matched = posts.len();

    posts.sort_by(feed_order);

    let mut seen = HashSet::new();
    posts.retain(|post| {
        let (identity, message_id, time) = post.dedup_key();
        seen.insert((identity, message_id.to_string(), time.to_string()))
    });
    let duplicates = matched - posts.len();
    if duplicates > 0 {
        REDUCER_DROPPED_TOTAL
            .with_label_values(&["duplicate"])
            .inc_by(duplicates as u64);
    }

    posts.truncate(limit);

    debug!(
        raw = raw_count,
        visible,
        matched,
        duplicates,
        returned = posts.len(),
        "Reduced candidates"
    );
    posts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Entities, IdentityLink};
    use crate::tokenizer;

    fn raw(owner: &str, id: &str, time: &str, username: &str, content: &str) -> RawDocument {
        RawDocument {
            owner_key: Some(owner.into()),
            message_id: Some(id.into()),
            time: Some(time.into()),
            username: Some(username.into()),
            content: Some(content.into()),
            entities: crate::tokenizer::entities::extract(content),
            ..Default::default()
        }
    }

    fn ids(posts: &[Post]) -> Vec<&str> {
        posts.iter().map(|p| p.message_id.as_str()).collect()
    }

    #[test]
    fn test_orders_newest_first_with_message_id_tie_break() {
        let docs = vec![
            raw("o1", "b", "2024-05-01T10:00:00Z", "alice", "x"),
            raw("o1", "c", "2024-05-02T10:00:00Z", "alice", "x"),
            raw("o1", "a", "2024-05-01T10:00:00Z", "alice", "x"),
        ];
        let posts = reduce(docs, None, 10);
        assert_eq!(ids(&posts), vec!["c", "a", "b"]);
    }

    #[test]
    fn test_drops_invisible_documents() {
        let mut ambiguous = raw("o1", "1", "2024-05-01T10:00:00Z", "alice", "x");
        ambiguous.identity_link = Some(IdentityLink {
            link_id: "l".into(),
            link_key: "k".into(),
        });
        let docs = vec![
            ambiguous,
            raw("o1", "2", "not a time", "alice", "x"),
            raw("o1", "3", "2024-05-01T10:00:00Z", "", "x"),
            raw("o1", "4", "2024-05-01T10:00:00Z", "alice", "x"),
        ];
        assert_eq!(ids(&reduce(docs, None, 10)), vec!["4"]);
    }

    #[test]
    fn test_dedup_is_arrival_order_independent() {
        let first = raw("o1", "1", "2024-05-01T10:00:00Z", "alice", "one");
        let second = raw("o2", "1", "2024-05-01T10:00:00Z", "alice", "two");

        let forward = reduce(vec![first.clone(), second.clone()], None, 10);
        let backward = reduce(vec![second, first], None, 10);
        assert_eq!(forward.len(), 1);
        assert_eq!(forward, backward);
        assert_eq!(forward[0].owner_key, "o1");
    }

    #[test]
    fn test_reduce_is_idempotent() {
        let docs = vec![
            raw("o1", "1", "2024-05-01T10:00:00Z", "alice", "x"),
            raw("o2", "2", "2024-05-03T10:00:00Z", "bob", "y"),
            raw("o2", "2", "2024-05-03T10:00:00Z", "bob", "y"),
        ];
        let mut doubled = docs.clone();
        doubled.extend(docs.clone());
        assert_eq!(reduce(docs, None, 10), reduce(doubled, None, 10));
    }

    #[test]
    fn test_truncates_to_limit() {
        let docs = (0..10)
            .map(|i| raw("o", &i.to_string(), &format!("2024-05-01T10:00:0{}Z", i), "u", "x"))
            .collect();
        let posts = reduce(docs, None, 3);
        assert_eq!(ids(&posts), vec!["9", "8", "7"]);
    }

    #[test]
    fn test_text_predicate_matches_username_or_content() {
        let docs = vec![
            raw("o1", "1", "2024-05-01T10:00:00Z", "TacoFan", "lunch"),
            raw("o2", "2", "2024-05-01T10:00:01Z", "bob", "Great TACOS here"),
            raw("o3", "3", "2024-05-01T10:00:02Z", "carol", "coffee"),
        ];
        let filters = EntityFilters::from(&tokenizer::parse("taco"));
        assert_eq!(ids(&reduce(docs, Some(&filters), 10)), vec!["2", "1"]);
    }

    #[test]
    fn test_text_predicate_spans_username_and_content_join() {
        let docs = vec![
            raw("o1", "1", "2024-05-01T10:00:00Z", "bob", "cat videos"),
            raw("o2", "2", "2024-05-01T10:00:01Z", "alice", "hello"),
        ];
        let filters = EntityFilters::from(&tokenizer::parse("bobcat"));
        assert_eq!(ids(&reduce(docs.clone(), Some(&filters), 10)), vec!["1"]);

        let filters = EntityFilters::from(&tokenizer::parse("alice hello"));
        assert!(reduce(docs, Some(&filters), 10).is_empty());
    }

    #[test]
    fn test_hashtag_and_mention_predicates_intersect() {
        let docs = vec![
            raw("o1", "1", "2024-05-01T10:00:00Z", "a", "#food with @Maria"),
            raw("o2", "2", "2024-05-01T10:00:01Z", "b", "#food alone"),
            raw("o3", "3", "2024-05-01T10:00:02Z", "c", "#drinks with @Maria"),
        ];
        let filters = EntityFilters::from(&tokenizer::parse("#Food @Maria"));
        assert_eq!(ids(&reduce(docs, Some(&filters), 10)), vec!["1"]);
    }

    #[test]
    fn test_location_predicate() {
        let docs = vec![
            raw("o1", "1", "2024-05-01T10:00:00Z", "a", "Sunny day at findlay market"),
            raw("o2", "2", "2024-05-01T10:00:01Z", "b", "Sunny day at the park"),
        ];
        let filters = EntityFilters::from(&tokenizer::parse("📍Findlay Market"));
        assert_eq!(ids(&reduce(docs, Some(&filters), 10)), vec!["1"]);
    }

    #[test]
    fn test_empty_filters_are_ignored() {
        let filters = EntityFilters::default();
        assert!(filters.is_empty());
        let docs = vec![raw("o1", "1", "2024-05-01T10:00:00Z", "a", "x")];
        assert_eq!(reduce(docs, Some(&filters), 10).len(), 1);
    }

    #[test]
    fn test_anonymous_text_match_uses_content() {
        let mut doc = raw("o1", "1", "2024-05-01T10:00:00Z", "", "quiet street");
        doc.username = None;
        doc.identity_link = Some(IdentityLink {
            link_id: "l".into(),
            link_key: "k".into(),
        });
        doc.entities = Entities::default();
        let filters = EntityFilters::from(&tokenizer::parse("quiet"));
        assert_eq!(reduce(vec![doc], Some(&filters), 10).len(), 1);
    }
}
