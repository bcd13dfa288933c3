//! Document store abstraction.
//!
//! The engine only needs two query shapes: membership of one indexed field in
//! a bounded token set (optionally narrowed by one equality filter), and a
//! single equality lookup. Both sort by `time` descending.

pub mod memory;
pub mod postgres;

pub use memory::MemoryDocumentStore;
pub use postgres::PgDocumentStore;

use crate::config::{StoreBackend, StoreConfig};
use crate::models::RawDocument;
use crate::spatial::Tier;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Default collection holding post documents.
pub const DEFAULT_COLLECTION: &str = "posts";

/// Document fields the store can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexedField {
    /// `geo.<r5|r7|r9>` cell token
    GeoCell(Tier),
    /// Case-folded `entities.hashtags`; multi-valued
    Hashtags,
    Username,
}

impl IndexedField {
    /// Dotted document path, for logs.
    pub fn path(&self) -> String {
        match self {
            IndexedField::GeoCell(tier) => format!("geo.{}", tier.field()),
            IndexedField::Hashtags => "entities.hashtags".to_string(),
            IndexedField::Username => "username".to_string(),
        }
    }

    /// Values of this field carried by `doc`.
    pub fn values<'a>(&self, doc: &'a RawDocument) -> Vec<&'a str> {
        match self {
            IndexedField::GeoCell(tier) => doc
                .geo
                .get(tier.field())
                .map(String::as_str)
                .into_iter()
                .collect(),
            IndexedField::Hashtags => doc.entities.hashtags.iter().map(String::as_str).collect(),
            IndexedField::Username => doc.username.as_deref().into_iter().collect(),
        }
    }
}

impl fmt::Display for IndexedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Byte-lexicographic `time`, newest first
    #[default]
    TimeDesc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EqualityFilter {
    pub field: IndexedField,
    pub value: String,
}

impl EqualityFilter {
    pub fn matches(&self, doc: &RawDocument) -> bool {
        self.field.values(doc).contains(&self.value.as_str())
    }
}

/// `field IN tokens [AND equality] ORDER BY sort LIMIT limit`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MembershipQuery {
    pub collection: String,
    pub field: IndexedField,
    pub tokens: Vec<String>,
    pub equality: Option<EqualityFilter>,
    pub sort: SortOrder,
    pub limit: usize,
}

impl MembershipQuery {
    pub fn matches(&self, doc: &RawDocument) -> bool {
        let hit = self
            .field
            .values(doc)
            .iter()
            .any(|value| self.tokens.iter().any(|token| token == value));
        hit && self.equality.as_ref().map_or(true, |eq| eq.matches(doc))
    }
}

/// `filter ORDER BY sort LIMIT limit`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EqualityQuery {
    pub collection: String,
    pub filter: EqualityFilter,
    pub sort: SortOrder,
    pub limit: usize,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("membership query has {count} tokens, store accepts at most {max}")]
    TooManyTokens { count: usize, max: usize },

    #[error("document is missing ownerKey or messageId")]
    MissingKey,

    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("document decode failed: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Read side of the document store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Largest token set a single membership query may carry.
    fn max_membership_tokens(&self) -> usize;

    async fn query_membership(&self, query: &MembershipQuery)
        -> Result<Vec<RawDocument>, StoreError>;

    async fn query_equality(&self, query: &EqualityQuery) -> Result<Vec<RawDocument>, StoreError>;

    /// Liveness probe for `/health`.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Write side, keyed by `ownerKey:messageId`. Both operations are idempotent.
#[async_trait]
pub trait DocumentWriter: Send + Sync {
    async fn upsert(&self, collection: &str, doc: RawDocument) -> Result<(), StoreError>;

    /// Returns whether a document was removed.
    async fn delete(
        &self,
        collection: &str,
        owner_key: &str,
        message_id: &str,
    ) -> Result<bool, StoreError>;
}

/// Store handles for the configured backend. Both sides share one instance.
pub struct StoreHandles {
    pub reader: Arc<dyn DocumentStore>,
    pub writer: Arc<dyn DocumentWriter>,
}

/// Connect the configured backend, running migrations for Postgres.
pub async fn connect(config: &StoreConfig) -> Result<StoreHandles, StoreError> {
    match config.backend {
        StoreBackend::Postgres => {
            let store = Arc::new(
                PgDocumentStore::connect(&config.database_url, config.max_connections).await?,
            );
            store.migrate().await?;
            info!(collection = %config.collection, "Using Postgres document store");
            Ok(StoreHandles {
                reader: store.clone(),
                writer: store,
            })
        }
        StoreBackend::Memory => {
            let store = Arc::new(MemoryDocumentStore::default());
            info!(collection = %config.collection, "Using in-memory document store");
            Ok(StoreHandles {
                reader: store.clone(),
                writer: store,
            })
        }
    }
}

/// Upsert every document of a JSON array file. Returns the number written.
pub async fn seed_from_file(
    writer: &dyn DocumentWriter,
    collection: &str,
    path: &str,
) -> Result<usize, StoreError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| StoreError::Unavailable(format!("failed to read seed file {}: {}", path, e)))?;
    let docs: Vec<RawDocument> = serde_json::from_str(&raw)?;
    let count = docs.len();
    for doc in docs {
        writer.upsert(collection, doc).await?;
    }
    info!(count, path, "Seeded document store");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Entities;

    fn doc() -> RawDocument {
        let mut entities = Entities::default();
        entities.hashtags.insert("food".into());
        RawDocument {
            username: Some("alice".into()),
            geo: [("r7".to_string(), "872a1072bffffff".to_string())]
                .into_iter()
                .collect(),
            entities,
            ..Default::default()
        }
    }

    #[test]
    fn test_field_values() {
        let doc = doc();
        assert_eq!(
            IndexedField::GeoCell(Tier::District).values(&doc),
            vec!["872a1072bffffff"]
        );
        assert!(IndexedField::GeoCell(Tier::Metro).values(&doc).is_empty());
        assert_eq!(IndexedField::Hashtags.values(&doc), vec!["food"]);
        assert_eq!(IndexedField::Username.values(&doc), vec!["alice"]);
    }

    #[test]
    fn test_membership_with_equality() {
        let mut query = MembershipQuery {
            collection: DEFAULT_COLLECTION.into(),
            field: IndexedField::Hashtags,
            tokens: vec!["drinks".into(), "food".into()],
            equality: Some(EqualityFilter {
                field: IndexedField::Username,
                value: "alice".into(),
            }),
            sort: SortOrder::TimeDesc,
            limit: 10,
        };
        assert!(query.matches(&doc()));

        query.equality = Some(EqualityFilter {
            field: IndexedField::Username,
            value: "bob".into(),
        });
        assert!(!query.matches(&doc()));
    }

    #[test]
    fn test_field_path() {
        assert_eq!(IndexedField::GeoCell(Tier::Neighborhood).to_string(), "geo.r9");
        assert_eq!(IndexedField::Hashtags.path(), "entities.hashtags");
    }
}
