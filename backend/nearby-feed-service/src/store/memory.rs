use super::{
    DocumentStore, DocumentWriter, EqualityQuery, MembershipQuery, SortOrder, StoreError,
};
use crate::models::RawDocument;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

type Collection = BTreeMap<(String, String), RawDocument>;

/// In-process document store. Used for `STORE_BACKEND=memory` and tests.
///
/// Enforces the same membership ceiling as a hosted document store would, so
/// the executor's chunking is exercised end to end.
pub struct MemoryDocumentStore {
    collections: RwLock<HashMap<String, Collection>>,
    max_membership_tokens: usize,
}

impl MemoryDocumentStore {
    pub fn new(max_membership_tokens: usize) -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            max_membership_tokens,
        }
    }

    pub async fn len(&self, collection: &str) -> usize {
        self.collections
            .read()
            .await
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    pub async fn is_empty(&self, collection: &str) -> bool {
        self.len(collection).await == 0
    }

    async fn select<F>(
        &self,
        collection: &str,
        sort: SortOrder,
        limit: usize,
        keep: F,
    ) -> Vec<RawDocument>
    where
        F: Fn(&RawDocument) -> bool,
    {
        let guard = self.collections.read().await;
        let Some(docs) = guard.get(collection) else {
            return Vec::new();
        };

        let mut matched: Vec<RawDocument> =
            docs.values().filter(|doc| keep(doc)).cloned().collect();
        match sort {
            SortOrder::TimeDesc => matched.sort_by(|a, b| b.time.cmp(&a.time)),
        }
        matched.truncate(limit);
        matched
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new(30)
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    fn max_membership_tokens(&self) -> usize {
        self.max_membership_tokens
    }

    async fn query_membership(
        &self,
        query: &MembershipQuery,
    ) -> Result<Vec<RawDocument>, StoreError> {
        if query.tokens.len() > self.max_membership_tokens {
            return Err(StoreError::TooManyTokens {
                count: query.tokens.len(),
                max: self.max_membership_tokens,
            });
        }
        Ok(self
            .select(&query.collection, query.sort, query.limit, |doc| query.matches(doc))
            .await)
    }

    async fn query_equality(&self, query: &EqualityQuery) -> Result<Vec<RawDocument>, StoreError> {
        Ok(self
            .select(&query.collection, query.sort, query.limit, |doc| {
                query.filter.matches(doc)
            })
            .await)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[async_trait]
impl DocumentWriter for MemoryDocumentStore {
    async fn upsert(&self, collection: &str, doc: RawDocument) -> Result<(), StoreError> {
        let key = doc.composite_key().ok_or(StoreError::MissingKey)?;
        self.collections
            .write()
            .await
            .entry(collection.to_string())
            .or_default()
            .insert(key, doc);
        Ok(())
    }

    async fn delete(
        &self,
        collection: &str,
        owner_key: &str,
        message_id: &str,
    ) -> Result<bool, StoreError> {
        let mut guard = self.collections.write().await;
        let removed = guard
            .get_mut(collection)
            .and_then(|docs| docs.remove(&(owner_key.to_string(), message_id.to_string())))
            .is_some();
        Ok(removed)
    }
}
