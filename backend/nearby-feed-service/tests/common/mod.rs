//! Shared fixtures: document builders and wrapper stores that count, fail
//! or stall membership queries on top of the in-memory store.
#![allow(dead_code)]

use async_trait::async_trait;
use nearby_feed_service::config::EngineConfig;
use nearby_feed_service::models::{DisplayIdentity, GeoSource, NewPost, RawDocument};
use nearby_feed_service::services::GeoFeedEngine;
use nearby_feed_service::spatial::SpatialConfig;
use nearby_feed_service::store::{
    DocumentStore, DocumentWriter, EqualityQuery, MembershipQuery, MemoryDocumentStore,
    StoreError, DEFAULT_COLLECTION,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Findlay Market, Cincinnati
pub const LAT: f64 = 39.1155;
pub const LNG: f64 = -84.5185;

/// Pioneer Courthouse Square, Portland
pub const FAR_LAT: f64 = 45.5189;
pub const FAR_LNG: f64 = -122.6793;

pub fn post_at(
    owner: &str,
    id: &str,
    time: &str,
    username: &str,
    content: &str,
    lat: f64,
    lng: f64,
) -> RawDocument {
    NewPost {
        owner_key: owner.to_string(),
        message_id: id.to_string(),
        content: content.to_string(),
        content_type: None,
        time: time.to_string(),
        media_ref: None,
        category: None,
        identity: DisplayIdentity::Username(username.to_string()),
        geo: Some(GeoSource::Coordinates { lat, lng }),
    }
    .into_document()
    .expect("fixture coordinates are valid")
}

pub fn post_here(owner: &str, id: &str, time: &str, username: &str, content: &str) -> RawDocument {
    post_at(owner, id, time, username, content, LAT, LNG)
}

/// Document keyed directly by a district token, for executor-level tests.
pub fn doc_in_cell(id: &str, time: &str, cell: &str) -> RawDocument {
    RawDocument {
        owner_key: Some("owner".to_string()),
        message_id: Some(id.to_string()),
        time: Some(time.to_string()),
        username: Some("user".to_string()),
        content: Some(format!("post {}", id)),
        geo: [("r7".to_string(), cell.to_string())].into_iter().collect(),
        ..Default::default()
    }
}

pub async fn memory_store(docs: Vec<RawDocument>) -> Arc<MemoryDocumentStore> {
    let store = Arc::new(MemoryDocumentStore::default());
    for doc in docs {
        store
            .upsert(DEFAULT_COLLECTION, doc)
            .await
            .expect("fixture documents carry keys");
    }
    store
}

pub fn engine(store: Arc<dyn DocumentStore>) -> GeoFeedEngine {
    GeoFeedEngine::new(store, EngineConfig::default(), SpatialConfig::default())
}

/// Records every membership and equality query it forwards.
pub struct CountingStore {
    pub inner: Arc<MemoryDocumentStore>,
    pub membership_calls: AtomicUsize,
    pub equality_calls: AtomicUsize,
    pub max_tokens_seen: AtomicUsize,
}

impl CountingStore {
    pub fn new(inner: Arc<MemoryDocumentStore>) -> Self {
        Self {
            inner,
            membership_calls: AtomicUsize::new(0),
            equality_calls: AtomicUsize::new(0),
            max_tokens_seen: AtomicUsize::new(0),
        }
    }

    pub fn membership_calls(&self) -> usize {
        self.membership_calls.load(Ordering::SeqCst)
    }

    pub fn equality_calls(&self) -> usize {
        self.equality_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentStore for CountingStore {
    fn max_membership_tokens(&self) -> usize {
        self.inner.max_membership_tokens()
    }

    async fn query_membership(
        &self,
        query: &MembershipQuery,
    ) -> Result<Vec<RawDocument>, StoreError> {
        self.membership_calls.fetch_add(1, Ordering::SeqCst);
        self.max_tokens_seen
            .fetch_max(query.tokens.len(), Ordering::SeqCst);
        self.inner.query_membership(query).await
    }

    async fn query_equality(&self, query: &EqualityQuery) -> Result<Vec<RawDocument>, StoreError> {
        self.equality_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.query_equality(query).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }
}

/// Fails any membership query that carries a poisoned token.
pub struct FailingStore {
    pub inner: Arc<MemoryDocumentStore>,
    pub poisoned: HashSet<String>,
    pub fail_everything: bool,
}

impl FailingStore {
    pub fn poisoned(inner: Arc<MemoryDocumentStore>, tokens: &[&str]) -> Self {
        Self {
            inner,
            poisoned: tokens.iter().map(|t| t.to_string()).collect(),
            fail_everything: false,
        }
    }

    pub fn down(inner: Arc<MemoryDocumentStore>) -> Self {
        Self {
            inner,
            poisoned: HashSet::new(),
            fail_everything: true,
        }
    }
}

#[async_trait]
impl DocumentStore for FailingStore {
    fn max_membership_tokens(&self) -> usize {
        self.inner.max_membership_tokens()
    }

    async fn query_membership(
        &self,
        query: &MembershipQuery,
    ) -> Result<Vec<RawDocument>, StoreError> {
        if self.fail_everything || query.tokens.iter().any(|t| self.poisoned.contains(t)) {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        self.inner.query_membership(query).await
    }

    async fn query_equality(&self, query: &EqualityQuery) -> Result<Vec<RawDocument>, StoreError> {
        if self.fail_everything {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        self.inner.query_equality(query).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.fail_everything {
            return Err(StoreError::Unavailable("injected failure".to_string()));
        }
        self.inner.ping().await
    }
}

/// Stalls membership queries that carry a slow token.
pub struct SlowStore {
    pub inner: Arc<MemoryDocumentStore>,
    pub slow: HashSet<String>,
    pub delay: Duration,
}

impl SlowStore {
    pub fn new(inner: Arc<MemoryDocumentStore>, tokens: &[&str], delay: Duration) -> Self {
        Self {
            inner,
            slow: tokens.iter().map(|t| t.to_string()).collect(),
            delay,
        }
    }
}

#[async_trait]
impl DocumentStore for SlowStore {
    fn max_membership_tokens(&self) -> usize {
        self.inner.max_membership_tokens()
    }

    async fn query_membership(
        &self,
        query: &MembershipQuery,
    ) -> Result<Vec<RawDocument>, StoreError> {
        if query.tokens.iter().any(|t| self.slow.contains(t)) {
            tokio::time::sleep(self.delay).await;
        }
        self.inner.query_membership(query).await
    }

    async fn query_equality(&self, query: &EqualityQuery) -> Result<Vec<RawDocument>, StoreError> {
        self.inner.query_equality(query).await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.inner.ping().await
    }
}
