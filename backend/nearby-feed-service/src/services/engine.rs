//! Query orchestration for `/feed` and `/search`.

use crate::config::EngineConfig;
use crate::error::{AppError, Result};
use crate::metrics::query::{RAW_CANDIDATES, REQUESTS_TOTAL, REQUEST_DURATION_SECONDS};
use crate::models::{Post, RawDocument};
use crate::services::executor::{ChunkedQuery, ChunkedQueryExecutor};
use crate::services::reducer::{reduce, EntityFilters};
use crate::spatial::{resolve_area, AreaRequest, ResolvedArea, SpatialConfig, SpatialError};
use crate::store::{
    DocumentStore, EqualityFilter, EqualityQuery, IndexedField, SortOrder, StoreError,
    DEFAULT_COLLECTION,
};
use crate::tokenizer::{self, ParsedQuery};
use resilience::{with_timeout, Deadline};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 100;
pub const DEFAULT_MAX_SCAN: usize = 500;
pub const MIN_MAX_SCAN: usize = 50;
pub const MAX_MAX_SCAN: usize = 2_000;
pub const QUERY_MIN_CHARS: usize = 2;
pub const QUERY_MAX_CHARS: usize = 80;

#[derive(Debug, Clone, Default)]
pub struct FeedRequest {
    pub area: AreaRequest,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    pub q: String,
    pub area: AreaRequest,
    pub limit: Option<usize>,
    pub max_scan: Option<usize>,
}

/// Execution path chosen for a search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchPath {
    /// Exact `@name` answered by an equality lookup
    Fast,
    /// Area membership plus in-memory predicates
    Slow,
    /// Hashtag membership plus in-memory predicates, no area
    Hashtag,
}

impl SearchPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchPath::Fast => "search_fast",
            SearchPath::Slow => "search_slow",
            SearchPath::Hashtag => "search_hashtag",
        }
    }
}

pub fn clamp_limit(limit: Option<usize>) -> usize {
    limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
}

pub fn clamp_max_scan(max_scan: Option<usize>) -> usize {
    max_scan
        .unwrap_or(DEFAULT_MAX_SCAN)
        .clamp(MIN_MAX_SCAN, MAX_MAX_SCAN)
}

/// Stateless query engine. Each call owns its own fan-out and deadline.
pub struct GeoFeedEngine {
    executor: ChunkedQueryExecutor,
    config: EngineConfig,
    spatial: SpatialConfig,
    collection: String,
}

impl GeoFeedEngine {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        config: EngineConfig,
        spatial: SpatialConfig,
    ) -> Self {
        let executor =
            ChunkedQueryExecutor::new(store, config.max_membership_tokens, config.concurrency);
        Self {
            executor,
            config,
            spatial,
            collection: DEFAULT_COLLECTION.to_string(),
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn executor(&self) -> &ChunkedQueryExecutor {
        &self.executor
    }

    /// Store reachability, bounded by the request deadline.
    pub async fn ping(&self) -> std::result::Result<(), StoreError> {
        with_timeout(self.config.deadline(), self.executor.store().ping())
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?
    }

    /// Latest visible posts in the requested area.
    pub async fn feed(&self, request: &FeedRequest) -> Result<Vec<Post>> {
        let timer = REQUEST_DURATION_SECONDS
            .with_label_values(&["feed"])
            .start_timer();
        REQUESTS_TOTAL.with_label_values(&["feed"]).inc();

        let area = resolve_area(&request.area, &self.spatial)?.ok_or(SpatialError::NoLocation)?;
        let limit = clamp_limit(request.limit);
        let deadline = Deadline::after(self.config.deadline());

        let raw = self
            .area_candidates(&area, None, self.config.per_chunk_limit(limit), &deadline)
            .await?;
        RAW_CANDIDATES
            .with_label_values(&["feed"])
            .observe(raw.len() as f64);

        let posts = reduce(raw, None, limit);
        timer.observe_duration();

        debug!(
            tier = %area.tier,
            cells = area.len(),
            returned = posts.len(),
            "Feed query served"
        );
        Ok(posts)
    }

    /// Free-text search, optionally scoped to an area.
    pub async fn search(&self, request: &SearchRequest) -> Result<Vec<Post>> {
        let q = request.q.trim();
        let chars = q.chars().count();
        if !(QUERY_MIN_CHARS..=QUERY_MAX_CHARS).contains(&chars) {
            return Err(AppError::InvalidRequest(format!(
                "q must be between {} and {} characters",
                QUERY_MIN_CHARS, QUERY_MAX_CHARS
            )));
        }

        let parsed = tokenizer::parse(q);
        let area = resolve_area(&request.area, &self.spatial)?;
        let path = choose_path(&parsed, area.as_ref())?;

        let timer = REQUEST_DURATION_SECONDS
            .with_label_values(&[path.as_str()])
            .start_timer();
        REQUESTS_TOTAL.with_label_values(&[path.as_str()]).inc();

        let limit = clamp_limit(request.limit);
        let max_scan = clamp_max_scan(request.max_scan);
        let deadline = Deadline::after(self.config.deadline());

        debug!(
            path = path.as_str(),
            hashtags = ?parsed.hashtags,
            mentions = ?parsed.mentions,
            locations = parsed.locations.len(),
            has_text = parsed.text.is_some(),
            "Search query tokenized"
        );

        let posts = match (path, area.as_ref(), parsed.exact_username()) {
            (SearchPath::Fast, area, Some(username)) => {
                let filter = EqualityFilter {
                    field: IndexedField::Username,
                    value: username.to_string(),
                };
                let per_chunk = self.config.per_chunk_limit(limit);
                let raw = match area {
                    Some(area) => {
                        self.area_candidates(area, Some(filter), per_chunk, &deadline)
                            .await?
                    }
                    None => {
                        let query = EqualityQuery {
                            collection: self.collection.clone(),
                            filter,
                            sort: SortOrder::TimeDesc,
                            limit: per_chunk,
                        };
                        self.executor.execute_equality(&query, &deadline).await?
                    }
                };
                RAW_CANDIDATES
                    .with_label_values(&[path.as_str()])
                    .observe(raw.len() as f64);
                reduce(raw, None, limit)
            }
            (SearchPath::Slow, Some(area), _) => {
                let per_chunk = self.scan_limit(limit, max_scan);
                let raw = self.area_candidates(area, None, per_chunk, &deadline).await?;
                RAW_CANDIDATES
                    .with_label_values(&[path.as_str()])
                    .observe(raw.len() as f64);
                reduce(raw, Some(&EntityFilters::from(&parsed)), limit)
            }
            _ => {
                let per_chunk = self.scan_limit(limit, max_scan);
                let query = ChunkedQuery {
                    collection: self.collection.clone(),
                    field: IndexedField::Hashtags,
                    keys: parsed.hashtags.iter().cloned().collect(),
                    equality: None,
                    per_chunk_limit: per_chunk,
                };
                let raw = self.executor.execute(&query, &deadline).await?.documents;
                RAW_CANDIDATES
                    .with_label_values(&[path.as_str()])
                    .observe(raw.len() as f64);
                reduce(raw, Some(&EntityFilters::from(&parsed)), limit)
            }
        };
        timer.observe_duration();

        debug!(
            path = path.as_str(),
            returned = posts.len(),
            "Search query served"
        );
        Ok(posts)
    }

    /// Per-chunk fetch size for predicate paths. `maxScan` bounds the
    /// overfetch but never drops below the page size.
    fn scan_limit(&self, limit: usize, max_scan: usize) -> usize {
        self.config.per_chunk_limit(limit).min(max_scan).max(limit)
    }

    async fn area_candidates(
        &self,
        area: &ResolvedArea,
        equality: Option<EqualityFilter>,
        per_chunk_limit: usize,
        deadline: &Deadline,
    ) -> Result<Vec<RawDocument>> {
        let keys: BTreeSet<String> = area.tokens();
        let query = ChunkedQuery {
            collection: self.collection.clone(),
            field: IndexedField::GeoCell(area.tier),
            keys,
            equality,
            per_chunk_limit,
        };
        let report = self.executor.execute(&query, deadline).await?;
        Ok(report.documents)
    }
}

/// Pick the execution path for a tokenized query.
pub fn choose_path(parsed: &ParsedQuery, area: Option<&ResolvedArea>) -> Result<SearchPath> {
    if parsed.exact_username().is_some() {
        return Ok(SearchPath::Fast);
    }
    if area.is_some() {
        return Ok(SearchPath::Slow);
    }
    if !parsed.hashtags.is_empty() {
        return Ok(SearchPath::Hashtag);
    }
    Err(AppError::from(SpatialError::NoLocation))
}
