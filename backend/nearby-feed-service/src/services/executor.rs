//! Chunked query executor.
//!
//! Splits an unbounded key set into store-sized membership queries, runs them
//! in bounded waves and unions whatever comes back. A failed or unfinished
//! chunk only degrades recall; the call fails when nothing succeeded.

use crate::metrics::query::{CHUNK_QUERIES_TOTAL, EXECUTOR_TIMEOUTS_TOTAL};
use crate::models::RawDocument;
use crate::store::{
    DocumentStore, EqualityFilter, EqualityQuery, IndexedField, MembershipQuery, SortOrder,
};
use futures::stream::{FuturesUnordered, StreamExt};
use resilience::Deadline;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Error, PartialEq)]
pub enum ExecutorError {
    #[error("all {failed} of {total} store queries failed")]
    TotalFailure { failed: usize, total: usize },

    #[error("deadline of {0:?} elapsed before any store query completed")]
    DeadlineExceeded(Duration),
}

/// A membership query over an arbitrarily large key set.
#[derive(Debug, Clone)]
pub struct ChunkedQuery {
    pub collection: String,
    pub field: IndexedField,
    pub keys: BTreeSet<String>,
    pub equality: Option<EqualityFilter>,
    pub per_chunk_limit: usize,
}

/// Raw union plus per-chunk bookkeeping. `documents` is unordered.
#[derive(Debug, Default)]
pub struct ExecutionReport {
    pub documents: Vec<RawDocument>,
    pub chunks_total: usize,
    pub chunks_succeeded: usize,
    /// Errored chunks plus chunks the deadline cut off
    pub chunks_failed: usize,
    pub timed_out: bool,
}

impl ExecutionReport {
    pub fn is_partial(&self) -> bool {
        self.chunks_failed > 0
    }
}

/// Partition `keys` into consecutive chunks of at most `chunk_size` tokens.
/// Produces exactly `ceil(keys.len() / chunk_size)` chunks.
pub fn plan_chunks(keys: &BTreeSet<String>, chunk_size: usize) -> Vec<Vec<String>> {
    let chunk_size = chunk_size.max(1);
    let keys: Vec<String> = keys.iter().cloned().collect();
    keys.chunks(chunk_size).map(<[String]>::to_vec).collect()
}

pub struct ChunkedQueryExecutor {
    store: Arc<dyn DocumentStore>,
    chunk_size: usize,
    concurrency: usize,
}

impl ChunkedQueryExecutor {
    /// `max_membership_tokens` is capped by the ceiling the store advertises.
    pub fn new(
        store: Arc<dyn DocumentStore>,
        max_membership_tokens: usize,
        concurrency: usize,
    ) -> Self {
        let ceiling = store.max_membership_tokens();
        let chunk_size = if max_membership_tokens > ceiling {
            warn!(
                configured = max_membership_tokens,
                store_ceiling = ceiling,
                "Configured membership chunk size exceeds store ceiling; using store ceiling"
            );
            ceiling
        } else {
            max_membership_tokens
        };

        Self {
            store,
            chunk_size: chunk_size.max(1),
            concurrency: concurrency.max(1),
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Run every chunk of `query` under `deadline`, `concurrency` at a time.
    pub async fn execute(
        &self,
        query: &ChunkedQuery,
        deadline: &Deadline,
    ) -> Result<ExecutionReport, ExecutorError> {
        let chunks = plan_chunks(&query.keys, self.chunk_size);
        let mut report = ExecutionReport {
            chunks_total: chunks.len(),
            ..Default::default()
        };
        if chunks.is_empty() {
            return Ok(report);
        }

        'waves: for wave in chunks.chunks(self.concurrency) {
            let mut in_flight: FuturesUnordered<_> = wave
                .iter()
                .map(|tokens| {
                    let membership = MembershipQuery {
                        collection: query.collection.clone(),
                        field: query.field,
                        tokens: tokens.clone(),
                        equality: query.equality.clone(),
                        sort: SortOrder::TimeDesc,
                        limit: query.per_chunk_limit,
                    };
                    let store = Arc::clone(&self.store);
                    async move { store.query_membership(&membership).await }
                })
                .collect();

            loop {
                match deadline.run(in_flight.next()).await {
                    Ok(Some(Ok(docs))) => {
                        report.chunks_succeeded += 1;
                        CHUNK_QUERIES_TOTAL.with_label_values(&["success"]).inc();
                        report.documents.extend(docs);
                    }
                    Ok(Some(Err(e))) => {
                        CHUNK_QUERIES_TOTAL.with_label_values(&["failure"]).inc();
                        warn!(
                            field = %query.field,
                            error = %e,
                            "Chunk query failed; continuing with remaining chunks"
                        );
                    }
                    Ok(None) => break,
                    Err(e) => {
                        report.timed_out = true;
                        EXECUTOR_TIMEOUTS_TOTAL.inc();
                        warn!(
                            field = %query.field,
                            completed = report.chunks_succeeded,
                            total = report.chunks_total,
                            error = %e,
                            "Query deadline reached; returning completed chunks"
                        );
                        break 'waves;
                    }
                }
            }
        }

        report.chunks_failed = report.chunks_total - report.chunks_succeeded;

        if report.chunks_succeeded == 0 {
            let err = if report.timed_out {
                ExecutorError::DeadlineExceeded(deadline.budget())
            } else {
                ExecutorError::TotalFailure {
                    failed: report.chunks_failed,
                    total: report.chunks_total,
                }
            };
            error!(field = %query.field, error = %err, "Chunked query produced no results");
            return Err(err);
        }

        debug!(
            field = %query.field,
            keys = query.keys.len(),
            chunks_total = report.chunks_total,
            chunks_succeeded = report.chunks_succeeded,
            chunks_failed = report.chunks_failed,
            timed_out = report.timed_out,
            documents = report.documents.len(),
            "Chunked query complete"
        );
        Ok(report)
    }

    /// Single equality lookup under `deadline`.
    pub async fn execute_equality(
        &self,
        query: &EqualityQuery,
        deadline: &Deadline,
    ) -> Result<Vec<RawDocument>, ExecutorError> {
        match deadline.run(self.store.query_equality(query)).await {
            Ok(Ok(docs)) => {
                CHUNK_QUERIES_TOTAL.with_label_values(&["success"]).inc();
                Ok(docs)
            }
            Ok(Err(e)) => {
                CHUNK_QUERIES_TOTAL.with_label_values(&["failure"]).inc();
                error!(field = %query.filter.field, error = %e, "Equality query failed");
                Err(ExecutorError::TotalFailure {
                    failed: 1,
                    total: 1,
                })
            }
            Err(e) => {
                EXECUTOR_TIMEOUTS_TOTAL.inc();
                error!(field = %query.filter.field, error = %e, "Equality query exceeded deadline");
                Err(ExecutorError::DeadlineExceeded(deadline.budget()))
            }
        }
    }
}
