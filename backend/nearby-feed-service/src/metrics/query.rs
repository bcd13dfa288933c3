use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, HistogramVec,
    IntCounter, IntCounterVec,
};

lazy_static! {
    /// Total requests by path (feed, search_fast, search_slow, search_hashtag).
    pub static ref REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "nearby_requests_total",
        "Total nearby queries segmented by execution path",
        &["path"]
    )
    .expect("failed to register nearby_requests_total");

    /// End-to-end query duration by path.
    pub static ref REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "nearby_request_duration_seconds",
        "Nearby query duration segmented by execution path",
        &["path"]
    )
    .expect("failed to register nearby_request_duration_seconds");

    /// Raw documents returned by the store before reduction.
    pub static ref RAW_CANDIDATES: HistogramVec = register_histogram_vec!(
        "nearby_raw_candidates",
        "Raw documents fetched per query before reduction",
        &["path"],
        vec![0.0, 10.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0]
    )
    .expect("failed to register nearby_raw_candidates");

    /// Store queries issued by the executor (success/failure).
    pub static ref CHUNK_QUERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "nearby_chunk_queries_total",
        "Store queries issued by the chunked executor segmented by outcome",
        &["outcome"]
    )
    .expect("failed to register nearby_chunk_queries_total");

    /// Documents dropped on the read path, by reason.
    pub static ref REDUCER_DROPPED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "nearby_reducer_dropped_total",
        "Documents dropped during reduction segmented by reason",
        &["reason"]
    )
    .expect("failed to register nearby_reducer_dropped_total");

    /// Queries whose deadline elapsed before every chunk completed.
    pub static ref EXECUTOR_TIMEOUTS_TOTAL: IntCounter = register_int_counter!(
        "nearby_executor_timeouts_total",
        "Chunked executions cut short by the request deadline"
    )
    .expect("failed to register nearby_executor_timeouts_total");
}
