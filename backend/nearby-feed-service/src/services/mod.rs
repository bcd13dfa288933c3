/// Query services
///
/// - `executor`: chunked, deadline-bounded membership fan-out
/// - `reducer`: validity, predicates, dedup and ordering
/// - `engine`: request orchestration for feed and search
pub mod engine;
pub mod executor;
pub mod reducer;

pub use engine::{FeedRequest, GeoFeedEngine, SearchPath, SearchRequest};
pub use executor::{ChunkedQuery, ChunkedQueryExecutor, ExecutionReport, ExecutorError};
pub use reducer::{reduce, EntityFilters};
