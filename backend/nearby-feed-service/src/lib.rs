/// Nearby Feed Service Library
///
/// Serves location-scoped feeds and search over H3-indexed post documents.
/// Area parameters resolve to one indexed tier and a set of cells; the cell
/// set fans out into store-sized membership queries whose union is reduced
/// into a validated, deduplicated, newest-first page.
///
/// # Modules
///
/// - `spatial`: tier selection and area resolution
/// - `tokenizer`: search query parsing and write-time entity extraction
/// - `store`: document store trait with Postgres and in-memory backends
/// - `services`: chunked executor, reducer and query engine
/// - `handlers`: HTTP request handlers
/// - `models`: raw documents and validated posts
/// - `error`: Error types and handling
/// - `config`: Configuration management
/// - `metrics`: Observability and metrics collection
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod models;
pub mod openapi;
pub mod services;
pub mod spatial;
pub mod store;
pub mod tokenizer;

pub use config::Config;
pub use error::{AppError, Result};
pub use handlers::{configure_routes, HandlerState};
pub use services::GeoFeedEngine;
