/// HTTP handlers for nearby-feed-service
///
/// - Feed: latest posts in an area
/// - Search: tokenized free-text search, optionally scoped to an area
/// - Health: store-backed readiness and plain liveness
pub mod feed;
pub mod health;
pub mod search;

pub use feed::get_feed;
pub use health::{health_check, liveness_check};
pub use search::search_posts;

use actix_web::{http::header, web, HttpResponse};
use std::sync::Arc;

use crate::error::AppError;
use crate::models::{Post, PostsResponse};
use crate::services::GeoFeedEngine;

/// Shared state for every handler.
pub struct HandlerState {
    pub engine: Arc<GeoFeedEngine>,
}

/// Mount the versioned API. Query-string decode failures render as
/// `invalid_request` like every other validation error.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::QueryConfig::default().error_handler(|err, _req| {
        AppError::InvalidRequest(err.to_string()).into()
    }))
    .service(
        web::scope("/api/v1")
            .route("/feed", web::get().to(get_feed))
            .route("/search", web::get().to(search_posts))
            .route("/health", web::get().to(health_check))
            .route("/health/live", web::get().to(liveness_check)),
    );
}

fn posts_response(posts: Vec<Post>, cache_max_age_secs: u32) -> HttpResponse {
    HttpResponse::Ok()
        .insert_header((
            header::CACHE_CONTROL,
            format!("public, max-age={}", cache_max_age_secs),
        ))
        .json(PostsResponse { posts })
}
