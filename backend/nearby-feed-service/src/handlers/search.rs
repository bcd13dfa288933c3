use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::debug;
use utoipa::IntoParams;

use super::{posts_response, HandlerState};
use crate::error::Result;
use crate::services::SearchRequest;
use crate::spatial::AreaRequest;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SearchQueryParams {
    /// Query text, 2..80 characters after trimming
    pub q: Option<String>,
    /// Comma-separated H3 cell tokens
    pub h3: Option<String>,
    /// Tier of `h3`: `metro`, `district`, `neighborhood` or 5, 7, 9
    pub resolution: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_km: Option<f64>,
    pub center: Option<String>,
    pub h3r6: Option<String>,
    pub h3r8: Option<String>,
    /// Page size, clamped to 1..100 (default 20)
    pub limit: Option<usize>,
    /// Per-chunk scan bound, clamped to 50..2000 (default 500)
    #[serde(rename = "maxScan")]
    pub max_scan: Option<usize>,
}

impl SearchQueryParams {
    pub fn area(&self) -> AreaRequest {
        AreaRequest {
            h3: self.h3.clone(),
            resolution: self.resolution.clone(),
            lat: self.lat,
            lng: self.lng,
            radius_km: self.radius_km,
            center: self.center.clone(),
            h3r6: self.h3r6.clone(),
            h3r8: self.h3r8.clone(),
        }
    }
}

/// Search posts by hashtags, mentions, locations and free text.
///
/// A query that is exactly `@name` is answered from the username index; any
/// other query needs an area or at least one hashtag.
#[utoipa::path(
    get,
    path = "/api/v1/search",
    tag = "search",
    params(SearchQueryParams),
    responses(
        (status = 200, description = "Matching posts, newest first"),
        (status = 400, description = "Invalid query text or location"),
        (status = 500, description = "Document store failed for every chunk"),
    )
)]
pub async fn search_posts(
    query: web::Query<SearchQueryParams>,
    state: web::Data<HandlerState>,
) -> Result<HttpResponse> {
    debug!(q = ?query.q, limit = ?query.limit, max_scan = ?query.max_scan, "Search request");

    let request = SearchRequest {
        q: query.q.clone().unwrap_or_default(),
        area: query.area(),
        limit: query.limit,
        max_scan: query.max_scan,
    };
    let posts = state.engine.search(&request).await?;

    Ok(posts_response(
        posts,
        state.engine.config().cache_max_age_secs,
    ))
}
