use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::debug;
use utoipa::IntoParams;

use super::{posts_response, HandlerState};
use crate::error::Result;
use crate::services::FeedRequest;
use crate::spatial::AreaRequest;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FeedQueryParams {
    /// Comma-separated H3 cell tokens
    pub h3: Option<String>,
    /// Tier of `h3`: `metro`, `district`, `neighborhood` or 5, 7, 9
    pub resolution: Option<String>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    pub radius_km: Option<f64>,
    /// Center cell from a previous response
    pub center: Option<String>,
    /// Retired resolution-6 cell list
    pub h3r6: Option<String>,
    /// Retired resolution-8 cell list
    pub h3r8: Option<String>,
    /// Page size, clamped to 1..100 (default 20)
    pub limit: Option<usize>,
}

impl FeedQueryParams {
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

/// Latest visible posts in an area, newest first.
#[utoipa::path(
    get,
    path = "/api/v1/feed",
    tag = "feed",
    params(FeedQueryParams),
    responses(
        (status = 200, description = "Posts in the area, newest first"),
        (status = 400, description = "Missing or invalid location"),
        (status = 500, description = "Document store failed for every chunk"),
    )
)]
pub async fn get_feed(
    query: web::Query<FeedQueryParams>,
    state: web::Data<HandlerState>,
) -> Result<HttpResponse> {
    debug!(?query, "Feed request");

    let request = FeedRequest {
        area: query.area(),
        limit: query.limit,
    };
    let posts = state.engine.feed(&request).await?;

    Ok(posts_response(
        posts,
        state.engine.config().cache_max_age_secs,
    ))
}
