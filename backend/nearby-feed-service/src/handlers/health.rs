use actix_web::{web, HttpResponse};
use tracing::warn;

use super::HandlerState;

/// Readiness: the document store must answer a ping.
#[utoipa::path(
    get,
    path = "/api/v1/health",
    tag = "health",
    responses(
        (status = 200, description = "Service and document store are reachable"),
        (status = 503, description = "Document store is unavailable"),
    )
)]
pub async fn health_check(state: web::Data<HandlerState>) -> HttpResponse {
    match state.engine.ping().await {
        Ok(()) => HttpResponse::Ok().json(serde_json::json!({"status": "ok"})),
        Err(e) => {
            warn!(error = %e, "Health check failed: document store unavailable");
            HttpResponse::ServiceUnavailable().json(serde_json::json!({
                "status": "unavailable",
                "error": e.to_string(),
            }))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/v1/health/live",
    tag = "health",
    responses((status = 200, description = "Process is alive"))
)]
pub async fn liveness_check() -> HttpResponse {
    HttpResponse::Ok().finish()
}
