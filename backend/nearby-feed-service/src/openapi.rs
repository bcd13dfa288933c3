/// OpenAPI documentation for Nova Nearby Feed Service
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Nova Nearby Feed Service API",
        version = "1.0.0",
        description = "Location-scoped feed and search over H3-indexed posts",
        contact(
            name = "Nova Team",
            email = "support@nova.app"
        ),
        license(
            name = "MIT"
        )
    ),
    paths(
        crate::handlers::feed::get_feed,
        crate::handlers::search::search_posts,
        crate::handlers::health::health_check,
        crate::handlers::health::liveness_check,
    ),
    servers(
        (url = "http://localhost:8090", description = "Development server"),
    ),
    tags(
        (name = "health", description = "Service health checks"),
        (name = "feed", description = "Location-scoped feed"),
        (name = "search", description = "Hashtag, mention, location and text search"),
    ),
)]
pub struct ApiDoc;
