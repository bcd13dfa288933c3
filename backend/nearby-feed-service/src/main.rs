/// Nearby Feed Service - HTTP Server
///
/// Serves `/api/v1/feed` and `/api/v1/search` over H3-indexed post documents.
use actix_web::{web, App, HttpServer};
use nearby_feed_service::handlers::{configure_routes, HandlerState};
use nearby_feed_service::metrics::serve_metrics;
use nearby_feed_service::openapi::ApiDoc;
use nearby_feed_service::services::GeoFeedEngine;
use nearby_feed_service::{store, Config};
use std::io;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing_actix_web::TracingLogger;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,actix_web=info,sqlx=warn"));

    if log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    let _ = dotenvy::dotenv();

    let config = Config::from_env().map_err(|e| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Invalid configuration: {e}"),
        )
    })?;

    init_tracing(&config.app.log_format);

    tracing::info!(
        env = %config.app.env,
        backend = ?config.store.backend,
        "Starting nearby-feed-service"
    );

    let stores = store::connect(&config.store).await.map_err(|e| {
        io::Error::new(
            io::ErrorKind::Other,
            format!("Failed to connect document store: {e}"),
        )
    })?;

    if let Some(path) = config.store.seed_file.as_deref() {
        store::seed_from_file(stores.writer.as_ref(), &config.store.collection, path)
            .await
            .map_err(|e| {
                io::Error::new(io::ErrorKind::Other, format!("Failed to seed store: {e}"))
            })?;
    }

    let engine = Arc::new(
        GeoFeedEngine::new(stores.reader, config.engine.clone(), config.spatial.clone())
            .with_collection(config.store.collection.clone()),
    );
    let state = web::Data::new(HandlerState { engine });

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!(%bind_address, "HTTP server listening");

    let server = HttpServer::new(move || {
        let openapi_doc = ApiDoc::openapi();

        App::new()
            .app_data(state.clone())
            .wrap(TracingLogger::default())
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api/v1/openapi.json", openapi_doc),
            )
            .route("/metrics", web::get().to(serve_metrics))
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .disable_signals()
    .run();

    let handle = server.handle();
    let mut tasks = JoinSet::new();

    tasks.spawn(async move {
        tracing::info!("HTTP server is running");
        server.await
    });

    tasks.spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received; stopping HTTP server");
        handle.stop(true).await;
        Ok(())
    });

    let mut first_error = None;
    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!("Server error: {}", e);
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
            Err(e) => {
                tracing::error!("Task error: {}", e);
                if first_error.is_none() {
                    first_error = Some(io::Error::new(io::ErrorKind::Other, format!("{}", e)));
                }
            }
        }
    }

    tracing::info!("nearby-feed-service shut down");

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
