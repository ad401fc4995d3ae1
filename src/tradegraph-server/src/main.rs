use actix_cors::Cors;
use actix_web::{web, App, HttpServer};
use anyhow::Result;
use std::path::Path;
use tracing_actix_web::TracingLogger;
use tradegraph_core::config::Config;
use tradegraph_server::{api, telemetry};

#[actix_web::main]
async fn main() -> Result<()> {
    let _guard = telemetry::init_telemetry(Path::new("./logs"))?;

    // Load configuration
    let config = Config::load("config.json").unwrap_or_else(|e| {
        tracing::warn!("Failed to load config.json ({}), using defaults", e);
        Config::default()
    });

    tracing::info!("tradegraph starting");
    tracing::info!("  Store: {}", config.store);
    if !config.uses_memory_store() {
        tracing::info!("  Dgraph URL: {}", config.dgraph_url);
    }
    tracing::info!("  Port: {}", config.port);
    tracing::info!("  Embedding URL: {}", config.embedding_url);
    tracing::info!("  Embedding dimensions: {}", config.embedding_dimensions);
    tracing::info!("  Resolution: {:?}", config.resolution);
    tracing::info!(
        "  Features: embedding={}, cache={}",
        config.features.embedding,
        config.features.embedding_cache
    );
    tracing::info!(
        "  CORS: enabled={}, origins={:?}",
        config.cors.enabled,
        config.cors.allowed_origins
    );

    let app_state = web::Data::new(api::AppState::from_config(config.clone())?);
    tracing::info!("tradegraph initialized successfully");

    let bind_addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("🚀 Starting HTTP server on {}", bind_addr);

    let cors_config = config.cors.clone();
    let server = HttpServer::new(move || {
        let mut cors = Cors::default();

        if cors_config.enabled {
            for origin in &cors_config.allowed_origins {
                cors = cors.allowed_origin(origin);
            }
            cors = cors
                .allowed_methods(vec!["GET", "POST", "DELETE", "OPTIONS"])
                .allowed_headers(vec![
                    actix_web::http::header::AUTHORIZATION,
                    actix_web::http::header::ACCEPT,
                    actix_web::http::header::CONTENT_TYPE,
                ])
                .max_age(3600);
        }

        App::new()
            .app_data(app_state.clone())
            .wrap(cors)
            .wrap(TracingLogger::default())
            .configure(api::configure)
    })
    .bind(&bind_addr)?
    .run();

    tracing::info!("Server running, press Ctrl+C to stop");
    server.await?;

    tracing::info!("Shutting down");
    Ok(())
}
