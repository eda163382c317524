//! TalentFlow Server - Main entry point

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use sqlx::postgres::PgPoolOptions;
use talentflow_common::logging::{init_logging, LogConfig};
use talentflow_ingest::oracle::{HttpMappingOracle, MappingOracle, OracleConfig};
use tokio::signal;
use tracing::info;

use talentflow_server::config::Config;
use talentflow_server::ingest::{IngestQueue, MappingResolver};
use talentflow_server::store::Stores;
use talentflow_server::{features, middleware};

/// Application state shared across handlers
#[derive(Clone)]
struct AppState {
    db: sqlx::PgPool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging with configuration from environment
    let log_config = LogConfig::builder()
        .log_file_prefix("talentflow-server".to_string())
        .filter_directives(
            "talentflow_server=debug,talentflow_ingest=debug,tower_http=debug,sqlx=info"
                .to_string(),
        )
        .build();

    // Merge with environment variables (they take precedence)
    let log_config = LogConfig::from_env().unwrap_or(log_config);

    init_logging(&log_config)?;

    info!("Starting TalentFlow Server");

    // Load configuration
    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    // Initialize database connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(config.database.connect_timeout_secs))
        .idle_timeout(Duration::from_secs(config.database.idle_timeout_secs))
        .connect(&config.database.url)
        .await?;

    info!("Database connection pool established");

    // Run migrations
    sqlx::migrate!("../../migrations")
        .run(&db_pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;

    info!("Database migrations completed");

    // Make sure the upload directory exists before accepting files
    tokio::fs::create_dir_all(&config.uploads.dir).await?;

    let stores = Stores::postgres(db_pool.clone());

    // Mapping oracle is optional: without it, unmapped headers fall back to
    // manual mapping instead of an LLM suggestion.
    let oracle: Option<Arc<dyn MappingOracle>> = match &config.oracle {
        Some(settings) => {
            info!("Mapping oracle configured at {}", settings.endpoint);
            let mut oracle_config =
                OracleConfig::new(settings.endpoint.clone(), settings.api_key.clone());
            oracle_config.model = settings.model.clone();
            Some(Arc::new(HttpMappingOracle::new(oracle_config)))
        }
        None => {
            info!("No mapping oracle configured, heuristics only");
            None
        }
    };

    let resolver = Arc::new(MappingResolver::new(stores.mappings.clone(), oracle));
    let queue = IngestQueue::start(stores.clone());
    info!("Ingestion worker started");

    // Create application state
    let state = AppState { db: db_pool };

    let feature_state = features::FeatureState {
        stores,
        resolver,
        queue,
        uploads: config.uploads.clone(),
    };

    // Build the application router
    let app = create_router(state, feature_state, &config);

    // Create socket address
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    info!("Server listening on {}", addr);

    // Create TCP listener
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Start server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(config.server.shutdown_timeout_secs))
        .await?;

    info!("Server shut down gracefully");

    Ok(())
}

/// Create the application router with all routes and middleware
fn create_router(state: AppState, feature_state: features::FeatureState, config: &Config) -> Router {
    // Feature routes (CQRS architecture)
    let feature_routes = features::router(feature_state);

    // Build the main router with middleware stack
    Router::new()
        .route("/health", get(health_check))
        .with_state(state)
        .nest("/api", feature_routes)
        // Apply layers from innermost to outermost
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors))
}

/// Health check handler
async fn health_check(State(state): State<AppState>) -> Result<Response, StatusCode> {
    // Check database connectivity
    match sqlx::query("SELECT 1").fetch_one(&state.db).await {
        Ok(_) => Ok((
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "connected"
            })),
        )
            .into_response()),
        Err(e) => {
            tracing::error!("Database health check failed: {:?}", e);
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }

    // Give ongoing requests time to complete
    info!(
        "Waiting up to {} seconds for connections to close",
        timeout_secs
    );
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(5))).await;
}
