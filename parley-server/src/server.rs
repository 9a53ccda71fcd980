//! Server assembly: tracing, metrics, database pool, router, and startup.

use std::{
    net::SocketAddr,
    sync::{Arc, OnceLock},
};

use axum::{Extension, Router, response::IntoResponse, routing::get, serve};
use axum::http::{HeaderValue, StatusCode, header};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use shared::config::{Config, DatabaseConfig, LogFormat};
use sqlx::postgres::PgPoolOptions;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, level_filters::LevelFilter, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

use crate::{
    app_state::AppState,
    db::bootstrap,
    handlers,
    routes,
    services::assistant::{
        AssistantError, AssistantService, GenerationBackend, HttpGenerationBackend,
        UnconfiguredBackend,
    },
    store::postgres::PgStore,
};

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub(crate) fn metrics_handle() -> PrometheusHandle {
    PROMETHEUS_HANDLE
        .get_or_init(|| {
            PrometheusBuilder::new()
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

async fn metrics_endpoint(Extension(handle): Extension<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            HeaderValue::from_static("text/plain; version=0.0.4"),
        )],
        handle.render(),
    )
}

/// Initializes the tracing subscriber for logging using the provided configuration.
pub fn initialize_tracing(config: &Config) -> String {
    let env_filter = build_env_filter(config);

    let fmt_builder = fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false);

    if matches!(config.logging.format, LogFormat::Json) {
        fmt_builder.json().with_ansi(false).init();
    } else {
        fmt_builder.with_ansi(true).init();
    }

    config.logging.level.clone()
}

fn build_env_filter(config: &Config) -> EnvFilter {
    let default_level = config
        .logging
        .level
        .parse::<LevelFilter>()
        .unwrap_or(LevelFilter::INFO);

    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::builder()
            .with_default_directive(default_level.into())
            .from_env_lossy()
    })
}

/// Creates a database connection pool from the given database settings.
///
/// # Errors
/// Returns an error if the database connection pool cannot be created.
pub async fn create_database_pool(db: &DatabaseConfig) -> Result<sqlx::PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(db.max_connections)
        .connect(&db.url)
        .await?;
    metrics::gauge!("db_pool_max_connections").set(f64::from(db.max_connections));
    Ok(pool)
}

/// Builds the assistant responder, falling back to an unconfigured backend
/// when the API key is absent so mentions still get the fallback reply.
///
/// # Errors
/// Returns an error if the mention token cannot form a match pattern.
pub fn create_assistant(config: &Config) -> Result<AssistantService, AssistantError> {
    let backend: Arc<dyn GenerationBackend> =
        match HttpGenerationBackend::from_config(&config.assistant) {
            Ok(backend) => Arc::new(backend),
            Err(AssistantError::MissingKey(key_env)) => {
                warn!(key_env, "assistant API key not set, replies will use the fallback text");
                Arc::new(UnconfiguredBackend::new(key_env))
            }
            Err(err) => return Err(err),
        };

    AssistantService::new(backend, &config.assistant)
}

/// Creates the main application router with all middleware and routes.
pub fn create_app_router(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    Router::new()
        .merge(handlers::users::routes())
        .merge(handlers::rooms::routes())
        .merge(handlers::messages::routes())
        .merge(handlers::socket::routes())
        .merge(routes::health::create_health_router())
        .route("/metrics", get(metrics_endpoint))
        .layer(Extension(state))
        .layer(Extension(metrics_handle))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Creates the graceful shutdown signal handler.
pub async fn create_shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C signal handler");
    info!("Shutting down...");
}

/// Starts the server: connects the store, bootstraps the schema, and serves
/// until interrupted.
///
/// # Errors
/// Returns an error if the pool, bootstrap, bind, or serve step fails.
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting server...");

    let metrics_handle = metrics_handle();

    let pool = create_database_pool(&config.database).await?;
    bootstrap::run(&pool).await?;

    let assistant = create_assistant(&config)?;
    let store = Arc::new(PgStore::new(pool));
    let state = Arc::new(AppState::new(store, assistant, &config));

    let app = create_app_router(state, metrics_handle);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on {}", addr);

    serve(listener, app)
        .with_graceful_shutdown(create_shutdown_signal())
        .await?;

    Ok(())
}
