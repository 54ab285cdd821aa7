use std::sync::Arc;

use axum::{
    http::StatusCode,
    routing::{get, post, put},
    Router,
};
use sqlx::sqlite::SqlitePoolOptions;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod alloc;
mod cache;
mod codec;
mod config;
mod coordination;
mod error;
mod handlers;
mod models;
mod service;
mod store;

use alloc::SequenceAllocator;
use cache::{Cache, MemoryCache};
use coordination::LocalCoordinator;
use service::Shortener;
use store::Store;

// ── Shared application state ───────────────────────────────────────────────

pub struct AppState {
    pub config: config::AppConfig,
    pub shortener: Shortener,
}

// ── Router ─────────────────────────────────────────────────────────────────

fn app(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/write/shorten", post(handlers::api::create))
        .route(
            "/write/shorten/:code",
            put(handlers::api::update).delete(handlers::api::remove),
        )
        .route("/read/shorten/:code", get(handlers::api::resolve))
        .route("/read/shorten/:code/stats", get(handlers::api::stats));

    Router::new()
        // Health check — returns 200 OK with no auth required
        .route("/health", get(|| async { StatusCode::OK }))
        .nest("/api/v1", api)
        // Short-code redirect — must come LAST so fixed routes take priority
        .route("/:code", get(handlers::redirect::redirect))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

// ── Entry point ────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env (ignore error if file is absent — env vars may already be set)
    dotenvy::dotenv().ok();

    // Initialise structured logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hop=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = config::AppConfig::from_env()?;
    tracing::info!("Starting hop on {}:{}", config.host, config.port);
    tracing::info!("Base URL: {}", config.base_url);

    // Open SQLite connection pool
    // CREATE the file if it doesn't exist yet
    let db = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(
            config
                .database_url
                .parse::<sqlx::sqlite::SqliteConnectOptions>()?
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal),
        )
        .await?;

    // Run embedded migrations (files in migrations/)
    sqlx::migrate!("./migrations").run(&db).await?;
    tracing::info!("Database migrations applied");

    // Build shared state. The in-process coordinator serves a single-instance
    // deployment; point multiple instances at a consensus-backed coordinator
    // behind the same trait to scale out allocation.
    let coordinator = Arc::new(LocalCoordinator::new(config.lock_session));
    let allocator = SequenceAllocator::new(
        coordinator,
        &config.counter_path,
        config.counter_start,
        config.allocation_step,
        config.lock_timeout,
    );
    let cache: Arc<dyn Cache> = Arc::new(MemoryCache::new());
    let shortener = Shortener::new(Store::new(db), cache, allocator, config.cache_ttl);

    let bind_addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState { config, shortener });

    // ── Serve ──────────────────────────────────────────────────────────────
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app(state)).await?;

    Ok(())
}

// ── HTTP surface tests ─────────────────────────────────────────────────────
