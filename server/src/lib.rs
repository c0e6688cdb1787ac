use std::sync::Arc;

use anyhow::Context;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod allocator;
pub mod config;
pub mod db;
pub mod error;
pub mod geo;
pub mod handlers;
pub mod models;
pub mod shortener;
pub mod stats;

use allocator::CodeAllocator;
use config::AppConfig;
use geo::GeoLocator;

// ── Shared application state ───────────────────────────────────────────────

/// Everything a request handler needs. The pool is the only place link data
/// lives; handlers never cache links in memory.
pub struct AppState {
    pub db: sqlx::SqlitePool,
    pub config: AppConfig,
    pub allocator: CodeAllocator,
    pub geo: GeoLocator,
}

impl AppState {
    pub fn new(db: sqlx::SqlitePool, config: AppConfig) -> anyhow::Result<Self> {
        let allocator = CodeAllocator::random(config.code_length, config.code_max_attempts);
        let geo = GeoLocator::new(config.geo_lookup)
            .context("failed to build geo lookup client")?;

        Ok(Self {
            db,
            config,
            allocator,
            geo,
        })
    }
}

// ── Router ─────────────────────────────────────────────────────────────────

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::links::health))
        .route("/api/urls", post(handlers::links::create_link))
        .route(
            "/api/urls/:code",
            get(handlers::redirect::redirect).patch(handlers::links::update_link),
        )
        .route("/api/urls/:code/stats", get(handlers::links::link_stats))
        // Short-link redirect; static routes above take priority
        .route("/:code", get(handlers::redirect::redirect))
        .with_state(state)
        // The JSON API is called from browser apps on other origins
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
