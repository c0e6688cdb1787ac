use crate::{
    db,
    error::Error,
    handlers::JsonBody,
    models::{CreateLink, LinkResponse, LinkUpdate, StatsResponse},
    shortener, AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;

/// POST /api/urls
pub async fn create_link(
    State(state): State<Arc<AppState>>,
    JsonBody(input): JsonBody<CreateLink>,
) -> Result<(StatusCode, Json<LinkResponse>), Error> {
    let link = shortener::create_link(&state.db, &state.allocator, &input).await?;
    let short_url = state.config.short_url(&link.short_code);

    Ok((StatusCode::CREATED, Json(LinkResponse::new(link, short_url))))
}

/// GET /api/urls/:code/stats
///
/// Works for inactive links too; only unknown codes are a 404.
pub async fn link_stats(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<StatsResponse>, Error> {
    let stats = shortener::get_stats(&state.db, &code).await?;
    let short_url = state.config.short_url(&stats.link.short_code);

    Ok(Json(StatsResponse {
        link: LinkResponse::new(stats.link, short_url),
        breakdown: stats.breakdown,
    }))
}

/// PATCH /api/urls/:code
///
/// Edit the description or switch the link on and off.
pub async fn update_link(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    JsonBody(update): JsonBody<LinkUpdate>,
) -> Result<Json<LinkResponse>, Error> {
    let link = db::update_link(&state.db, &code, &update)
        .await?
        .ok_or(Error::NotFound)?;

    if let Some(active) = update.is_active {
        tracing::info!("Short link '{}' active = {}", link.short_code, active);
    }

    let short_url = state.config.short_url(&link.short_code);
    Ok(Json(LinkResponse::new(link, short_url)))
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "OK", "message": "URL Shortener API is running" }))
}
