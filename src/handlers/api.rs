use crate::{
    error::ShortenError,
    models::{ResolveResponse, ShortenRequest, ShortenResponse, StatsResponse},
    AppState,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use std::sync::Arc;

/// POST /api/v1/write/shorten
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ShortenRequest>,
) -> Result<impl IntoResponse, ShortenError> {
    let mapping = state.shortener.create(&req.url).await?;

    let body = ShortenResponse {
        short_url: format!("{}/{}", state.config.base_url, mapping.code),
        code: mapping.code,
        target_url: mapping.target_url,
        created_at: mapping.created_at,
    };
    Ok((StatusCode::CREATED, Json(body)))
}

/// PUT /api/v1/write/shorten/:code
pub async fn update(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
    Json(req): Json<ShortenRequest>,
) -> Result<StatusCode, ShortenError> {
    state.shortener.update(&code, &req.url).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/write/shorten/:code
pub async fn remove(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<StatusCode, ShortenError> {
    state.shortener.delete(&code).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/read/shorten/:code
pub async fn resolve(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<ResolveResponse>, ShortenError> {
    let target_url = state.shortener.resolve(&code).await?;
    Ok(Json(ResolveResponse { code, target_url }))
}

/// GET /api/v1/read/shorten/:code/stats
pub async fn stats(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Json<StatsResponse>, ShortenError> {
    let access_count = state.shortener.stats(&code).await?;
    Ok(Json(StatsResponse { code, access_count }))
}
