use crate::{error::ShortenError, AppState};
use axum::{
    extract::{Path, State},
    response::Redirect,
};
use std::sync::Arc;

/// GET /:code
///
/// Resolves through the cache-aside service (cache fast path, store on a
/// miss, access counted either way) and redirects to the target.
pub async fn redirect(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Result<Redirect, ShortenError> {
    let target_url = state.shortener.resolve(&code).await?;
    Ok(Redirect::to(&target_url))
}
