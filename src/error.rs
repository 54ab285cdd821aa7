use crate::alloc::AllocError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Everything a mapping operation can fail with, mapped onto HTTP at the
/// handler boundary.
#[derive(Debug, thiserror::Error)]
pub enum ShortenError {
    /// Malformed or missing target URL. Rejected before any side effect.
    #[error("invalid target URL: {0}")]
    InvalidInput(String),

    /// No mapping exists for the requested code.
    #[error("short code not found")]
    NotFound,

    /// The allocation lock was not granted within its bound. The create can
    /// be retried wholesale; nothing was persisted.
    #[error("timed out waiting for the allocation lock")]
    AllocationTimeout,

    /// The coordination service misbehaved. Nothing was persisted.
    #[error("sequence allocation failed: {0}")]
    AllocationFailure(#[source] anyhow::Error),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),
}

impl From<AllocError> for ShortenError {
    fn from(e: AllocError) -> Self {
        match e {
            AllocError::Timeout => ShortenError::AllocationTimeout,
            AllocError::Coordination(e) => ShortenError::AllocationFailure(e),
        }
    }
}

impl IntoResponse for ShortenError {
    fn into_response(self) -> Response {
        let (status, body) = match &self {
            ShortenError::InvalidInput(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ShortenError::NotFound => (StatusCode::NOT_FOUND, "Short link not found".to_owned()),
            ShortenError::AllocationTimeout | ShortenError::AllocationFailure(_) => {
                tracing::error!("code allocation failed: {self:#}");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "Code allocation is temporarily unavailable".to_owned(),
                )
            }
            ShortenError::Store(e) => {
                tracing::error!("store error: {e:?}");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal error".to_owned())
            }
        };

        (status, body).into_response()
    }
}
