use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A code → URL record from the `mappings` table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ShortMapping {
    pub code: String,
    pub target_url: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
    /// Successful resolutions since creation (or since the last update,
    /// which resets it). The store's value is authoritative; the cache never
    /// holds a count.
    pub access_count: i64,
}

// ── API request / response shapes ──────────────────────────────────────────

/// Body of `POST /api/v1/write/shorten` and `PUT /api/v1/write/shorten/:code`.
#[derive(Debug, Deserialize)]
pub struct ShortenRequest {
    pub url: String,
}

/// Response after creating a mapping.
#[derive(Debug, Serialize)]
pub struct ShortenResponse {
    pub code: String,
    /// Full public URL, built from the configured base URL.
    pub short_url: String,
    pub target_url: String,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Serialize)]
pub struct ResolveResponse {
    pub code: String,
    pub target_url: String,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub code: String,
    pub access_count: i64,
}
