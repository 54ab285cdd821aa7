use crate::models::ShortMapping;
use chrono::NaiveDateTime;
use sqlx::SqlitePool;

/// Durable store for code → URL mappings. The single source of truth: the
/// cache layer above it is only ever an accelerator.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Fetch a single mapping by its short code.
    pub async fn find_by_code(&self, code: &str) -> Result<Option<ShortMapping>, sqlx::Error> {
        let mapping: Option<ShortMapping> = sqlx::query_as(
            "SELECT code, target_url, created_at, updated_at, access_count
             FROM mappings WHERE code = ?1",
        )
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(mapping)
    }

    /// Insert a newly created mapping.
    pub async fn save(&self, mapping: &ShortMapping) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO mappings (code, target_url, created_at, updated_at, access_count)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&mapping.code)
        .bind(&mapping.target_url)
        .bind(mapping.created_at)
        .bind(mapping.updated_at)
        .bind(mapping.access_count)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Permanently delete a mapping. Returns whether a row existed.
    pub async fn delete_by_code(&self, code: &str) -> Result<bool, sqlx::Error> {
        let affected = sqlx::query("DELETE FROM mappings WHERE code = ?1")
            .bind(code)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(affected > 0)
    }

    /// Bump the access counter for one successful resolution. A no-op when
    /// the code no longer exists (resolution raced a delete).
    pub async fn increment_access_count(&self, code: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE mappings SET access_count = access_count + 1 WHERE code = ?1")
            .bind(code)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Point the code at a new target: replaces the URL, refreshes
    /// `updated_at`, and resets the access counter. Returns whether a row
    /// existed.
    pub async fn update_target(
        &self,
        code: &str,
        target_url: &str,
        now: NaiveDateTime,
    ) -> Result<bool, sqlx::Error> {
        let affected = sqlx::query(
            "UPDATE mappings
             SET target_url = ?2, updated_at = ?3, access_count = 0
             WHERE code = ?1",
        )
        .bind(code)
        .bind(target_url)
        .bind(now)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(affected > 0)
    }
}
