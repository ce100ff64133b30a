use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::{Sqlite, Transaction};
use tracing::debug;

use wedmatch_core::domain::vendor::VendorId;
use wedmatch_core::domain::wedding::WeddingId;
use wedmatch_core::errors::StoreError;
use wedmatch_core::recommendations::{
    CacheEntry, CacheKey, RecommendationCache, RecommendationScore,
};

use super::{column, decode_timestamp, encode_timestamp, RepositoryError};
use crate::DbPool;

/// Cache table shared by every server instance pointed at the same database.
pub struct SqlRecommendationCache {
    pool: DbPool,
}

impl SqlRecommendationCache {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch(&self, key: &CacheKey) -> Result<Option<CacheEntry>, RepositoryError> {
        let row = sqlx::query(
            "SELECT result_limit, payload, computed_at
             FROM recommendation_cache
             WHERE wedding_id = ? AND scope = ?",
        )
        .bind(&key.wedding_id.0)
        .bind(key.scope())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row_to_entry(&row)).transpose()
    }

    /// Single statement so concurrent writers resolve last-writer-wins. Entries
    /// computed at or before the wedding's watermark are dropped.
    async fn upsert(&self, key: &CacheKey, entry: &CacheEntry) -> Result<bool, RepositoryError> {
        let computed_at = encode_timestamp(&entry.computed_at);
        let result = sqlx::query(
            "INSERT INTO recommendation_cache (wedding_id, scope, result_limit, payload, computed_at)
             SELECT ?, ?, ?, ?, ?
             WHERE NOT EXISTS (
                SELECT 1 FROM recommendation_cache_watermark
                WHERE wedding_id = ? AND stale_through >= ?
             )
             ON CONFLICT(wedding_id, scope) DO UPDATE SET
                result_limit = excluded.result_limit,
                payload = excluded.payload,
                computed_at = excluded.computed_at",
        )
        .bind(&key.wedding_id.0)
        .bind(key.scope())
        .bind(i64::try_from(entry.limit).unwrap_or(i64::MAX))
        .bind(encode_payload(&entry.recommendations)?)
        .bind(&computed_at)
        .bind(&key.wedding_id.0)
        .bind(&computed_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_for_wedding(&self, wedding_id: &WeddingId) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        mark_stale(&mut tx, wedding_id).await?;
        sqlx::query("DELETE FROM recommendation_cache WHERE wedding_id = ?")
            .bind(&wedding_id.0)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn rewrite_interest(
        &self,
        wedding_id: &WeddingId,
        vendor_id: &VendorId,
        interested: bool,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;
        mark_stale(&mut tx, wedding_id).await?;

        let rows = sqlx::query(
            "SELECT scope, result_limit, payload, computed_at
             FROM recommendation_cache
             WHERE wedding_id = ?",
        )
        .bind(&wedding_id.0)
        .fetch_all(&mut *tx)
        .await?;

        for row in rows {
            let scope: String = column(&row, "scope")?;
            let mut entry = row_to_entry(&row)?;
            if !entry.patch_interest(vendor_id, interested) {
                continue;
            }
            sqlx::query(
                "UPDATE recommendation_cache SET payload = ? WHERE wedding_id = ? AND scope = ?",
            )
            .bind(encode_payload(&entry.recommendations)?)
            .bind(&wedding_id.0)
            .bind(scope)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl RecommendationCache for SqlRecommendationCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, StoreError> {
        Ok(self.fetch(key).await?)
    }

    async fn put(&self, key: &CacheKey, entry: CacheEntry) -> Result<(), StoreError> {
        if !self.upsert(key, &entry).await? {
            debug!(
                event_name = "db.recommendation_cache.stale_put",
                wedding_id = %key.wedding_id,
                scope = key.scope(),
                "dropped recommendations computed before the last invalidation"
            );
        }
        Ok(())
    }

    async fn invalidate(&self, wedding_id: &WeddingId) -> Result<(), StoreError> {
        Ok(self.delete_for_wedding(wedding_id).await?)
    }

    async fn patch_interest(
        &self,
        wedding_id: &WeddingId,
        vendor_id: &VendorId,
        interested: bool,
    ) -> Result<(), StoreError> {
        Ok(self.rewrite_interest(wedding_id, vendor_id, interested).await?)
    }
}

/// Moves the wedding's watermark to now; later puts must be computed after it.
async fn mark_stale(
    tx: &mut Transaction<'_, Sqlite>,
    wedding_id: &WeddingId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        "INSERT INTO recommendation_cache_watermark (wedding_id, stale_through)
         VALUES (?, ?)
         ON CONFLICT(wedding_id) DO UPDATE SET stale_through = excluded.stale_through",
    )
    .bind(&wedding_id.0)
    .bind(encode_timestamp(&Utc::now()))
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn encode_payload(recommendations: &[RecommendationScore]) -> Result<String, RepositoryError> {
    serde_json::to_string(recommendations)
        .map_err(|error| RepositoryError::Decode(error.to_string()))
}

fn row_to_entry(row: &SqliteRow) -> Result<CacheEntry, RepositoryError> {
    let payload: String = column(row, "payload")?;
    let recommendations: Vec<RecommendationScore> = serde_json::from_str(&payload)
        .map_err(|error| RepositoryError::Decode(format!("payload: {error}")))?;
    let result_limit: i64 = column(row, "result_limit")?;
    let computed_at: String = column(row, "computed_at")?;

    Ok(CacheEntry {
        recommendations,
        limit: usize::try_from(result_limit).map_err(|_| {
            RepositoryError::Decode(format!("result_limit out of range: {result_limit}"))
        })?,
        computed_at: decode_timestamp(&computed_at)?,
        from_cache: true,
    })
}
