use sqlx::sqlite::SqliteRow;

use wedmatch_core::domain::interaction::{InteractionRecord, InteractionType};
use wedmatch_core::domain::vendor::VendorId;
use wedmatch_core::domain::wedding::WeddingId;
use wedmatch_core::errors::StoreError;
use wedmatch_core::recommendations::InteractionLog;

use super::{column, decode_timestamp, encode_timestamp, RepositoryError};
use crate::DbPool;

/// Append-only interaction history. Rows are never updated or deleted here.
pub struct SqlInteractionLog {
    pool: DbPool,
}

impl SqlInteractionLog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn insert(&self, record: &InteractionRecord) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO vendor_interaction (
                id, wedding_id, vendor_id, interaction_type, interested, recorded_at
             ) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&record.id)
        .bind(&record.wedding_id.0)
        .bind(&record.vendor_id.0)
        .bind(record.interaction_type.as_str())
        .bind(record.interested)
        .bind(encode_timestamp(&record.recorded_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn for_wedding(
        &self,
        wedding_id: &WeddingId,
    ) -> Result<Vec<InteractionRecord>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, wedding_id, vendor_id, interaction_type, interested, recorded_at
             FROM vendor_interaction
             WHERE wedding_id = ?
             ORDER BY recorded_at ASC, rowid ASC",
        )
        .bind(&wedding_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_record).collect()
    }
}

#[async_trait::async_trait]
impl InteractionLog for SqlInteractionLog {
    async fn append(&self, record: InteractionRecord) -> Result<(), StoreError> {
        Ok(self.insert(&record).await?)
    }

    async fn list_for_wedding(
        &self,
        wedding_id: &WeddingId,
    ) -> Result<Vec<InteractionRecord>, StoreError> {
        Ok(self.for_wedding(wedding_id).await?)
    }
}

fn row_to_record(row: &SqliteRow) -> Result<InteractionRecord, RepositoryError> {
    let raw_type: String = column(row, "interaction_type")?;
    let interaction_type: InteractionType = raw_type
        .parse()
        .map_err(|error| RepositoryError::Decode(format!("interaction_type: {error}")))?;
    let recorded_at: String = column(row, "recorded_at")?;

    Ok(InteractionRecord {
        id: column(row, "id")?,
        wedding_id: WeddingId(column(row, "wedding_id")?),
        vendor_id: VendorId(column(row, "vendor_id")?),
        interaction_type,
        interested: column(row, "interested")?,
        recorded_at: decode_timestamp(&recorded_at)?,
    })
}
