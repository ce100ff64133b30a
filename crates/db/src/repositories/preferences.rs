use std::collections::BTreeSet;
use std::str::FromStr;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::SqliteRow;

use wedmatch_core::domain::vendor::GeoPoint;
use wedmatch_core::domain::wedding::{
    BudgetRange, PreferredLocation, WeddingId, WeddingPreferences,
};
use wedmatch_core::errors::StoreError;
use wedmatch_core::recommendations::PreferenceStore;

use super::{column, encode_timestamp, RepositoryError};
use crate::DbPool;

const DATE_FORMAT: &str = "%Y-%m-%d";

pub struct SqlPreferenceStore {
    pool: DbPool,
}

impl SqlPreferenceStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Registers a wedding. Existing rows keep their creation time.
    pub async fn save_wedding(
        &self,
        wedding_id: &WeddingId,
        display_name: &str,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO wedding (id, display_name, created_at) VALUES (?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET display_name = excluded.display_name",
        )
        .bind(&wedding_id.0)
        .bind(display_name)
        .bind(encode_timestamp(&Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn exists(&self, wedding_id: &WeddingId) -> Result<bool, RepositoryError> {
        let row = sqlx::query("SELECT 1 FROM wedding WHERE id = ?")
            .bind(&wedding_id.0)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }

    async fn fetch(
        &self,
        wedding_id: &WeddingId,
    ) -> Result<Option<WeddingPreferences>, RepositoryError> {
        let row = sqlx::query(
            "SELECT wedding_id, budget_min, budget_max, style_tags, preferred_location,
                    location_latitude, location_longitude, wedding_date
             FROM wedding_preferences
             WHERE wedding_id = ?",
        )
        .bind(&wedding_id.0)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| row_to_preferences(&row)).transpose()
    }

    async fn upsert(&self, preferences: &WeddingPreferences) -> Result<(), RepositoryError> {
        let style_tags = serde_json::to_string(&preferences.style_tags)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        let location = preferences.preferred_location.as_ref();
        let point = location.and_then(|location| location.point);

        sqlx::query(
            "INSERT INTO wedding_preferences (
                wedding_id, budget_min, budget_max, style_tags, preferred_location,
                location_latitude, location_longitude, wedding_date, updated_at
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(wedding_id) DO UPDATE SET
                budget_min = excluded.budget_min,
                budget_max = excluded.budget_max,
                style_tags = excluded.style_tags,
                preferred_location = excluded.preferred_location,
                location_latitude = excluded.location_latitude,
                location_longitude = excluded.location_longitude,
                wedding_date = excluded.wedding_date,
                updated_at = excluded.updated_at",
        )
        .bind(&preferences.wedding_id.0)
        .bind(preferences.budget.min.map(|value| value.to_string()))
        .bind(preferences.budget.max.map(|value| value.to_string()))
        .bind(style_tags)
        .bind(location.map(|location| location.label.clone()))
        .bind(point.map(|point| point.latitude))
        .bind(point.map(|point| point.longitude))
        .bind(preferences.wedding_date.map(|date| date.format(DATE_FORMAT).to_string()))
        .bind(encode_timestamp(&Utc::now()))
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl PreferenceStore for SqlPreferenceStore {
    async fn wedding_exists(&self, wedding_id: &WeddingId) -> Result<bool, StoreError> {
        Ok(self.exists(wedding_id).await?)
    }

    async fn find_preferences(
        &self,
        wedding_id: &WeddingId,
    ) -> Result<Option<WeddingPreferences>, StoreError> {
        Ok(self.fetch(wedding_id).await?)
    }

    async fn save_preferences(&self, preferences: WeddingPreferences) -> Result<(), StoreError> {
        Ok(self.upsert(&preferences).await?)
    }
}

fn row_to_preferences(row: &SqliteRow) -> Result<WeddingPreferences, RepositoryError> {
    let budget = BudgetRange::new(
        decode_amount(column(row, "budget_min")?)?,
        decode_amount(column(row, "budget_max")?)?,
    );

    let raw_tags: String = column(row, "style_tags")?;
    let style_tags: BTreeSet<String> = serde_json::from_str(&raw_tags)
        .map_err(|error| RepositoryError::Decode(format!("style_tags: {error}")))?;

    let label: Option<String> = column(row, "preferred_location")?;
    let latitude: Option<f64> = column(row, "location_latitude")?;
    let longitude: Option<f64> = column(row, "location_longitude")?;
    let point =
        latitude.zip(longitude).map(|(latitude, longitude)| GeoPoint { latitude, longitude });
    let preferred_location = match (label, point) {
        (None, None) => None,
        (label, point) => Some(PreferredLocation { label: label.unwrap_or_default(), point }),
    };

    let wedding_date: Option<String> = column(row, "wedding_date")?;
    let wedding_date = wedding_date
        .map(|raw| {
            NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|error| {
                RepositoryError::Decode(format!("invalid wedding_date `{raw}`: {error}"))
            })
        })
        .transpose()?;

    Ok(WeddingPreferences {
        wedding_id: WeddingId(column(row, "wedding_id")?),
        budget,
        style_tags,
        preferred_location,
        wedding_date,
    })
}

fn decode_amount(raw: Option<String>) -> Result<Option<Decimal>, RepositoryError> {
    raw.map(|raw| {
        Decimal::from_str(&raw)
            .map_err(|error| RepositoryError::Decode(format!("invalid amount `{raw}`: {error}")))
    })
    .transpose()
}
