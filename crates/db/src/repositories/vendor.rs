use std::collections::BTreeSet;

use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Sqlite};

use wedmatch_core::domain::vendor::{
    Availability, GeoPoint, PriceTier, Vendor, VendorCategory, VendorId,
};
use wedmatch_core::domain::wedding::normalize_place;
use wedmatch_core::errors::StoreError;
use wedmatch_core::recommendations::{CandidateQuery, VendorCatalog};

use super::{column, RepositoryError};
use crate::DbPool;

const VENDOR_COLUMNS: &str = "id, name, category, price_range, style_tags, city, state, \
     latitude, longitude, average_rating, review_count, availability, popularity_signal, active";

pub struct SqlVendorCatalog {
    pool: DbPool,
}

impl SqlVendorCatalog {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn save_vendor(&self, vendor: &Vendor) -> Result<(), RepositoryError> {
        let style_tags = serde_json::to_string(&vendor.style_tags)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;
        let availability = serde_json::to_string(&vendor.availability)
            .map_err(|error| RepositoryError::Decode(error.to_string()))?;

        sqlx::query(
            "INSERT INTO vendor (
                id, name, category, price_range, style_tags, city, state, latitude, longitude,
                average_rating, review_count, availability, popularity_signal, active,
                city_key, state_key
             ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                category = excluded.category,
                price_range = excluded.price_range,
                style_tags = excluded.style_tags,
                city = excluded.city,
                state = excluded.state,
                latitude = excluded.latitude,
                longitude = excluded.longitude,
                average_rating = excluded.average_rating,
                review_count = excluded.review_count,
                availability = excluded.availability,
                popularity_signal = excluded.popularity_signal,
                active = excluded.active,
                city_key = excluded.city_key,
                state_key = excluded.state_key",
        )
        .bind(&vendor.id.0)
        .bind(&vendor.name)
        .bind(vendor.category.as_str())
        .bind(i64::from(vendor.price_tier.ordinal()))
        .bind(style_tags)
        .bind(&vendor.city)
        .bind(&vendor.state)
        .bind(vendor.location.map(|point| point.latitude))
        .bind(vendor.location.map(|point| point.longitude))
        .bind(vendor.average_rating)
        .bind(i64::from(vendor.review_count))
        .bind(availability)
        .bind(vendor.popularity_signal)
        .bind(vendor.active)
        .bind(vendor.normalized_city())
        .bind(vendor.normalized_state())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Recomputes `city_key` / `state_key` for rows written outside
    /// `save_vendor`, such as the demo seed. Returns the number of rows changed.
    pub async fn reindex_regions(&self) -> Result<u64, RepositoryError> {
        let rows = sqlx::query("SELECT id, city, state, city_key, state_key FROM vendor")
            .fetch_all(&self.pool)
            .await?;

        let mut updated = 0;
        for row in rows {
            let id: String = column(&row, "id")?;
            let city: String = column(&row, "city")?;
            let state: String = column(&row, "state")?;
            let city_key: String = column(&row, "city_key")?;
            let state_key: String = column(&row, "state_key")?;

            let (city, state) = (normalize_place(&city), normalize_place(&state));
            if city == city_key && state == state_key {
                continue;
            }
            sqlx::query("UPDATE vendor SET city_key = ?, state_key = ? WHERE id = ?")
                .bind(city)
                .bind(state)
                .bind(id)
                .execute(&self.pool)
                .await?;
            updated += 1;
        }
        Ok(updated)
    }

    async fn fetch(&self, vendor_id: &VendorId) -> Result<Option<Vendor>, RepositoryError> {
        let row = sqlx::query(&format!("SELECT {VENDOR_COLUMNS} FROM vendor WHERE id = ?"))
            .bind(&vendor_id.0)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| row_to_vendor(&row)).transpose()
    }

    async fn candidates(&self, query: &CandidateQuery) -> Result<Vec<Vendor>, RepositoryError> {
        let mut builder: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new(format!("SELECT {VENDOR_COLUMNS} FROM vendor WHERE active = 1"));

        if let Some(category) = query.category {
            builder.push(" AND category = ").push_bind(category.as_str());
        }
        if !query.exclude.is_empty() {
            builder.push(" AND id NOT IN (");
            let mut excluded = builder.separated(", ");
            for vendor_id in &query.exclude {
                excluded.push_bind(vendor_id.0.clone());
            }
            excluded.push_unseparated(")");
        }

        // A NULL preference never equals a stored key, so unset regions rank last.
        // A city match in a different named state ranks as no match.
        builder
            .push(" ORDER BY CASE WHEN city_key = ")
            .push_bind(query.preferred_city.clone())
            .push(" AND (")
            .push_bind(query.preferred_state.clone())
            .push(" IS NULL OR state_key = '' OR state_key = ")
            .push_bind(query.preferred_state.clone())
            .push(") THEN 0 WHEN state_key = ")
            .push_bind(query.preferred_state.clone())
            .push(" THEN 1 ELSE 2 END, popularity_signal DESC, id ASC LIMIT ")
            .push_bind(i64::try_from(query.limit).unwrap_or(i64::MAX));

        let rows = builder.build().fetch_all(&self.pool).await?;
        rows.iter().map(row_to_vendor).collect()
    }
}

#[async_trait::async_trait]
impl VendorCatalog for SqlVendorCatalog {
    async fn find_vendor(&self, vendor_id: &VendorId) -> Result<Option<Vendor>, StoreError> {
        Ok(self.fetch(vendor_id).await?)
    }

    async fn list_candidates(&self, query: &CandidateQuery) -> Result<Vec<Vendor>, StoreError> {
        Ok(self.candidates(query).await?)
    }
}

fn row_to_vendor(row: &SqliteRow) -> Result<Vendor, RepositoryError> {
    let raw_category: String = column(row, "category")?;
    let category: VendorCategory = raw_category
        .parse()
        .map_err(|error| RepositoryError::Decode(format!("category: {error}")))?;

    let raw_tags: String = column(row, "style_tags")?;
    let style_tags: BTreeSet<String> = serde_json::from_str(&raw_tags)
        .map_err(|error| RepositoryError::Decode(format!("style_tags: {error}")))?;

    let raw_availability: String = column(row, "availability")?;
    let availability: Availability = serde_json::from_str(&raw_availability)
        .map_err(|error| RepositoryError::Decode(format!("availability: {error}")))?;

    let latitude: Option<f64> = column(row, "latitude")?;
    let longitude: Option<f64> = column(row, "longitude")?;
    let review_count: i64 = column(row, "review_count")?;
    let price_range: i64 = column(row, "price_range")?;

    Ok(Vendor {
        id: VendorId(column(row, "id")?),
        name: column(row, "name")?,
        category,
        price_tier: PriceTier::from_ordinal(price_range),
        style_tags,
        city: column(row, "city")?,
        state: column(row, "state")?,
        location: latitude
            .zip(longitude)
            .map(|(latitude, longitude)| GeoPoint { latitude, longitude }),
        average_rating: column(row, "average_rating")?,
        review_count: u32::try_from(review_count).map_err(|_| {
            RepositoryError::Decode(format!("review_count out of range: {review_count}"))
        })?,
        availability,
        popularity_signal: column(row, "popularity_signal")?,
        active: column(row, "active")?,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::NaiveDate;

    use wedmatch_core::domain::vendor::{
        Availability, PriceTier, Vendor, VendorCategory, VendorId,
    };
    use wedmatch_core::recommendations::{CandidateQuery, VendorCatalog};

    use super::SqlVendorCatalog;
    use crate::{connect_with_settings, migrations};

    async fn catalog() -> SqlVendorCatalog {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlVendorCatalog::new(pool)
    }

    fn vendor(id: &str, category: VendorCategory, city: &str, popularity: f64) -> Vendor {
        Vendor {
            id: VendorId(id.to_owned()),
            name: format!("Vendor {id}"),
            category,
            price_tier: PriceTier::from_ordinal(2),
            style_tags: BTreeSet::from(["rustic".to_owned()]),
            city: city.to_owned(),
            state: "TX".to_owned(),
            location: None,
            average_rating: Some(4.5),
            review_count: 12,
            availability: Availability::Open,
            popularity_signal: popularity,
            active: true,
        }
    }

    fn ids(vendors: &[Vendor]) -> Vec<&str> {
        vendors.iter().map(|vendor| vendor.id.0.as_str()).collect()
    }

    #[tokio::test]
    async fn vendor_round_trips_with_calendar_availability() {
        let catalog = catalog().await;
        let mut stored = vendor("V-1", VendorCategory::Photography, "Austin", 10.0);
        stored.availability = Availability::Calendar {
            booked: BTreeSet::from([NaiveDate::from_ymd_opt(2025, 10, 18).expect("date")]),
        };
        stored.average_rating = None;
        stored.review_count = 0;
        catalog.save_vendor(&stored).await.expect("save");

        let loaded = catalog.find_vendor(&stored.id).await.expect("find").expect("present");
        assert_eq!(loaded, stored);
        assert_eq!(catalog.find_vendor(&VendorId("V-404".to_owned())).await.expect("find"), None);
    }

    #[tokio::test]
    async fn candidates_prefer_city_then_state_then_popularity() {
        let catalog = catalog().await;
        let mut elsewhere = vendor("V-4", VendorCategory::Photography, "Denver", 90.0);
        elsewhere.state = "CO".to_owned();
        for stored in [
            vendor("V-1", VendorCategory::Photography, "Dallas", 50.0),
            vendor("V-2", VendorCategory::Photography, " austin ", 5.0),
            vendor("V-3", VendorCategory::Photography, "Houston", 70.0),
            elsewhere,
        ] {
            catalog.save_vendor(&stored).await.expect("save");
        }

        let query = CandidateQuery {
            preferred_city: Some("austin".to_owned()),
            preferred_state: Some("tx".to_owned()),
            limit: 10,
            ..CandidateQuery::default()
        };
        let candidates = catalog.list_candidates(&query).await.expect("candidates");
        assert_eq!(ids(&candidates), vec!["V-2", "V-3", "V-1", "V-4"]);
    }

    #[tokio::test]
    async fn candidates_honour_category_exclusions_activity_and_limit() {
        let catalog = catalog().await;
        let mut inactive = vendor("V-3", VendorCategory::Photography, "Austin", 99.0);
        inactive.active = false;
        for stored in [
            vendor("V-1", VendorCategory::Photography, "Austin", 10.0),
            vendor("V-2", VendorCategory::Photography, "Austin", 20.0),
            inactive,
            vendor("V-4", VendorCategory::Florist, "Austin", 30.0),
            vendor("V-5", VendorCategory::Photography, "Austin", 5.0),
        ] {
            catalog.save_vendor(&stored).await.expect("save");
        }

        let query = CandidateQuery {
            category: Some(VendorCategory::Photography),
            exclude: BTreeSet::from([VendorId("V-2".to_owned())]),
            limit: 1,
            ..CandidateQuery::default()
        };
        let candidates = catalog.list_candidates(&query).await.expect("candidates");
        assert_eq!(ids(&candidates), vec!["V-1"]);
    }

    #[tokio::test]
    async fn region_keys_collapse_inner_whitespace() {
        let catalog = catalog().await;
        let mut spaced = vendor("V-1", VendorCategory::Photography, "San  Marcos", 1.0);
        spaced.state = " tx ".to_owned();
        catalog.save_vendor(&spaced).await.expect("save");
        catalog
            .save_vendor(&vendor("V-2", VendorCategory::Photography, "Austin", 80.0))
            .await
            .expect("save");

        let query = CandidateQuery {
            preferred_city: Some("san marcos".to_owned()),
            preferred_state: Some("tx".to_owned()),
            limit: 10,
            ..CandidateQuery::default()
        };
        let candidates = catalog.list_candidates(&query).await.expect("candidates");
        assert_eq!(ids(&candidates), vec!["V-1", "V-2"]);
    }

    #[tokio::test]
    async fn city_in_another_named_state_is_not_a_city_match() {
        let catalog = catalog().await;
        let mut minnesota = vendor("V-1", VendorCategory::Photography, "Austin", 90.0);
        minnesota.state = "MN".to_owned();
        for stored in [minnesota, vendor("V-2", VendorCategory::Photography, "Dallas", 10.0)] {
            catalog.save_vendor(&stored).await.expect("save");
        }

        let query = CandidateQuery {
            preferred_city: Some("austin".to_owned()),
            preferred_state: Some("tx".to_owned()),
            limit: 10,
            ..CandidateQuery::default()
        };
        let candidates = catalog.list_candidates(&query).await.expect("candidates");
        assert_eq!(ids(&candidates), vec!["V-2", "V-1"]);
    }

    #[tokio::test]
    async fn reindex_fills_keys_for_rows_written_by_raw_sql() {
        let catalog = catalog().await;
        catalog
            .save_vendor(&vendor("V-1", VendorCategory::Photography, "Austin", 1.0))
            .await
            .expect("save");
        sqlx::query("UPDATE vendor SET city = 'San   Marcos', city_key = '' WHERE id = 'V-1'")
            .execute(&catalog.pool)
            .await
            .expect("raw update");

        assert_eq!(catalog.reindex_regions().await.expect("reindex"), 1);
        assert_eq!(catalog.reindex_regions().await.expect("reindex"), 0);

        let key: String = sqlx::query_scalar("SELECT city_key FROM vendor WHERE id = 'V-1'")
            .fetch_one(&catalog.pool)
            .await
            .expect("key");
        assert_eq!(key, "san marcos");
    }
}
