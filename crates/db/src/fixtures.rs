use sqlx::Executor;
use tracing::info;

use crate::connection::DbPool;
use crate::repositories::{RepositoryError, SqlVendorCatalog};

const SEED_WEDDING_IDS: &[&str] = &["W-AUSTIN-001", "W-DALLAS-001", "W-NOPREF-001"];

const SEED_PREFERENCE_IDS: &[&str] = &["W-AUSTIN-001", "W-DALLAS-001"];

const SEED_VENDOR_IDS: &[&str] = &[
    "V-PHO-001",
    "V-PHO-002",
    "V-PHO-003",
    "V-PHO-004",
    "V-PHO-099",
    "V-FLO-001",
    "V-FLO-002",
    "V-VEN-001",
    "V-VEN-002",
    "V-CAT-001",
    "V-MUS-001",
];

/// Deterministic demo data for local runs and integration tests.
///
/// - `W-AUSTIN-001`: rustic/outdoor, $2k-$4k, Austin TX, 2025-10-18
/// - `W-DALLAS-001`: modern/elegant, $5k-$9k, Dallas TX, 2025-06-14
/// - `W-NOPREF-001`: registered without preferences
pub struct DemoDataset;

impl DemoDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/demo_seed.sql");

    pub const WEDDING_IDS: &'static [&'static str] = SEED_WEDDING_IDS;
    pub const VENDOR_IDS: &'static [&'static str] = SEED_VENDOR_IDS;

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;
        SqlVendorCatalog::new(pool.clone()).reindex_regions().await?;

        let result = SeedResult {
            weddings: SEED_WEDDING_IDS.len(),
            preferences: SEED_PREFERENCE_IDS.len(),
            vendors: SEED_VENDOR_IDS.len(),
        };
        info!(
            event_name = "db.fixtures.seeded",
            weddings = result.weddings,
            preferences = result.preferences,
            vendors = result.vendors,
            "demo dataset loaded"
        );
        Ok(result)
    }

    /// Checks that every seeded row is present.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let checks = vec![
            ("weddings", count_present(pool, "wedding", "id", SEED_WEDDING_IDS).await?),
            (
                "preferences",
                count_present(pool, "wedding_preferences", "wedding_id", SEED_PREFERENCE_IDS)
                    .await?,
            ),
            ("vendors", count_present(pool, "vendor", "id", SEED_VENDOR_IDS).await?),
        ];
        let all_present = checks.iter().all(|(_, present)| *present);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes seeded rows; dependent interactions and cache entries cascade.
    pub async fn clean(pool: &DbPool) -> Result<(), RepositoryError> {
        let mut tx = pool.begin().await?;

        let weddings = sql_array_from_ids(SEED_WEDDING_IDS);
        let vendors = sql_array_from_ids(SEED_VENDOR_IDS);
        sqlx::query(&format!("DELETE FROM wedding WHERE id IN {weddings}"))
            .execute(&mut *tx)
            .await?;
        sqlx::query(&format!("DELETE FROM vendor WHERE id IN {vendors}"))
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

async fn count_present(
    pool: &DbPool,
    table: &str,
    key: &str,
    ids: &[&str],
) -> Result<bool, RepositoryError> {
    let count: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM {table} WHERE {key} IN {}",
        sql_array_from_ids(ids)
    ))
    .fetch_one(pool)
    .await?;
    Ok(usize::try_from(count).is_ok_and(|count| count == ids.len()))
}

fn sql_array_from_ids(ids: &[&str]) -> String {
    let quoted = ids.iter().map(|id| format!("'{id}'")).collect::<Vec<_>>().join(",");
    format!("({quoted})")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedResult {
    pub weddings: usize,
    pub preferences: usize,
    pub vendors: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}
