use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use thiserror::Error;

use wedmatch_core::config::CacheBackend;
use wedmatch_core::errors::StoreError;
use wedmatch_core::recommendations::{
    DisabledRecommendationCache, InMemoryRecommendationCache, RecommendationCache, Stores,
};

use crate::DbPool;

pub mod interaction;
pub mod memory;
pub mod preferences;
pub mod recommendation_cache;
pub mod vendor;

pub use interaction::SqlInteractionLog;
pub use memory::{InMemoryInteractionLog, InMemoryPreferenceStore, InMemoryVendorCatalog};
pub use preferences::SqlPreferenceStore;
pub use recommendation_cache::SqlRecommendationCache;
pub use vendor::SqlVendorCatalog;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for StoreError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Database(
                error @ (sqlx::Error::ColumnDecode { .. }
                | sqlx::Error::ColumnNotFound(_)
                | sqlx::Error::Decode(_)
                | sqlx::Error::TypeNotFound { .. }),
            ) => StoreError::Decode(error.to_string()),
            RepositoryError::Database(error) => StoreError::Unavailable(error.to_string()),
            RepositoryError::Decode(message) => StoreError::Decode(message),
        }
    }
}

/// SQLite-backed stores with the cache chosen by `cache_backend`.
pub fn sql_stores(pool: &DbPool, cache_backend: CacheBackend) -> Stores {
    let cache: Arc<dyn RecommendationCache> = match cache_backend {
        CacheBackend::Sqlite => Arc::new(SqlRecommendationCache::new(pool.clone())),
        CacheBackend::Memory => Arc::new(InMemoryRecommendationCache::new()),
        CacheBackend::Disabled => Arc::new(DisabledRecommendationCache),
    };
    Stores {
        preferences: Arc::new(SqlPreferenceStore::new(pool.clone())),
        vendors: Arc::new(SqlVendorCatalog::new(pool.clone())),
        interactions: Arc::new(SqlInteractionLog::new(pool.clone())),
        cache,
    }
}

pub(crate) fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    row.try_get(name).map_err(|error| RepositoryError::Decode(format!("{name}: {error}")))
}

/// Fixed-width UTC so stored timestamps sort lexically.
pub(crate) fn encode_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("invalid timestamp `{raw}`: {error}")))
}

#[cfg(test)]
mod tests {
    use wedmatch_core::errors::StoreError;

    use super::RepositoryError;

    #[test]
    fn pool_failures_map_to_unavailable() {
        let error: StoreError = RepositoryError::Database(sqlx::Error::PoolTimedOut).into();
        assert!(matches!(error, StoreError::Unavailable(_)));
    }

    #[test]
    fn decode_failures_stay_decode() {
        let error: StoreError = RepositoryError::Decode("bad tags".to_owned()).into();
        assert_eq!(error, StoreError::Decode("bad tags".to_owned()));
    }
}
