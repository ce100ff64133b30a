//! Preference upsert, the onboarding write path.

use std::time::Duration;

use tracing::info;

use super::engine::{warn_cache_unavailable, with_retry};
use super::{RecommendationResult, Stores};
use crate::domain::wedding::{normalize_tags, WeddingPreferences};
use crate::errors::RecommendationError;

pub struct PreferenceService {
    stores: Stores,
    retry_backoff: Duration,
}

impl PreferenceService {
    pub fn new(stores: Stores) -> Self {
        Self { stores, retry_backoff: Duration::from_millis(super::DEFAULT_RETRY_BACKOFF_MS) }
    }

    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Validate and store preferences, then drop the wedding's cached results.
    pub async fn upsert_preferences(
        &self,
        mut preferences: WeddingPreferences,
    ) -> RecommendationResult<WeddingPreferences> {
        preferences.wedding_id.0 = preferences.wedding_id.0.trim().to_owned();
        preferences.validate()?;
        preferences.style_tags = normalize_tags(&preferences.style_tags);

        let wedding_id = preferences.wedding_id.clone();
        let exists = with_retry(self.retry_backoff, "wedding_exists", || {
            self.stores.preferences.wedding_exists(&wedding_id)
        })
        .await?;
        if !exists {
            return Err(RecommendationError::NotFound(format!(
                "wedding `{wedding_id}` does not exist"
            )));
        }

        with_retry(self.retry_backoff, "save_preferences", || {
            self.stores.preferences.save_preferences(preferences.clone())
        })
        .await?;

        if let Err(error) = self.stores.cache.invalidate(&wedding_id).await {
            warn_cache_unavailable("invalidate", &wedding_id, error);
        }

        info!(
            event_name = "recommendations.preferences.saved",
            wedding_id = %wedding_id,
            has_budget = preferences.budget.is_set(),
            style_count = preferences.style_tags.len(),
            has_location = preferences.location().is_some(),
            "saved wedding preferences"
        );
        Ok(preferences)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use chrono::Utc;
    use rust_decimal::Decimal;

    use super::PreferenceService;
    use crate::domain::wedding::{BudgetRange, WeddingId, WeddingPreferences};
    use crate::errors::RecommendationError;
    use crate::recommendations::test_support::Fixture;
    use crate::recommendations::types::{CacheEntry, CacheKey};
    use crate::recommendations::{PreferenceStore, RecommendationCache};

    #[tokio::test]
    async fn upsert_normalizes_saves_and_invalidates() {
        let fixture = Fixture::default();
        fixture.preferences.add_wedding("W-1").await;
        let key = CacheKey::new(WeddingId("W-1".to_owned()), None);
        fixture.cache.put(&key, CacheEntry::fresh(vec![], 10, Utc::now())).await.expect("seed");

        let preferences = WeddingPreferences {
            style_tags: BTreeSet::from([" Rustic ".to_owned(), "rustic".to_owned(), "Boho".to_owned()]),
            ..WeddingPreferences::new(WeddingId(" W-1 ".to_owned()))
        };
        let saved = PreferenceService::new(fixture.stores())
            .upsert_preferences(preferences)
            .await
            .expect("upsert");

        assert_eq!(saved.style_tags, BTreeSet::from(["boho".to_owned(), "rustic".to_owned()]));
        let stored = fixture
            .preferences
            .find_preferences(&WeddingId("W-1".to_owned()))
            .await
            .expect("find")
            .expect("stored");
        assert_eq!(stored, saved);
        assert!(fixture.cache.is_empty().await);
    }

    #[tokio::test]
    async fn inverted_budget_is_invalid_input() {
        let fixture = Fixture::default();
        fixture.preferences.add_wedding("W-1").await;
        let preferences = WeddingPreferences {
            budget: BudgetRange::new(Some(Decimal::new(5000, 0)), Some(Decimal::new(1000, 0))),
            ..WeddingPreferences::new(WeddingId("W-1".to_owned()))
        };

        let err = PreferenceService::new(fixture.stores())
            .upsert_preferences(preferences)
            .await
            .unwrap_err();
        assert!(matches!(err, RecommendationError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn unknown_wedding_is_not_found() {
        let fixture = Fixture::default();
        let err = PreferenceService::new(fixture.stores())
            .upsert_preferences(WeddingPreferences::new(WeddingId("W-9".to_owned())))
            .await
            .unwrap_err();
        assert!(matches!(err, RecommendationError::NotFound(_)));
    }
}
