//! Recommendation Engine implementation

use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::ports::CandidateQuery;
use super::scoring::{ScoreCalculator, ScoringPolicy};
use super::types::*;
use super::{RecommendationResult, Stores};
use crate::domain::interaction::latest_interest;
use crate::errors::{RecommendationError, StoreError};

/// Runtime knobs for fetching and caching recommendations.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub policy: ScoringPolicy,
    pub default_limit: usize,
    pub max_limit: usize,
    pub max_candidates: usize,
    pub cache_ttl: Duration,
    /// Pause before the single retry of an unavailable store.
    pub retry_backoff: Duration,
    /// Skip appending a save/dismiss identical to the current interest.
    pub dedupe_consecutive_interest: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            policy: ScoringPolicy::default(),
            default_limit: super::DEFAULT_LIMIT,
            max_limit: super::MAX_LIMIT,
            max_candidates: super::MAX_CANDIDATES,
            cache_ttl: Duration::from_secs(super::DEFAULT_CACHE_TTL_SECS),
            retry_backoff: Duration::from_millis(super::DEFAULT_RETRY_BACKOFF_MS),
            dedupe_consecutive_interest: false,
        }
    }
}

/// Main recommendation engine
pub struct RecommendationEngine {
    stores: Stores,
    settings: EngineSettings,
    calculator: ScoreCalculator,
}

impl RecommendationEngine {
    pub fn new(stores: Stores, settings: EngineSettings) -> Self {
        let calculator = ScoreCalculator::with_policy(settings.policy.clone());
        Self { stores, settings, calculator }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    /// Ranked vendor matches for a wedding, served from cache when fresh.
    pub async fn fetch(
        &self,
        request: &RecommendationRequest,
    ) -> RecommendationResult<RecommendationResponse> {
        let query = request.validate(self.settings.default_limit, self.settings.max_limit)?;
        let key = CacheKey::new(query.wedding_id.clone(), query.category);

        if !query.refresh {
            if let Some(entry) = self.cached(&key, query.limit).await {
                debug!(
                    event_name = "recommendations.cache.hit",
                    wedding_id = %query.wedding_id,
                    scope = key.scope(),
                    "serving cached recommendations"
                );
                return Ok(RecommendationResponse::from_entry(entry, query.limit, query.category));
            }
        }

        // Inputs are read after this instant; the cache drops the entry if
        // the wedding is invalidated in between.
        let snapshot_at = Utc::now();

        let exists = with_retry(self.settings.retry_backoff, "wedding_exists", || {
            self.stores.preferences.wedding_exists(&query.wedding_id)
        })
        .await?;
        if !exists {
            return Err(RecommendationError::NotFound(format!(
                "wedding `{}` does not exist",
                query.wedding_id
            )));
        }

        let preferences = with_retry(self.settings.retry_backoff, "find_preferences", || {
            self.stores.preferences.find_preferences(&query.wedding_id)
        })
        .await?;
        let Some(preferences) = preferences else {
            info!(
                event_name = "recommendations.no_preferences",
                wedding_id = %query.wedding_id,
                "wedding has no preferences yet"
            );
            return Ok(RecommendationResponse::without_preferences());
        };

        let history = with_retry(self.settings.retry_backoff, "list_interactions", || {
            self.stores.interactions.list_for_wedding(&query.wedding_id)
        })
        .await?;
        let interest = latest_interest(&history);

        let location = preferences.location();
        let candidate_query = CandidateQuery {
            category: query.category,
            exclude: interest
                .iter()
                .filter(|(_, interested)| !**interested)
                .map(|(vendor_id, _)| vendor_id.clone())
                .collect(),
            preferred_city: location.and_then(|location| location.city()),
            preferred_state: location.and_then(|location| location.state()),
            limit: self.settings.max_candidates,
        };
        let mut candidates = with_retry(self.settings.retry_backoff, "list_candidates", || {
            self.stores.vendors.list_candidates(&candidate_query)
        })
        .await?;
        // adapters are trusted for ordering, not for filtering
        candidates.retain(|vendor| candidate_query.matches(vendor));

        let recommendations =
            self.calculator.rank(&preferences, &candidates, &interest, query.limit);
        let entry = CacheEntry::fresh(recommendations, query.limit, snapshot_at);

        if let Err(error) = self.stores.cache.put(&key, entry.clone()).await {
            warn_cache_unavailable("put", &key, error);
        }

        info!(
            event_name = "recommendations.computed",
            wedding_id = %query.wedding_id,
            scope = key.scope(),
            candidates = candidates.len(),
            returned = entry.recommendations.len(),
            refresh = query.refresh,
            "computed recommendations"
        );

        Ok(RecommendationResponse::from_entry(entry, query.limit, query.category))
    }

    /// Fresh cache entry covering `limit`, or `None`. Cache faults count as a miss.
    async fn cached(&self, key: &CacheKey, limit: usize) -> Option<CacheEntry> {
        let entry = match self.stores.cache.get(key).await {
            Ok(entry) => entry?,
            Err(error) => {
                warn_cache_unavailable("get", key, error);
                return None;
            }
        };

        let ttl = chrono::Duration::from_std(self.settings.cache_ttl)
            .unwrap_or_else(|_| chrono::Duration::seconds(super::DEFAULT_CACHE_TTL_SECS as i64));
        if entry.is_expired(Utc::now(), ttl) || !entry.serves(limit) {
            return None;
        }
        Some(entry)
    }
}

pub(crate) fn warn_cache_unavailable(
    operation: &str,
    key: &impl std::fmt::Display,
    error: StoreError,
) {
    let error = RecommendationError::CacheUnavailable(error.to_string());
    warn!(
        event_name = "recommendations.cache.unavailable",
        operation,
        key = %key,
        error = %error,
        "recommendation cache bypassed"
    );
}

/// Run a store call, retrying once after `backoff` when the store is unavailable.
pub(crate) async fn with_retry<T, F, Fut>(
    backoff: Duration,
    operation: &'static str,
    mut call: F,
) -> RecommendationResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    match call().await {
        Err(StoreError::Unavailable(reason)) => {
            warn!(
                event_name = "recommendations.store.retry",
                operation,
                backoff_ms = backoff.as_millis() as u64,
                reason = %reason,
                "store unavailable, retrying once"
            );
            tokio::time::sleep(backoff).await;
            call().await.map_err(RecommendationError::from)
        }
        result => result.map_err(RecommendationError::from),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;

    use super::{with_retry, EngineSettings, RecommendationEngine};
    use crate::domain::interaction::{InteractionRecord, InteractionType};
    use crate::domain::vendor::{PriceTier, Vendor, VendorCategory, VendorId};
    use crate::domain::wedding::WeddingId;
    use crate::errors::{RecommendationError, StoreError};
    use crate::recommendations::test_support::{
        austin_wedding, florist, photographer, FakeCatalog, Fixture,
    };
    use crate::recommendations::types::{
        CacheEntry, CacheKey, RecommendationRequest, RecommendationResponse,
    };
    use crate::recommendations::{
        CandidateQuery, InteractionLog, InterestHandler, RecommendationCache, VendorCatalog,
        NO_PREFERENCES_MESSAGE,
    };

    fn engine(fixture: &Fixture) -> RecommendationEngine {
        RecommendationEngine::new(fixture.stores(), EngineSettings::default())
    }

    fn ids(response: &RecommendationResponse) -> Vec<&str> {
        response.recommendations.iter().map(|score| score.vendor_id.0.as_str()).collect()
    }

    /// Dismisses `v-austin` after the candidates are read, before scoring finishes.
    struct DismissMidFetch {
        inner: Arc<FakeCatalog>,
        handler: InterestHandler,
        fired: AtomicBool,
    }

    #[async_trait]
    impl VendorCatalog for DismissMidFetch {
        async fn find_vendor(&self, vendor_id: &VendorId) -> Result<Option<Vendor>, StoreError> {
            self.inner.find_vendor(vendor_id).await
        }

        async fn list_candidates(
            &self,
            query: &CandidateQuery,
        ) -> Result<Vec<Vendor>, StoreError> {
            let candidates = self.inner.list_candidates(query).await?;
            if !self.fired.swap(true, Ordering::SeqCst) {
                self.handler
                    .record_interest("W-1", "v-austin", false)
                    .await
                    .map_err(|error| StoreError::Unavailable(error.to_string()))?;
            }
            Ok(candidates)
        }
    }

    #[tokio::test]
    async fn unknown_wedding_is_not_found() {
        let fixture = Fixture::default();
        let err = engine(&fixture).fetch(&RecommendationRequest::new("W-404")).await.unwrap_err();
        assert!(matches!(err, RecommendationError::NotFound(_)));
    }

    #[tokio::test]
    async fn wedding_without_preferences_gets_prompt() {
        let fixture = Fixture::default();
        fixture.preferences.add_wedding("W-bare").await;

        let response = engine(&fixture).fetch(&RecommendationRequest::new("W-bare")).await.expect("fetch");
        assert!(!response.has_preferences);
        assert!(response.recommendations.is_empty());
        assert_eq!(response.message.as_deref(), Some(NO_PREFERENCES_MESSAGE));
        assert!(fixture.cache.is_empty().await);
    }

    #[tokio::test]
    async fn austin_vendor_outranks_dallas_vendor() {
        let fixture = Fixture::default();
        fixture.preferences.add_preferences(austin_wedding()).await;
        fixture.vendors.add(photographer("v-austin", "Austin", 4.8, 50)).await;
        fixture.vendors.add(photographer("v-dallas", "Dallas", 4.8, 50)).await;

        let response = engine(&fixture).fetch(&RecommendationRequest::new("W-1")).await.expect("fetch");
        assert!(response.has_preferences);
        let top = &response.recommendations[0];
        assert_eq!(top.vendor_id.0, "v-austin");
        assert!(top.sub_scores.style_match_score >= 75.0);
        assert!(top.sub_scores.budget_match_score >= 75.0);
        assert!(top.match_score > response.recommendations[1].match_score);
        assert!(top.reason.contains("budget") || top.reason.contains("style"));
    }

    #[tokio::test]
    async fn rustic_austin_vendor_outranks_pricey_modern_dallas_vendor() {
        let fixture = Fixture::default();
        fixture.preferences.add_preferences(austin_wedding()).await;
        fixture.vendors.add(photographer("v-a", "Austin", 4.8, 50)).await;
        fixture
            .vendors
            .add(Vendor {
                price_tier: PriceTier::from_ordinal(4),
                style_tags: BTreeSet::from(["modern".to_owned()]),
                ..photographer("v-b", "Dallas", 3.2, 50)
            })
            .await;

        let response = engine(&fixture).fetch(&RecommendationRequest::new("W-1")).await.expect("fetch");
        assert_eq!(ids(&response), vec!["v-a", "v-b"]);

        let (a, b) = (&response.recommendations[0], &response.recommendations[1]);
        assert!(a.sub_scores.budget_match_score >= 75.0);
        assert!(a.sub_scores.style_match_score >= 75.0);
        assert!(b.sub_scores.budget_match_score < a.sub_scores.budget_match_score);
        assert!(b.sub_scores.style_match_score < a.sub_scores.style_match_score);
        assert!(a.match_score > b.match_score);
    }

    #[tokio::test]
    async fn second_fetch_is_served_from_cache_and_refresh_recomputes() {
        let fixture = Fixture::default();
        fixture.preferences.add_preferences(austin_wedding()).await;
        fixture.vendors.add(photographer("v-austin", "Austin", 4.8, 50)).await;
        let engine = engine(&fixture);

        let first = engine.fetch(&RecommendationRequest::new("W-1")).await.expect("first");
        assert!(!first.from_cache);

        let second = engine.fetch(&RecommendationRequest::new("W-1")).await.expect("second");
        assert!(second.from_cache);
        assert_eq!(first.recommendations, second.recommendations);

        let refreshed =
            engine.fetch(&RecommendationRequest::new("W-1").with_refresh(true)).await.expect("refresh");
        assert!(!refreshed.from_cache);
        assert_eq!(first.recommendations, refreshed.recommendations);
        assert_eq!(fixture.vendors.candidate_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn expired_or_smaller_cache_entries_are_recomputed() {
        let fixture = Fixture::default();
        fixture.preferences.add_preferences(austin_wedding()).await;
        fixture.vendors.add(photographer("v-austin", "Austin", 4.8, 50)).await;
        let engine = engine(&fixture);
        let key = CacheKey::new(WeddingId("W-1".to_owned()), None);

        let stale = CacheEntry::fresh(vec![], 10, Utc::now() - chrono::Duration::hours(2));
        fixture.cache.put(&key, stale).await.expect("seed");
        let response = engine.fetch(&RecommendationRequest::new("W-1")).await.expect("fetch");
        assert!(!response.from_cache);
        assert_eq!(response.recommendations.len(), 1);

        let small = CacheEntry::fresh(vec![], 2, Utc::now());
        fixture.cache.put(&key, small).await.expect("seed");
        let response = engine.fetch(&RecommendationRequest::new("W-1").with_limit(5)).await.expect("fetch");
        assert!(!response.from_cache);
    }

    #[tokio::test]
    async fn dismissed_vendors_are_excluded() {
        let fixture = Fixture::default();
        fixture.preferences.add_preferences(austin_wedding()).await;
        fixture.vendors.add(photographer("v-austin", "Austin", 4.8, 50)).await;
        fixture.vendors.add(photographer("v-dallas", "Dallas", 4.8, 50)).await;
        fixture
            .interactions
            .append(InteractionRecord::new(
                WeddingId("W-1".to_owned()),
                VendorId("v-austin".to_owned()),
                InteractionType::Dismiss,
                Utc::now(),
            ))
            .await
            .expect("append");

        let response = engine(&fixture).fetch(&RecommendationRequest::new("W-1")).await.expect("fetch");
        assert_eq!(ids(&response), vec!["v-dallas"]);
    }

    #[tokio::test]
    async fn category_filter_and_empty_category_message() {
        let fixture = Fixture::default();
        fixture.preferences.add_preferences(austin_wedding()).await;
        fixture.vendors.add(photographer("v-photo", "Austin", 4.8, 50)).await;
        fixture.vendors.add(florist("v-flowers", "Austin")).await;
        let engine = engine(&fixture);

        let response = engine
            .fetch(&RecommendationRequest::new("W-1").with_category("Florist"))
            .await
            .expect("fetch");
        assert!(response.recommendations.iter().all(|r| r.category == VendorCategory::Florist));
        assert_eq!(response.recommendations.len(), 1);

        let empty = engine
            .fetch(&RecommendationRequest::new("W-1").with_category("Bakery"))
            .await
            .expect("fetch");
        assert!(empty.recommendations.is_empty());
        assert_eq!(empty.message.as_deref(), Some("No vendors found in this category yet"));
    }

    #[tokio::test]
    async fn limit_returns_the_top_scores_in_order() {
        let fixture = Fixture::default();
        fixture.preferences.add_preferences(austin_wedding()).await;
        for index in 0..10u32 {
            let rating = 3.0 + f64::from(index) * 0.2;
            fixture
                .vendors
                .add(photographer(&format!("v-{index:02}"), "Austin", rating, 5 + index))
                .await;
        }
        let engine = engine(&fixture);

        let top3 =
            engine.fetch(&RecommendationRequest::new("W-1").with_limit(3)).await.expect("top 3");
        assert_eq!(top3.recommendations.len(), 3);

        let all = engine
            .fetch(&RecommendationRequest::new("W-1").with_limit(10).with_refresh(true))
            .await
            .expect("all");
        assert_eq!(all.recommendations.len(), 10);
        assert!(all
            .recommendations
            .windows(2)
            .all(|pair| pair[0].match_score >= pair[1].match_score));
        assert_eq!(ids(&top3), ids(&all)[..3].to_vec());
        assert_eq!(ids(&top3), vec!["v-09", "v-08", "v-07"]);
    }

    #[tokio::test]
    async fn invalid_limit_is_rejected_before_any_store_call() {
        let fixture = Fixture::default();
        let err = engine(&fixture)
            .fetch(&RecommendationRequest::new("W-1").with_limit(0))
            .await
            .unwrap_err();
        assert!(matches!(err, RecommendationError::InvalidInput(_)));
        assert_eq!(fixture.vendors.candidate_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn dismiss_during_fetch_is_not_hidden_by_the_cache() {
        let fixture = Fixture::default();
        fixture.preferences.add_preferences(austin_wedding()).await;
        fixture.vendors.add(photographer("v-austin", "Austin", 4.8, 50)).await;
        fixture.vendors.add(photographer("v-dallas", "Dallas", 4.8, 50)).await;

        let mut stores = fixture.stores();
        stores.vendors = Arc::new(DismissMidFetch {
            inner: fixture.vendors.clone(),
            handler: InterestHandler::new(fixture.stores(), EngineSettings::default()),
            fired: AtomicBool::new(false),
        });
        let engine = RecommendationEngine::new(stores, EngineSettings::default());

        let racing = engine.fetch(&RecommendationRequest::new("W-1")).await.expect("racing");
        assert_eq!(ids(&racing), vec!["v-austin", "v-dallas"]);
        assert!(fixture.cache.is_empty().await);

        let next = engine.fetch(&RecommendationRequest::new("W-1")).await.expect("next");
        assert!(!next.from_cache);
        assert_eq!(ids(&next), vec!["v-dallas"]);

        let cached = engine.fetch(&RecommendationRequest::new("W-1")).await.expect("cached");
        assert!(cached.from_cache);
        assert_eq!(ids(&cached), vec!["v-dallas"]);
    }

    #[tokio::test]
    async fn cache_failures_are_bypassed() {
        let fixture = Fixture::default();
        fixture.preferences.add_preferences(austin_wedding()).await;
        fixture.vendors.add(photographer("v-austin", "Austin", 4.8, 50)).await;
        let mut stores = fixture.stores();
        stores.cache = Arc::new(crate::recommendations::test_support::BrokenCache);

        let response = RecommendationEngine::new(stores, EngineSettings::default())
            .fetch(&RecommendationRequest::new("W-1"))
            .await
            .expect("fetch");
        assert_eq!(response.recommendations.len(), 1);
        assert!(!response.from_cache);
    }

    #[tokio::test]
    async fn retry_recovers_from_one_unavailable_call() {
        let mut attempts = 0;
        let result = with_retry(Duration::from_millis(1), "lookup", || {
            attempts += 1;
            let outcome = if attempts == 1 {
                Err(StoreError::Unavailable("busy".to_owned()))
            } else {
                Ok(7)
            };
            async move { outcome }
        })
        .await;
        assert_eq!(result, Ok(7));
        assert_eq!(attempts, 2);
    }

    #[tokio::test]
    async fn retry_gives_up_after_second_failure() {
        let mut attempts = 0;
        let result: Result<u8, _> = with_retry(Duration::from_millis(1), "lookup", || {
            attempts += 1;
            async { Err(StoreError::Unavailable("down".to_owned())) }
        })
        .await;
        assert!(matches!(result, Err(RecommendationError::UpstreamUnavailable(_))));
        assert_eq!(attempts, 2);
    }

    #[tokio::test]
    async fn decode_errors_are_not_retried() {
        let mut attempts = 0;
        let result: Result<u8, _> = with_retry(Duration::from_millis(1), "lookup", || {
            attempts += 1;
            async { Err(StoreError::Decode("bad row".to_owned())) }
        })
        .await;
        assert!(matches!(result, Err(RecommendationError::UpstreamUnavailable(_))));
        assert_eq!(attempts, 1);
    }
}
