//! Vendor Recommendation Engine
//!
//! Scores active vendors against a wedding's stated preferences, explains each
//! match, and memoizes ranked results per wedding and category.

mod cache;
mod engine;
mod explanation;
mod interest;
mod ports;
mod preferences;
mod scoring;
#[cfg(test)]
mod test_support;
mod types;

pub use cache::{DisabledRecommendationCache, InMemoryRecommendationCache, RecommendationCache};
pub use engine::{EngineSettings, RecommendationEngine};
pub use explanation::{Explanation, ExplanationGenerator};
pub use interest::{InterestHandler, InterestOutcome};
pub use ports::{CandidateQuery, InteractionLog, PreferenceStore, VendorCatalog};
pub use preferences::PreferenceService;
pub use scoring::{
    compare_ranked, FactorBreakdown, PriceBand, ScoreCalculator, ScoringPolicy, ScoringWeights,
};
pub use types::*;

use std::sync::Arc;

use crate::errors::RecommendationError;

/// Result type for recommendation operations
pub type RecommendationResult<T> = Result<T, RecommendationError>;

/// Default scoring weights
pub const DEFAULT_WEIGHTS: ScoringWeights = ScoringWeights {
    budget: 0.25,
    style: 0.20,
    location: 0.15,
    rating: 0.20,
    availability: 0.10,
    popularity: 0.10,
};

/// Default price bands for tiers 1 through 4, in dollars
pub const DEFAULT_PRICE_BANDS: [PriceBand; 4] = [
    PriceBand { low: 500.0, typical: 1_000.0, high: 1_500.0 },
    PriceBand { low: 2_000.0, typical: 3_000.0, high: 4_000.0 },
    PriceBand { low: 4_000.0, typical: 5_500.0, high: 7_000.0 },
    PriceBand { low: 7_000.0, typical: 8_000.0, high: 12_000.0 },
];

pub const STRONG_THRESHOLD: f64 = 75.0;
pub const WEAK_THRESHOLD: f64 = 40.0;

/// Rating score for vendors with no reviews
pub const UNREVIEWED_RATING_SCORE: f64 = 40.0;

/// Score used when an input is missing
pub const NEUTRAL_SCORE: f64 = 50.0;

pub const DEFAULT_LOCATION_RADIUS_KM: f64 = 400.0;

/// Results returned when the caller gives no limit
pub const DEFAULT_LIMIT: usize = 10;

pub const MAX_LIMIT: usize = 50;

/// Upper bound on vendors scored per request
pub const MAX_CANDIDATES: usize = 500;

pub const DEFAULT_CACHE_TTL_SECS: u64 = 3_600;

pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 150;

/// Store handles shared by the engine, interest handler and preference service.
#[derive(Clone)]
pub struct Stores {
    pub preferences: Arc<dyn PreferenceStore>,
    pub vendors: Arc<dyn VendorCatalog>,
    pub interactions: Arc<dyn InteractionLog>,
    pub cache: Arc<dyn RecommendationCache>,
}

/// The three recommendation operations wired over one set of stores.
#[derive(Clone)]
pub struct RecommendationServices {
    pub engine: Arc<RecommendationEngine>,
    pub interest: Arc<InterestHandler>,
    pub preferences: Arc<PreferenceService>,
}

impl RecommendationServices {
    pub fn new(stores: Stores, settings: EngineSettings) -> Self {
        let preferences =
            PreferenceService::new(stores.clone()).with_retry_backoff(settings.retry_backoff);
        Self {
            engine: Arc::new(RecommendationEngine::new(stores.clone(), settings.clone())),
            interest: Arc::new(InterestHandler::new(stores, settings)),
            preferences: Arc::new(preferences),
        }
    }
}
