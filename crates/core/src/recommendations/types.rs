//! Types for the recommendation engine

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::vendor::{VendorCategory, VendorId};
use crate::domain::wedding::WeddingId;
use crate::errors::RecommendationError;

/// Request for vendor recommendations, as received at the API boundary.
#[derive(Debug, Clone)]
pub struct RecommendationRequest {
    /// Wedding to recommend vendors for
    pub wedding_id: String,
    /// Optional category filter, parsed during validation
    pub category: Option<String>,
    /// Requested number of results; `None` uses the default
    pub limit: Option<i64>,
    /// Bypass and repopulate the cache
    pub refresh: bool,
}

impl RecommendationRequest {
    /// Create a new recommendation request
    pub fn new(wedding_id: impl Into<String>) -> Self {
        Self { wedding_id: wedding_id.into(), category: None, limit: None, refresh: false }
    }

    /// Restrict results to one category
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Set the number of results
    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Force recomputation
    pub fn with_refresh(mut self, refresh: bool) -> Self {
        self.refresh = refresh;
        self
    }

    /// Validate raw input before any store is touched.
    pub fn validate(
        &self,
        default_limit: usize,
        max_limit: usize,
    ) -> Result<RecommendationQuery, RecommendationError> {
        let wedding_id = self.wedding_id.trim();
        if wedding_id.is_empty() {
            return Err(RecommendationError::InvalidInput("wedding_id is required".to_owned()));
        }

        let limit = match self.limit {
            None => default_limit,
            Some(value) if value <= 0 => {
                return Err(RecommendationError::InvalidInput(format!(
                    "limit must be a positive integer, got {value}"
                )));
            }
            Some(value) => usize::try_from(value).unwrap_or(max_limit).min(max_limit),
        };

        let category = match self.category.as_deref().map(str::trim) {
            None | Some("") | Some("*") => None,
            Some(raw) => Some(raw.parse::<VendorCategory>()?),
        };

        Ok(RecommendationQuery {
            wedding_id: WeddingId(wedding_id.to_owned()),
            category,
            limit,
            refresh: self.refresh,
        })
    }
}

/// Validated recommendation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecommendationQuery {
    pub wedding_id: WeddingId,
    pub category: Option<VendorCategory>,
    pub limit: usize,
    pub refresh: bool,
}

/// The six scoring factors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreFactor {
    Budget,
    Style,
    Location,
    Rating,
    Availability,
    Popularity,
}

impl ScoreFactor {
    pub const ALL: [ScoreFactor; 6] = [
        Self::Budget,
        Self::Style,
        Self::Location,
        Self::Rating,
        Self::Availability,
        Self::Popularity,
    ];

    /// Factors derived from the couple's own stated preferences.
    pub fn is_preference(&self) -> bool {
        matches!(self, Self::Budget | Self::Style | Self::Location)
    }
}

/// Individual sub-scores, each 0 - 100
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct SubScores {
    pub budget_match_score: f64,
    pub style_match_score: f64,
    pub location_match_score: f64,
    pub rating_score: f64,
    pub availability_score: f64,
    pub popularity_score: f64,
}

impl SubScores {
    pub fn get(&self, factor: ScoreFactor) -> f64 {
        match factor {
            ScoreFactor::Budget => self.budget_match_score,
            ScoreFactor::Style => self.style_match_score,
            ScoreFactor::Location => self.location_match_score,
            ScoreFactor::Rating => self.rating_score,
            ScoreFactor::Availability => self.availability_score,
            ScoreFactor::Popularity => self.popularity_score,
        }
    }
}

/// A computed factor plus whether it came from real data rather than a neutral default.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorScore {
    pub value: f64,
    pub real: bool,
}

impl FactorScore {
    pub fn real(value: f64) -> Self {
        Self { value: clamp_score(value), real: true }
    }

    pub fn default_value(value: f64) -> Self {
        Self { value: clamp_score(value), real: false }
    }
}

/// Clamp into 0 - 100 and round to two decimals. Non-finite input becomes 0.
pub fn clamp_score(value: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    (value.clamp(0.0, 100.0) * 100.0).round() / 100.0
}

/// Confidence level for a recommendation
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    /// At most one sub-score backed by real data
    Low,
    /// Two or three real sub-scores
    Medium,
    /// Four real sub-scores
    High,
    /// Five or six real sub-scores
    VeryHigh,
}

impl ConfidenceLevel {
    pub fn from_real_inputs(count: usize) -> Self {
        match count {
            0 | 1 => Self::Low,
            2 | 3 => Self::Medium,
            4 => Self::High,
            _ => Self::VeryHigh,
        }
    }
}

/// A scored vendor with reasoning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationScore {
    pub vendor_id: VendorId,
    pub vendor_name: String,
    pub category: VendorCategory,
    /// Weighted aggregate (0 - 100)
    pub match_score: f64,
    #[serde(flatten)]
    pub sub_scores: SubScores,
    pub confidence_level: ConfidenceLevel,
    pub reason: String,
    pub match_highlights: Vec<String>,
    pub potential_concerns: Vec<String>,
    pub interested: Option<bool>,
    pub review_count: u32,
}

/// Cache key: one entry per wedding and category (`*` for all categories).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub wedding_id: WeddingId,
    pub category: Option<VendorCategory>,
}

impl CacheKey {
    pub fn new(wedding_id: WeddingId, category: Option<VendorCategory>) -> Self {
        Self { wedding_id, category }
    }

    pub fn scope(&self) -> &'static str {
        self.category.map(|category| category.as_str()).unwrap_or("*")
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.wedding_id, self.scope())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub recommendations: Vec<RecommendationScore>,
    /// Limit the entry was computed for; it can serve any request up to this size.
    pub limit: usize,
    pub computed_at: DateTime<Utc>,
    #[serde(default)]
    pub from_cache: bool,
}

impl CacheEntry {
    pub fn fresh(
        recommendations: Vec<RecommendationScore>,
        limit: usize,
        computed_at: DateTime<Utc>,
    ) -> Self {
        Self { recommendations, limit, computed_at, from_cache: false }
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.computed_at >= ttl
    }

    pub fn serves(&self, limit: usize) -> bool {
        self.limit >= limit
    }

    /// Update the interest flag of every cached score for `vendor_id`.
    pub fn patch_interest(&mut self, vendor_id: &VendorId, interested: bool) -> bool {
        let mut patched = false;
        for score in self.recommendations.iter_mut().filter(|score| &score.vendor_id == vendor_id)
        {
            score.interested = Some(interested);
            patched = true;
        }
        patched
    }
}

/// Response returned to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationResponse {
    pub recommendations: Vec<RecommendationScore>,
    pub has_preferences: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub from_cache: bool,
}

pub const NO_PREFERENCES_MESSAGE: &str =
    "Tell us about your budget, style and location to get vendor recommendations";

impl RecommendationResponse {
    pub fn without_preferences() -> Self {
        Self {
            recommendations: Vec::new(),
            has_preferences: false,
            message: Some(NO_PREFERENCES_MESSAGE.to_owned()),
            from_cache: false,
        }
    }

    pub fn from_entry(entry: CacheEntry, limit: usize, category: Option<VendorCategory>) -> Self {
        let mut recommendations = entry.recommendations;
        recommendations.truncate(limit);
        let message = recommendations.is_empty().then(|| empty_pool_message(category));
        Self { recommendations, has_preferences: true, message, from_cache: entry.from_cache }
    }
}

pub fn empty_pool_message(category: Option<VendorCategory>) -> String {
    match category {
        Some(_) => "No vendors found in this category yet".to_owned(),
        None => "No vendors found yet".to_owned(),
    }
}
