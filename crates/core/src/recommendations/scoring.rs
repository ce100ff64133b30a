//! Scoring algorithms for vendor recommendations

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use chrono::NaiveDate;

use super::explanation::ExplanationGenerator;
use super::types::*;
use crate::domain::vendor::{Availability, DateAvailability, PriceTier, Vendor, VendorId};
use crate::domain::wedding::{BudgetRange, PreferredLocation, WeddingPreferences};
use crate::errors::DomainError;

/// Weights for the six sub-scores. Must sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    /// Weight for budget match (default: 0.25)
    pub budget: f64,
    /// Weight for style match (default: 0.20)
    pub style: f64,
    /// Weight for location match (default: 0.15)
    pub location: f64,
    /// Weight for rating (default: 0.20)
    pub rating: f64,
    /// Weight for availability (default: 0.10)
    pub availability: f64,
    /// Weight for popularity (default: 0.10)
    pub popularity: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        super::DEFAULT_WEIGHTS
    }
}

impl ScoringWeights {
    pub fn get(&self, factor: ScoreFactor) -> f64 {
        match factor {
            ScoreFactor::Budget => self.budget,
            ScoreFactor::Style => self.style,
            ScoreFactor::Location => self.location,
            ScoreFactor::Rating => self.rating,
            ScoreFactor::Availability => self.availability,
            ScoreFactor::Popularity => self.popularity,
        }
    }

    pub fn sum(&self) -> f64 {
        ScoreFactor::ALL.iter().map(|factor| self.get(*factor)).sum()
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if ScoreFactor::ALL.iter().any(|factor| {
            let weight = self.get(*factor);
            !weight.is_finite() || weight < 0.0
        }) {
            return Err(DomainError::InvariantViolation(
                "scoring weights must be finite and non-negative".to_owned(),
            ));
        }
        if (self.sum() - 1.0).abs() > 1e-6 {
            return Err(DomainError::InvariantViolation(format!(
                "scoring weights must sum to 1.0, got {:.4}",
                self.sum()
            )));
        }
        Ok(())
    }
}

/// Expected dollar band for one price tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PriceBand {
    pub low: f64,
    pub typical: f64,
    pub high: f64,
}

/// Tunable scoring policy
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringPolicy {
    pub weights: ScoringWeights,
    /// Bands for tiers 1 through 4
    pub price_bands: [PriceBand; 4],
    /// Sub-scores at or above this are highlights
    pub strong_threshold: f64,
    /// Sub-scores at or below this are concerns
    pub weak_threshold: f64,
    /// Rating score for vendors without reviews
    pub unreviewed_rating_score: f64,
    /// Distance at which the location score reaches zero
    pub location_radius_km: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self {
            weights: ScoringWeights::default(),
            price_bands: super::DEFAULT_PRICE_BANDS,
            strong_threshold: super::STRONG_THRESHOLD,
            weak_threshold: super::WEAK_THRESHOLD,
            unreviewed_rating_score: super::UNREVIEWED_RATING_SCORE,
            location_radius_km: super::DEFAULT_LOCATION_RADIUS_KM,
        }
    }
}

impl ScoringPolicy {
    pub fn band(&self, tier: PriceTier) -> PriceBand {
        self.price_bands[(tier.ordinal() - PriceTier::MIN) as usize]
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        self.weights.validate()?;
        for band in &self.price_bands {
            let ordered = 0.0 <= band.low && band.low <= band.typical && band.typical <= band.high;
            if !ordered {
                return Err(DomainError::InvariantViolation(
                    "price bands must satisfy 0 <= low <= typical <= high".to_owned(),
                ));
            }
        }
        if !(0.0..=100.0).contains(&self.weak_threshold)
            || !(0.0..=100.0).contains(&self.strong_threshold)
            || self.weak_threshold >= self.strong_threshold
        {
            return Err(DomainError::InvariantViolation(
                "thresholds must lie in 0..=100 with weak below strong".to_owned(),
            ));
        }
        if !(0.0..=100.0).contains(&self.unreviewed_rating_score) {
            return Err(DomainError::InvariantViolation(
                "unreviewed rating score must lie in 0..=100".to_owned(),
            ));
        }
        if self.location_radius_km <= 0.0 {
            return Err(DomainError::InvariantViolation(
                "location radius must be positive".to_owned(),
            ));
        }
        Ok(())
    }
}

/// All six factors for one vendor, with provenance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FactorBreakdown {
    pub budget: FactorScore,
    pub style: FactorScore,
    pub location: FactorScore,
    pub rating: FactorScore,
    pub availability: FactorScore,
    pub popularity: FactorScore,
}

impl FactorBreakdown {
    pub fn get(&self, factor: ScoreFactor) -> FactorScore {
        match factor {
            ScoreFactor::Budget => self.budget,
            ScoreFactor::Style => self.style,
            ScoreFactor::Location => self.location,
            ScoreFactor::Rating => self.rating,
            ScoreFactor::Availability => self.availability,
            ScoreFactor::Popularity => self.popularity,
        }
    }

    pub fn sub_scores(&self) -> SubScores {
        SubScores {
            budget_match_score: self.budget.value,
            style_match_score: self.style.value,
            location_match_score: self.location.value,
            rating_score: self.rating.value,
            availability_score: self.availability.value,
            popularity_score: self.popularity.value,
        }
    }

    pub fn real_inputs(&self) -> usize {
        ScoreFactor::ALL.iter().filter(|factor| self.get(**factor).real).count()
    }
}

/// Score calculator for vendor recommendations
#[derive(Debug, Clone)]
pub struct ScoreCalculator {
    policy: ScoringPolicy,
    explainer: ExplanationGenerator,
}

impl ScoreCalculator {
    /// Create a new score calculator with the default policy
    pub fn new() -> Self {
        Self::with_policy(ScoringPolicy::default())
    }

    /// Create with a custom policy
    pub fn with_policy(policy: ScoringPolicy) -> Self {
        let explainer = ExplanationGenerator::new(policy.clone());
        Self { policy, explainer }
    }

    pub fn policy(&self) -> &ScoringPolicy {
        &self.policy
    }

    /// Weighted aggregate of the six sub-scores
    pub fn calculate_total_score(&self, scores: &SubScores) -> f64 {
        let total: f64 = ScoreFactor::ALL
            .iter()
            .map(|factor| scores.get(*factor) * self.policy.weights.get(*factor))
            .sum();
        clamp_score(total)
    }

    /// 100 when the tier's typical cost sits inside the budget, falling
    /// linearly with relative distance from the nearest bound.
    pub fn budget_score(&self, budget: &BudgetRange, tier: PriceTier) -> FactorScore {
        let Some((min, max)) = budget.bounds() else {
            return FactorScore::default_value(super::NEUTRAL_SCORE);
        };

        let typical = self.policy.band(tier).typical;
        let divergence = if typical > max {
            (typical - max) / max.max(1.0)
        } else if typical < min {
            (min - typical) / min.max(1.0)
        } else {
            0.0
        };

        FactorScore::real(100.0 * (1.0 - divergence).max(0.0))
    }

    /// Share of the couple's requested styles that the vendor offers
    pub fn style_score(
        &self,
        wanted: &BTreeSet<String>,
        offered: &BTreeSet<String>,
    ) -> FactorScore {
        if wanted.is_empty() || offered.is_empty() {
            return FactorScore::default_value(super::NEUTRAL_SCORE);
        }

        let shared = wanted.intersection(offered).count();
        FactorScore::real(100.0 * shared as f64 / wanted.len() as f64)
    }

    /// Distance based when both sides carry coordinates, otherwise city/state matching
    pub fn location_score(
        &self,
        preferred: Option<&PreferredLocation>,
        vendor: &Vendor,
    ) -> FactorScore {
        let Some(preferred) = preferred else {
            return FactorScore::default_value(super::NEUTRAL_SCORE);
        };

        if let (Some(origin), Some(vendor_point)) = (preferred.point, vendor.location) {
            let distance = origin.distance_km(&vendor_point);
            return FactorScore::real(
                100.0 * (1.0 - distance / self.policy.location_radius_km).max(0.0),
            );
        }

        let Some(city) = preferred.city() else {
            return FactorScore::default_value(super::NEUTRAL_SCORE);
        };
        let vendor_city = vendor.normalized_city();
        let vendor_state = vendor.normalized_state();
        let state = preferred.state();
        let state_conflict = state
            .as_deref()
            .is_some_and(|state| !vendor_state.is_empty() && state != vendor_state);

        if city == vendor_city && !state_conflict {
            return FactorScore::real(100.0);
        }

        let region = state.unwrap_or(city);
        if !vendor_state.is_empty() && region == vendor_state {
            FactorScore::real(60.0)
        } else {
            FactorScore::real(20.0)
        }
    }

    /// Star rating scaled to 0 - 100
    pub fn rating_score(&self, vendor: &Vendor) -> FactorScore {
        match vendor.average_rating {
            Some(rating) if vendor.has_reviews() => {
                FactorScore::real(rating.clamp(0.0, 5.0) / 5.0 * 100.0)
            }
            _ => FactorScore::default_value(self.policy.unreviewed_rating_score),
        }
    }

    pub fn availability_score(
        &self,
        wedding_date: Option<NaiveDate>,
        availability: &Availability,
    ) -> FactorScore {
        let Some(date) = wedding_date else {
            return FactorScore::default_value(100.0);
        };

        match availability.on(date) {
            DateAvailability::Available => FactorScore::real(100.0),
            DateAvailability::Unavailable => FactorScore::real(0.0),
            DateAvailability::Unknown => FactorScore::default_value(super::NEUTRAL_SCORE),
        }
    }

    /// Mid-rank percentile of each vendor's popularity within the pool
    pub fn popularity_scores(&self, vendors: &[Vendor]) -> Vec<FactorScore> {
        if vendors.len() < 2 {
            return vec![FactorScore::default_value(super::NEUTRAL_SCORE); vendors.len()];
        }

        let signals: Vec<f64> = vendors
            .iter()
            .map(|vendor| {
                let signal = vendor.popularity_signal;
                if signal.is_finite() {
                    signal.max(0.0)
                } else {
                    0.0
                }
            })
            .collect();
        let peers = (signals.len() - 1) as f64;

        signals
            .iter()
            .map(|signal| {
                let below = signals.iter().filter(|other| *other < signal).count() as f64;
                let ties = signals.iter().filter(|other| *other == signal).count() as f64 - 1.0;
                FactorScore::real(100.0 * (below + ties / 2.0) / peers)
            })
            .collect()
    }

    pub fn breakdown(
        &self,
        preferences: &WeddingPreferences,
        wanted_styles: &BTreeSet<String>,
        vendor: &Vendor,
        popularity: FactorScore,
    ) -> FactorBreakdown {
        FactorBreakdown {
            budget: self.budget_score(&preferences.budget, vendor.price_tier),
            style: self.style_score(wanted_styles, &vendor.normalized_styles()),
            location: self.location_score(preferences.location(), vendor),
            rating: self.rating_score(vendor),
            availability: self.availability_score(preferences.wedding_date, &vendor.availability),
            popularity,
        }
    }

    /// Score a single vendor
    pub fn score_vendor(
        &self,
        preferences: &WeddingPreferences,
        wanted_styles: &BTreeSet<String>,
        vendor: &Vendor,
        popularity: FactorScore,
        interested: Option<bool>,
    ) -> RecommendationScore {
        let breakdown = self.breakdown(preferences, wanted_styles, vendor, popularity);
        let sub_scores = breakdown.sub_scores();
        let explanation = self.explainer.explain(preferences, vendor, &breakdown);

        RecommendationScore {
            vendor_id: vendor.id.clone(),
            vendor_name: vendor.name.clone(),
            category: vendor.category,
            match_score: self.calculate_total_score(&sub_scores),
            sub_scores,
            confidence_level: ConfidenceLevel::from_real_inputs(breakdown.real_inputs()),
            reason: explanation.reason,
            match_highlights: explanation.highlights,
            potential_concerns: explanation.concerns,
            interested,
            review_count: vendor.review_count,
        }
    }

    /// Score the whole pool, rank it and keep the top `limit`.
    pub fn rank(
        &self,
        preferences: &WeddingPreferences,
        vendors: &[Vendor],
        interest: &HashMap<VendorId, bool>,
        limit: usize,
    ) -> Vec<RecommendationScore> {
        let wanted_styles = preferences.normalized_styles();
        let popularity = self.popularity_scores(vendors);

        let mut scored: Vec<RecommendationScore> = vendors
            .iter()
            .zip(popularity)
            .map(|(vendor, popularity)| {
                self.score_vendor(
                    preferences,
                    &wanted_styles,
                    vendor,
                    popularity,
                    interest.get(&vendor.id).copied(),
                )
            })
            .collect();

        scored.sort_by(compare_ranked);
        scored.truncate(limit);
        scored
    }
}

impl Default for ScoreCalculator {
    fn default() -> Self {
        Self::new()
    }
}

/// Match score descending, then review count descending, then vendor id ascending.
pub fn compare_ranked(a: &RecommendationScore, b: &RecommendationScore) -> Ordering {
    b.match_score
        .total_cmp(&a.match_score)
        .then_with(|| b.review_count.cmp(&a.review_count))
        .then_with(|| a.vendor_id.cmp(&b.vendor_id))
}
