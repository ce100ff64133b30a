//! Reason, highlight and concern generation for scored vendors.

use chrono::NaiveDate;

use super::scoring::{FactorBreakdown, ScoringPolicy};
use super::types::{FactorScore, ScoreFactor};
use crate::domain::vendor::{DateAvailability, Vendor};
use crate::domain::wedding::WeddingPreferences;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Explanation {
    pub reason: String,
    pub highlights: Vec<String>,
    pub concerns: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Severity {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy)]
struct Contribution {
    factor: ScoreFactor,
    score: FactorScore,
    weighted: f64,
}

#[derive(Debug, Clone)]
pub struct ExplanationGenerator {
    policy: ScoringPolicy,
}

impl ExplanationGenerator {
    pub fn new(policy: ScoringPolicy) -> Self {
        Self { policy }
    }

    pub fn explain(
        &self,
        preferences: &WeddingPreferences,
        vendor: &Vendor,
        breakdown: &FactorBreakdown,
    ) -> Explanation {
        let contributions = self.ranked_contributions(breakdown);

        Explanation {
            reason: self.reason(&contributions),
            highlights: self.highlights(&contributions, preferences, vendor),
            concerns: self.concerns(breakdown, preferences, vendor),
        }
    }

    /// Real factors only, strongest weighted contribution first.
    fn ranked_contributions(&self, breakdown: &FactorBreakdown) -> Vec<Contribution> {
        let mut contributions: Vec<Contribution> = ScoreFactor::ALL
            .iter()
            .map(|factor| {
                let score = breakdown.get(*factor);
                Contribution {
                    factor: *factor,
                    score,
                    weighted: score.value * self.policy.weights.get(*factor),
                }
            })
            .filter(|contribution| contribution.score.real)
            .collect();

        contributions.sort_by(|a, b| {
            b.weighted
                .total_cmp(&a.weighted)
                .then_with(|| a.factor.cmp(&b.factor))
        });
        contributions
    }

    fn reason(&self, contributions: &[Contribution]) -> String {
        let Some(top) = contributions.first() else {
            return "A good starting point while you add more wedding details".to_owned();
        };

        if top.score.value <= self.policy.weak_threshold {
            return "A possible fit based on the details we have so far".to_owned();
        }

        if let Some(second) = contributions.get(1) {
            let paired = top.factor.is_preference()
                && second.factor.is_preference()
                && top.score.value >= self.policy.strong_threshold
                && second.score.value >= self.policy.strong_threshold;
            if paired {
                return format!(
                    "Matches your {} and {} preferences",
                    preference_noun(top.factor),
                    preference_noun(second.factor)
                );
            }
        }

        primary_reason(top.factor).to_owned()
    }

    fn highlights(
        &self,
        contributions: &[Contribution],
        preferences: &WeddingPreferences,
        vendor: &Vendor,
    ) -> Vec<String> {
        contributions
            .iter()
            .filter(|contribution| contribution.score.value >= self.policy.strong_threshold)
            .map(|contribution| highlight(contribution.factor, preferences, vendor))
            .collect()
    }

    fn concerns(
        &self,
        breakdown: &FactorBreakdown,
        preferences: &WeddingPreferences,
        vendor: &Vendor,
    ) -> Vec<String> {
        let mut concerns: Vec<(Severity, String)> = Vec::new();
        let weak = |factor: ScoreFactor| {
            let score = breakdown.get(factor);
            score.real && score.value <= self.policy.weak_threshold
        };

        let band = self.policy.band(vendor.price_tier);
        let priced_out = preferences
            .budget
            .bounds()
            .is_some_and(|(_, max)| max.is_finite() && band.low > max);
        if priced_out {
            concerns.push((
                Severity::High,
                "Typical pricing is likely above your maximum budget".to_owned(),
            ));
        } else if weak(ScoreFactor::Budget) {
            concerns.push((Severity::Medium, "Pricing may not line up with your budget".to_owned()));
        }

        if booked_on(preferences.wedding_date, vendor) {
            concerns.push((Severity::High, "Already booked on your wedding date".to_owned()));
        }

        if !vendor.has_reviews() {
            concerns.push((Severity::Medium, "No reviews yet".to_owned()));
        } else if weak(ScoreFactor::Rating) {
            let rating = vendor.average_rating.unwrap_or_default();
            concerns.push((Severity::Medium, format!("Below-average rating ({rating:.1} stars)")));
        }

        if weak(ScoreFactor::Location) {
            concerns.push((Severity::Low, "Based far from your wedding location".to_owned()));
        }
        if weak(ScoreFactor::Style) {
            concerns.push((Severity::Low, "Little overlap with your style preferences".to_owned()));
        }
        if weak(ScoreFactor::Popularity) {
            concerns.push((Severity::Low, "Less established with couples so far".to_owned()));
        }

        // stable: equal severities keep insertion order
        concerns.sort_by(|a, b| b.0.cmp(&a.0));
        concerns.into_iter().map(|(_, text)| text).collect()
    }
}

fn booked_on(date: Option<NaiveDate>, vendor: &Vendor) -> bool {
    date.is_some_and(|date| vendor.availability.on(date) == DateAvailability::Unavailable)
}

fn preference_noun(factor: ScoreFactor) -> &'static str {
    match factor {
        ScoreFactor::Budget => "budget",
        ScoreFactor::Style => "style",
        ScoreFactor::Location => "location",
        ScoreFactor::Rating => "rating",
        ScoreFactor::Availability => "date",
        ScoreFactor::Popularity => "popularity",
    }
}

fn primary_reason(factor: ScoreFactor) -> &'static str {
    match factor {
        ScoreFactor::Budget => "Fits within your budget",
        ScoreFactor::Style => "Matches your style preferences",
        ScoreFactor::Location => "Located near your wedding",
        ScoreFactor::Rating => "Highly rated by other couples",
        ScoreFactor::Availability => "Available on your wedding date",
        ScoreFactor::Popularity => "Popular with couples right now",
    }
}

fn highlight(factor: ScoreFactor, preferences: &WeddingPreferences, vendor: &Vendor) -> String {
    match factor {
        ScoreFactor::Budget => "Pricing fits your budget".to_owned(),
        ScoreFactor::Style => {
            let shared: Vec<String> = preferences
                .normalized_styles()
                .intersection(&vendor.normalized_styles())
                .cloned()
                .collect();
            if shared.is_empty() {
                "Matches your style".to_owned()
            } else {
                format!("Shares your style: {}", shared.join(", "))
            }
        }
        ScoreFactor::Location => format!("Based in {}", vendor.city.trim()),
        ScoreFactor::Rating => format!(
            "Rated {:.1} stars across {} reviews",
            vendor.average_rating.unwrap_or_default(),
            vendor.review_count
        ),
        ScoreFactor::Availability => "Available on your wedding date".to_owned(),
        ScoreFactor::Popularity => "Frequently requested by couples".to_owned(),
    }
}
