use std::collections::BTreeSet;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::vendor::GeoPoint;
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct WeddingId(pub String);

impl std::fmt::Display for WeddingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Stated budget for a single vendor booking. Either bound may be missing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BudgetRange {
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
}

impl BudgetRange {
    pub fn new(min: Option<Decimal>, max: Option<Decimal>) -> Self {
        Self { min, max }
    }

    pub fn is_set(&self) -> bool {
        self.min.is_some() || self.max.is_some()
    }

    /// Bounds as floats, with a missing minimum read as zero and a missing
    /// maximum read as unbounded.
    pub fn bounds(&self) -> Option<(f64, f64)> {
        if !self.is_set() {
            return None;
        }
        let min = self.min.and_then(|value| value.to_f64()).unwrap_or(0.0);
        let max = self.max.and_then(|value| value.to_f64()).unwrap_or(f64::INFINITY);
        Some((min, max))
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        for (field, value) in [("budget_min", self.min), ("budget_max", self.max)] {
            if value.is_some_and(|amount| amount.is_sign_negative() && !amount.is_zero()) {
                return Err(DomainError::InvariantViolation(format!(
                    "{field} must be non-negative"
                )));
            }
        }
        if let (Some(min), Some(max)) = (self.min, self.max) {
            if min > max {
                return Err(DomainError::InvariantViolation(
                    "budget_min must not exceed budget_max".to_owned(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PreferredLocation {
    /// Free text such as `Austin` or `Austin, TX`.
    pub label: String,
    pub point: Option<GeoPoint>,
}

impl PreferredLocation {
    pub fn city(&self) -> Option<String> {
        self.parts().0
    }

    pub fn state(&self) -> Option<String> {
        self.parts().1
    }

    fn parts(&self) -> (Option<String>, Option<String>) {
        let mut parts = self
            .label
            .split(',')
            .map(normalize_place)
            .filter(|part| !part.is_empty());
        (parts.next(), parts.next())
    }

    pub fn is_set(&self) -> bool {
        !self.label.trim().is_empty() || self.point.is_some()
    }
}

/// Lowercased with runs of whitespace collapsed to one space.
pub fn normalize_place(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ").to_ascii_lowercase()
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeddingPreferences {
    pub wedding_id: WeddingId,
    pub budget: BudgetRange,
    pub style_tags: BTreeSet<String>,
    pub preferred_location: Option<PreferredLocation>,
    pub wedding_date: Option<NaiveDate>,
}

impl WeddingPreferences {
    pub fn new(wedding_id: WeddingId) -> Self {
        Self {
            wedding_id,
            budget: BudgetRange::default(),
            style_tags: BTreeSet::new(),
            preferred_location: None,
            wedding_date: None,
        }
    }

    /// Style tags lowercased and trimmed, ready for set comparison.
    pub fn normalized_styles(&self) -> BTreeSet<String> {
        normalize_tags(&self.style_tags)
    }

    pub fn location(&self) -> Option<&PreferredLocation> {
        self.preferred_location.as_ref().filter(|location| location.is_set())
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.wedding_id.0.trim().is_empty() {
            return Err(DomainError::InvariantViolation("wedding_id is required".to_owned()));
        }
        self.budget.validate()?;
        if self.style_tags.iter().any(|tag| tag.trim().is_empty()) {
            return Err(DomainError::InvariantViolation(
                "style_tags must not contain empty values".to_owned(),
            ));
        }
        if let Some(point) = self.preferred_location.as_ref().and_then(|location| location.point) {
            point.validate()?;
        }
        Ok(())
    }
}

pub fn normalize_tags(tags: &BTreeSet<String>) -> BTreeSet<String> {
    tags.iter()
        .map(|tag| tag.trim().to_ascii_lowercase())
        .filter(|tag| !tag.is_empty())
        .collect()
}
