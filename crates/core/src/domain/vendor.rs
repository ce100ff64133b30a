use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::wedding::{normalize_place, normalize_tags};
use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VendorId(pub String);

impl std::fmt::Display for VendorId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum VendorCategory {
    Photography,
    Videography,
    Florist,
    Catering,
    Venue,
    Music,
    Planner,
    Bakery,
    Attire,
    HairMakeup,
    Officiant,
    Transportation,
    Rentals,
    Stationery,
}

impl VendorCategory {
    pub const ALL: [VendorCategory; 14] = [
        Self::Photography,
        Self::Videography,
        Self::Florist,
        Self::Catering,
        Self::Venue,
        Self::Music,
        Self::Planner,
        Self::Bakery,
        Self::Attire,
        Self::HairMakeup,
        Self::Officiant,
        Self::Transportation,
        Self::Rentals,
        Self::Stationery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Photography => "Photography",
            Self::Videography => "Videography",
            Self::Florist => "Florist",
            Self::Catering => "Catering",
            Self::Venue => "Venue",
            Self::Music => "Music",
            Self::Planner => "Planner",
            Self::Bakery => "Bakery",
            Self::Attire => "Attire",
            Self::HairMakeup => "HairMakeup",
            Self::Officiant => "Officiant",
            Self::Transportation => "Transportation",
            Self::Rentals => "Rentals",
            Self::Stationery => "Stationery",
        }
    }
}

impl std::fmt::Display for VendorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for VendorCategory {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted: String = value
            .chars()
            .filter(|ch| ch.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        let wanted = match wanted.as_str() {
            "photographer" => "photography",
            "videographer" => "videography",
            "flowers" | "florists" => "florist",
            "caterer" => "catering",
            "dj" | "band" => "music",
            "weddingplanner" => "planner",
            "cake" | "cakes" => "bakery",
            "hairandmakeup" | "beauty" => "hairmakeup",
            other => other,
        };

        Self::ALL
            .iter()
            .copied()
            .find(|category| category.as_str().to_ascii_lowercase() == wanted)
            .ok_or_else(|| {
                DomainError::InvariantViolation(format!("unknown vendor category `{value}`"))
            })
    }
}

/// Relative cost tier. Raw catalog values outside 1..=4 are clamped.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PriceTier(u8);

impl PriceTier {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 4;

    pub fn from_ordinal(raw: i64) -> Self {
        Self(raw.clamp(Self::MIN as i64, Self::MAX as i64) as u8)
    }

    pub fn ordinal(&self) -> u8 {
        self.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    const EARTH_RADIUS_KM: f64 = 6371.0;

    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.latitude.to_radians();
        let lat2 = other.latitude.to_radians();
        let dlat = (other.latitude - self.latitude).to_radians();
        let dlon = (other.longitude - self.longitude).to_radians();

        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * Self::EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if !(-90.0..=90.0).contains(&self.latitude) || !(-180.0..=180.0).contains(&self.longitude)
        {
            return Err(DomainError::InvariantViolation(
                "latitude must be within -90..=90 and longitude within -180..=180".to_owned(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Availability {
    Open,
    Closed,
    Unknown,
    Calendar { booked: BTreeSet<NaiveDate> },
}

/// Availability resolved against a specific wedding date.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DateAvailability {
    Available,
    Unavailable,
    Unknown,
}

impl Availability {
    pub fn on(&self, date: NaiveDate) -> DateAvailability {
        match self {
            Self::Open => DateAvailability::Available,
            Self::Closed => DateAvailability::Unavailable,
            Self::Unknown => DateAvailability::Unknown,
            Self::Calendar { booked } if booked.contains(&date) => DateAvailability::Unavailable,
            Self::Calendar { .. } => DateAvailability::Available,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vendor {
    pub id: VendorId,
    pub name: String,
    pub category: VendorCategory,
    pub price_tier: PriceTier,
    pub style_tags: BTreeSet<String>,
    pub city: String,
    pub state: String,
    pub location: Option<GeoPoint>,
    pub average_rating: Option<f64>,
    pub review_count: u32,
    pub availability: Availability,
    pub popularity_signal: f64,
    pub active: bool,
}

impl Vendor {
    pub fn normalized_styles(&self) -> BTreeSet<String> {
        normalize_tags(&self.style_tags)
    }

    pub fn normalized_city(&self) -> String {
        normalize_place(&self.city)
    }

    pub fn normalized_state(&self) -> String {
        normalize_place(&self.state)
    }

    pub fn has_reviews(&self) -> bool {
        self.review_count > 0 && self.average_rating.is_some()
    }
}
