use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::vendor::VendorId;
use crate::domain::wedding::WeddingId;
use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionType {
    Save,
    Dismiss,
    View,
}

impl InteractionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Save => "save",
            Self::Dismiss => "dismiss",
            Self::View => "view",
        }
    }

    pub fn from_interest(interested: bool) -> Self {
        if interested {
            Self::Save
        } else {
            Self::Dismiss
        }
    }

    /// Interest value carried by this interaction; views carry none.
    pub fn interest(&self) -> Option<bool> {
        match self {
            Self::Save => Some(true),
            Self::Dismiss => Some(false),
            Self::View => None,
        }
    }
}

impl std::str::FromStr for InteractionType {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "save" => Ok(Self::Save),
            "dismiss" => Ok(Self::Dismiss),
            "view" => Ok(Self::View),
            other => Err(DomainError::InvariantViolation(format!(
                "unsupported interaction type `{other}` (expected save|dismiss|view)"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub id: String,
    pub wedding_id: WeddingId,
    pub vendor_id: VendorId,
    pub interaction_type: InteractionType,
    pub interested: Option<bool>,
    pub recorded_at: DateTime<Utc>,
}

impl InteractionRecord {
    pub fn new(
        wedding_id: WeddingId,
        vendor_id: VendorId,
        interaction_type: InteractionType,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("INT-{}", Uuid::new_v4().simple()),
            wedding_id,
            vendor_id,
            interaction_type,
            interested: interaction_type.interest(),
            recorded_at,
        }
    }
}

/// Current interest per vendor: the most recent save or dismiss wins and
/// views are ignored. Records with equal timestamps keep log order.
pub fn latest_interest(records: &[InteractionRecord]) -> HashMap<VendorId, bool> {
    let mut ordered: Vec<&InteractionRecord> = records.iter().collect();
    ordered.sort_by_key(|record| record.recorded_at);

    let mut current = HashMap::new();
    for record in ordered {
        if let Some(interested) = record.interaction_type.interest() {
            current.insert(record.vendor_id.clone(), interested);
        }
    }
    current
}
