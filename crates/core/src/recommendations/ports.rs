//! Store contracts the recommendation core reads from and writes to.

use std::collections::BTreeSet;

use async_trait::async_trait;

use crate::domain::interaction::{latest_interest, InteractionRecord};
use crate::domain::vendor::{Vendor, VendorCategory, VendorId};
use crate::domain::wedding::{WeddingId, WeddingPreferences};
use crate::errors::StoreError;

#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn wedding_exists(&self, wedding_id: &WeddingId) -> Result<bool, StoreError>;
    async fn find_preferences(
        &self,
        wedding_id: &WeddingId,
    ) -> Result<Option<WeddingPreferences>, StoreError>;
    async fn save_preferences(&self, preferences: WeddingPreferences) -> Result<(), StoreError>;
}

/// Candidate selection pushed down to the catalog so large pools are cut
/// before scoring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidateQuery {
    pub category: Option<VendorCategory>,
    pub exclude: BTreeSet<VendorId>,
    /// Normalized city; matching vendors are taken first when the pool is capped.
    pub preferred_city: Option<String>,
    /// Normalized state/region; taken after city matches.
    pub preferred_state: Option<String>,
    pub limit: usize,
}

impl CandidateQuery {
    pub fn matches(&self, vendor: &Vendor) -> bool {
        vendor.active
            && self.category.map_or(true, |category| vendor.category == category)
            && !self.exclude.contains(&vendor.id)
    }

    /// 0 for a city match, 1 for a region match, 2 otherwise. A city match in
    /// a different named state is no match.
    pub fn region_rank(&self, vendor: &Vendor) -> u8 {
        let vendor_state = vendor.normalized_state();
        let state_agrees = self
            .preferred_state
            .as_deref()
            .map_or(true, |state| vendor_state.is_empty() || state == vendor_state);

        if state_agrees
            && self.preferred_city.as_deref().is_some_and(|city| city == vendor.normalized_city())
        {
            0
        } else if self.preferred_state.as_deref().is_some_and(|state| state == vendor_state) {
            1
        } else {
            2
        }
    }
}

#[async_trait]
pub trait VendorCatalog: Send + Sync {
    async fn find_vendor(&self, vendor_id: &VendorId) -> Result<Option<Vendor>, StoreError>;

    /// Active vendors matching `query`, ordered region first, then
    /// popularity descending, then id ascending, at most `query.limit`.
    async fn list_candidates(&self, query: &CandidateQuery) -> Result<Vec<Vendor>, StoreError>;
}

#[async_trait]
pub trait InteractionLog: Send + Sync {
    async fn append(&self, record: InteractionRecord) -> Result<(), StoreError>;

    async fn list_for_wedding(
        &self,
        wedding_id: &WeddingId,
    ) -> Result<Vec<InteractionRecord>, StoreError>;

    /// Current interest for one pair, derived from the latest save/dismiss.
    async fn current_interest(
        &self,
        wedding_id: &WeddingId,
        vendor_id: &VendorId,
    ) -> Result<Option<bool>, StoreError> {
        let records = self.list_for_wedding(wedding_id).await?;
        Ok(latest_interest(&records).get(vendor_id).copied())
    }
}
