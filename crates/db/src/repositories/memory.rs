use std::collections::{HashMap, HashSet};

use tokio::sync::RwLock;

use wedmatch_core::domain::interaction::InteractionRecord;
use wedmatch_core::domain::vendor::{Vendor, VendorId};
use wedmatch_core::domain::wedding::{WeddingId, WeddingPreferences};
use wedmatch_core::errors::StoreError;
use wedmatch_core::recommendations::{
    CandidateQuery, InteractionLog, PreferenceStore, VendorCatalog,
};

#[derive(Default)]
pub struct InMemoryPreferenceStore {
    weddings: RwLock<HashSet<WeddingId>>,
    preferences: RwLock<HashMap<WeddingId, WeddingPreferences>>,
}

impl InMemoryPreferenceStore {
    pub async fn add_wedding(&self, wedding_id: WeddingId) {
        self.weddings.write().await.insert(wedding_id);
    }
}

#[async_trait::async_trait]
impl PreferenceStore for InMemoryPreferenceStore {
    async fn wedding_exists(&self, wedding_id: &WeddingId) -> Result<bool, StoreError> {
        Ok(self.weddings.read().await.contains(wedding_id))
    }

    async fn find_preferences(
        &self,
        wedding_id: &WeddingId,
    ) -> Result<Option<WeddingPreferences>, StoreError> {
        let preferences = self.preferences.read().await;
        Ok(preferences.get(wedding_id).cloned())
    }

    async fn save_preferences(&self, preferences: WeddingPreferences) -> Result<(), StoreError> {
        if !self.weddings.read().await.contains(&preferences.wedding_id) {
            return Err(StoreError::Unavailable(format!(
                "wedding `{}` is not registered",
                preferences.wedding_id
            )));
        }
        let mut stored = self.preferences.write().await;
        stored.insert(preferences.wedding_id.clone(), preferences);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryVendorCatalog {
    vendors: RwLock<HashMap<VendorId, Vendor>>,
}

impl InMemoryVendorCatalog {
    pub async fn save_vendor(&self, vendor: Vendor) {
        self.vendors.write().await.insert(vendor.id.clone(), vendor);
    }
}

#[async_trait::async_trait]
impl VendorCatalog for InMemoryVendorCatalog {
    async fn find_vendor(&self, vendor_id: &VendorId) -> Result<Option<Vendor>, StoreError> {
        let vendors = self.vendors.read().await;
        Ok(vendors.get(vendor_id).cloned())
    }

    async fn list_candidates(&self, query: &CandidateQuery) -> Result<Vec<Vendor>, StoreError> {
        let vendors = self.vendors.read().await;
        let mut candidates: Vec<Vendor> =
            vendors.values().filter(|vendor| query.matches(vendor)).cloned().collect();
        candidates.sort_by(|left, right| {
            query
                .region_rank(left)
                .cmp(&query.region_rank(right))
                .then_with(|| right.popularity_signal.total_cmp(&left.popularity_signal))
                .then_with(|| left.id.cmp(&right.id))
        });
        candidates.truncate(query.limit);
        Ok(candidates)
    }
}

#[derive(Default)]
pub struct InMemoryInteractionLog {
    records: RwLock<Vec<InteractionRecord>>,
}

#[async_trait::async_trait]
impl InteractionLog for InMemoryInteractionLog {
    async fn append(&self, record: InteractionRecord) -> Result<(), StoreError> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn list_for_wedding(
        &self,
        wedding_id: &WeddingId,
    ) -> Result<Vec<InteractionRecord>, StoreError> {
        let records = self.records.read().await;
        Ok(records.iter().filter(|record| &record.wedding_id == wedding_id).cloned().collect())
    }
}
