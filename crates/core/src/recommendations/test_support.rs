//! In-process store fakes for unit tests of the recommendation services.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use super::cache::{InMemoryRecommendationCache, RecommendationCache};
use super::ports::{CandidateQuery, InteractionLog, PreferenceStore, VendorCatalog};
use super::types::{CacheEntry, CacheKey};
use super::Stores;
use crate::domain::interaction::InteractionRecord;
use crate::domain::vendor::{Availability, PriceTier, Vendor, VendorCategory, VendorId};
use crate::domain::wedding::{BudgetRange, PreferredLocation, WeddingId, WeddingPreferences};
use crate::errors::StoreError;

#[derive(Default)]
pub struct FakePreferences {
    weddings: RwLock<HashSet<WeddingId>>,
    preferences: RwLock<HashMap<WeddingId, WeddingPreferences>>,
}

impl FakePreferences {
    pub async fn add_wedding(&self, wedding_id: &str) {
        self.weddings.write().await.insert(WeddingId(wedding_id.to_owned()));
    }

    pub async fn add_preferences(&self, preferences: WeddingPreferences) {
        self.weddings.write().await.insert(preferences.wedding_id.clone());
        self.preferences.write().await.insert(preferences.wedding_id.clone(), preferences);
    }
}

#[async_trait]
impl PreferenceStore for FakePreferences {
    async fn wedding_exists(&self, wedding_id: &WeddingId) -> Result<bool, StoreError> {
        Ok(self.weddings.read().await.contains(wedding_id))
    }

    async fn find_preferences(
        &self,
        wedding_id: &WeddingId,
    ) -> Result<Option<WeddingPreferences>, StoreError> {
        Ok(self.preferences.read().await.get(wedding_id).cloned())
    }

    async fn save_preferences(&self, preferences: WeddingPreferences) -> Result<(), StoreError> {
        self.preferences.write().await.insert(preferences.wedding_id.clone(), preferences);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeCatalog {
    vendors: RwLock<Vec<Vendor>>,
    pub candidate_calls: AtomicUsize,
}

impl FakeCatalog {
    pub async fn add(&self, vendor: Vendor) {
        self.vendors.write().await.push(vendor);
    }
}

#[async_trait]
impl VendorCatalog for FakeCatalog {
    async fn find_vendor(&self, vendor_id: &VendorId) -> Result<Option<Vendor>, StoreError> {
        Ok(self.vendors.read().await.iter().find(|vendor| &vendor.id == vendor_id).cloned())
    }

    async fn list_candidates(&self, query: &CandidateQuery) -> Result<Vec<Vendor>, StoreError> {
        self.candidate_calls.fetch_add(1, Ordering::SeqCst);
        let mut vendors: Vec<Vendor> =
            self.vendors.read().await.iter().filter(|vendor| query.matches(vendor)).cloned().collect();
        vendors.sort_by(|a, b| {
            query
                .region_rank(a)
                .cmp(&query.region_rank(b))
                .then_with(|| b.popularity_signal.total_cmp(&a.popularity_signal))
                .then_with(|| a.id.cmp(&b.id))
        });
        vendors.truncate(query.limit);
        Ok(vendors)
    }
}

#[derive(Default)]
pub struct FakeInteractions {
    records: RwLock<Vec<InteractionRecord>>,
}

impl FakeInteractions {
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

#[async_trait]
impl InteractionLog for FakeInteractions {
    async fn append(&self, record: InteractionRecord) -> Result<(), StoreError> {
        self.records.write().await.push(record);
        Ok(())
    }

    async fn list_for_wedding(
        &self,
        wedding_id: &WeddingId,
    ) -> Result<Vec<InteractionRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|record| &record.wedding_id == wedding_id)
            .cloned()
            .collect())
    }
}

/// Cache whose every call fails.
pub struct BrokenCache;

#[async_trait]
impl RecommendationCache for BrokenCache {
    async fn get(&self, _key: &CacheKey) -> Result<Option<CacheEntry>, StoreError> {
        Err(StoreError::Unavailable("cache offline".to_owned()))
    }

    async fn put(&self, _key: &CacheKey, _entry: CacheEntry) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("cache offline".to_owned()))
    }

    async fn invalidate(&self, _wedding_id: &WeddingId) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("cache offline".to_owned()))
    }

    async fn patch_interest(
        &self,
        _wedding_id: &WeddingId,
        _vendor_id: &VendorId,
        _interested: bool,
    ) -> Result<(), StoreError> {
        Err(StoreError::Unavailable("cache offline".to_owned()))
    }
}

#[derive(Default)]
pub struct Fixture {
    pub preferences: Arc<FakePreferences>,
    pub vendors: Arc<FakeCatalog>,
    pub interactions: Arc<FakeInteractions>,
    pub cache: Arc<InMemoryRecommendationCache>,
}

impl Fixture {
    pub fn stores(&self) -> Stores {
        Stores {
            preferences: self.preferences.clone(),
            vendors: self.vendors.clone(),
            interactions: self.interactions.clone(),
            cache: self.cache.clone(),
        }
    }
}

/// Austin, TX wedding with a $2,000 to $4,000 budget and rustic style.
pub fn austin_wedding() -> WeddingPreferences {
    WeddingPreferences {
        wedding_id: WeddingId("W-1".to_owned()),
        budget: BudgetRange::new(Some(Decimal::new(2000, 0)), Some(Decimal::new(4000, 0))),
        style_tags: BTreeSet::from(["Rustic".to_owned()]),
        preferred_location: Some(PreferredLocation { label: "Austin, TX".to_owned(), point: None }),
        wedding_date: NaiveDate::from_ymd_opt(2025, 10, 18),
    }
}

pub fn photographer(id: &str, city: &str, rating: f64, reviews: u32) -> Vendor {
    Vendor {
        id: VendorId(id.to_owned()),
        name: format!("{city} Photo {id}"),
        category: VendorCategory::Photography,
        price_tier: PriceTier::from_ordinal(2),
        style_tags: BTreeSet::from(["rustic".to_owned(), "outdoor".to_owned()]),
        city: city.to_owned(),
        state: "TX".to_owned(),
        location: None,
        average_rating: Some(rating),
        review_count: reviews,
        availability: Availability::Open,
        popularity_signal: f64::from(reviews),
        active: true,
    }
}

pub fn florist(id: &str, city: &str) -> Vendor {
    Vendor {
        category: VendorCategory::Florist,
        name: format!("{city} Blooms {id}"),
        style_tags: BTreeSet::from(["garden".to_owned()]),
        ..photographer(id, city, 4.5, 12)
    }
}
