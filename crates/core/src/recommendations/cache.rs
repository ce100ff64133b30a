//! Recommendation cache contract and the in-process implementations.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::types::{CacheEntry, CacheKey};
use crate::domain::vendor::VendorId;
use crate::domain::wedding::WeddingId;
use crate::errors::StoreError;

/// Memoized scoring results keyed by wedding and category.
///
/// Implementations store whole entries: `put` replaces the entry for a key in
/// one step, so readers never observe a partially written result. Expiry is
/// decided by the caller from `computed_at`.
///
/// `invalidate` and `patch_interest` move a per-wedding watermark to the
/// current instant. A later `put` whose `computed_at` is at or before that
/// watermark is dropped, since its inputs were read before the change.
#[async_trait]
pub trait RecommendationCache: Send + Sync {
    /// Returns the entry with `from_cache` set.
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, StoreError>;
    /// Store the entry unless it predates the wedding's watermark.
    async fn put(&self, key: &CacheKey, entry: CacheEntry) -> Result<(), StoreError>;
    /// Drop every entry for the wedding.
    async fn invalidate(&self, wedding_id: &WeddingId) -> Result<(), StoreError>;
    /// Rewrite the `interested` flag for a vendor across the wedding's entries.
    async fn patch_interest(
        &self,
        wedding_id: &WeddingId,
        vendor_id: &VendorId,
        interested: bool,
    ) -> Result<(), StoreError>;
}

/// Process-local cache. Only consistent for a single server instance.
#[derive(Default)]
pub struct InMemoryRecommendationCache {
    state: RwLock<CacheState>,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<CacheKey, CacheEntry>,
    stale_through: HashMap<WeddingId, DateTime<Utc>>,
}

impl CacheState {
    fn mark_stale(&mut self, wedding_id: &WeddingId) {
        self.stale_through.insert(wedding_id.clone(), Utc::now());
    }

    fn accepts(&self, key: &CacheKey, entry: &CacheEntry) -> bool {
        self.stale_through
            .get(&key.wedding_id)
            .map_or(true, |watermark| entry.computed_at > *watermark)
    }
}

impl InMemoryRecommendationCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.entries.is_empty()
    }
}

#[async_trait]
impl RecommendationCache for InMemoryRecommendationCache {
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>, StoreError> {
        let state = self.state.read().await;
        Ok(state.entries.get(key).cloned().map(|entry| CacheEntry { from_cache: true, ..entry }))
    }

    async fn put(&self, key: &CacheKey, entry: CacheEntry) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        if state.accepts(key, &entry) {
            state.entries.insert(key.clone(), CacheEntry { from_cache: false, ..entry });
        }
        Ok(())
    }

    async fn invalidate(&self, wedding_id: &WeddingId) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.mark_stale(wedding_id);
        state.entries.retain(|key, _| &key.wedding_id != wedding_id);
        Ok(())
    }

    async fn patch_interest(
        &self,
        wedding_id: &WeddingId,
        vendor_id: &VendorId,
        interested: bool,
    ) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        state.mark_stale(wedding_id);
        let entries = state.entries.iter_mut();
        for (_, entry) in entries.filter(|(key, _)| &key.wedding_id == wedding_id) {
            entry.patch_interest(vendor_id, interested);
        }
        Ok(())
    }
}

/// Cache that never stores anything; every request computes fresh.
#[derive(Debug, Default, Clone, Copy)]
pub struct DisabledRecommendationCache;

#[async_trait]
impl RecommendationCache for DisabledRecommendationCache {
    async fn get(&self, _key: &CacheKey) -> Result<Option<CacheEntry>, StoreError> {
        Ok(None)
    }

    async fn put(&self, _key: &CacheKey, _entry: CacheEntry) -> Result<(), StoreError> {
        Ok(())
    }

    async fn invalidate(&self, _wedding_id: &WeddingId) -> Result<(), StoreError> {
        Ok(())
    }

    async fn patch_interest(
        &self,
        _wedding_id: &WeddingId,
        _vendor_id: &VendorId,
        _interested: bool,
    ) -> Result<(), StoreError> {
        Ok(())
    }
}
