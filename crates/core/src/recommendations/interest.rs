//! Save / dismiss / view write path.

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};

use super::engine::{warn_cache_unavailable, with_retry, EngineSettings};
use super::{RecommendationResult, Stores};
use crate::domain::interaction::{InteractionRecord, InteractionType};
use crate::domain::vendor::VendorId;
use crate::domain::wedding::WeddingId;
use crate::errors::RecommendationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InterestOutcome {
    pub success: bool,
    pub message: String,
    /// False when the interaction was skipped as a duplicate.
    #[serde(skip)]
    pub recorded: bool,
}

impl InterestOutcome {
    fn accepted(message: &str) -> Self {
        Self { success: true, message: message.to_owned(), recorded: true }
    }
}

/// How cached results react to an interest change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CacheAction {
    Patch,
    Invalidate,
}

impl CacheAction {
    /// A dismiss, or a save reversing one, changes which vendors are ranked.
    fn for_change(previous: Option<bool>, interested: bool) -> Self {
        if interested && previous != Some(false) {
            Self::Patch
        } else {
            Self::Invalidate
        }
    }
}

pub struct InterestHandler {
    stores: Stores,
    settings: EngineSettings,
}

impl InterestHandler {
    pub fn new(stores: Stores, settings: EngineSettings) -> Self {
        Self { stores, settings }
    }

    pub async fn record_interest(
        &self,
        wedding_id: &str,
        vendor_id: &str,
        interested: bool,
    ) -> RecommendationResult<InterestOutcome> {
        let (wedding_id, vendor_id) = self.resolve(wedding_id, vendor_id).await?;

        let previous = with_retry(self.settings.retry_backoff, "current_interest", || {
            self.stores.interactions.current_interest(&wedding_id, &vendor_id)
        })
        .await?;

        if self.settings.dedupe_consecutive_interest && previous == Some(interested) {
            debug!(
                event_name = "recommendations.interest.duplicate",
                wedding_id = %wedding_id,
                vendor_id = %vendor_id,
                interested,
                "interest unchanged, not appended"
            );
            return Ok(InterestOutcome {
                success: true,
                message: "Interest already recorded".to_owned(),
                recorded: false,
            });
        }

        let interaction_type = InteractionType::from_interest(interested);
        self.append(&wedding_id, &vendor_id, interaction_type).await?;

        let action = CacheAction::for_change(previous, interested);
        let outcome = match action {
            CacheAction::Patch => {
                self.stores.cache.patch_interest(&wedding_id, &vendor_id, interested).await
            }
            CacheAction::Invalidate => self.stores.cache.invalidate(&wedding_id).await,
        };
        if let Err(error) = outcome {
            warn_cache_unavailable("interest", &wedding_id, error);
        }

        info!(
            event_name = "recommendations.interest.recorded",
            wedding_id = %wedding_id,
            vendor_id = %vendor_id,
            interaction_type = interaction_type.as_str(),
            cache_action = ?action,
            "recorded vendor interest"
        );

        Ok(InterestOutcome::accepted(if interested {
            "Vendor saved"
        } else {
            "Vendor dismissed"
        }))
    }

    /// Views are logged only; they never touch interest or cached results.
    pub async fn record_view(
        &self,
        wedding_id: &str,
        vendor_id: &str,
    ) -> RecommendationResult<InterestOutcome> {
        let (wedding_id, vendor_id) = self.resolve(wedding_id, vendor_id).await?;
        self.append(&wedding_id, &vendor_id, InteractionType::View).await?;

        debug!(
            event_name = "recommendations.view.recorded",
            wedding_id = %wedding_id,
            vendor_id = %vendor_id,
            "recorded vendor view"
        );
        Ok(InterestOutcome::accepted("View recorded"))
    }

    pub async fn record_interaction(
        &self,
        wedding_id: &str,
        vendor_id: &str,
        interaction_type: &str,
    ) -> RecommendationResult<InterestOutcome> {
        let interaction_type: InteractionType = interaction_type.parse()?;
        match interaction_type.interest() {
            Some(interested) => self.record_interest(wedding_id, vendor_id, interested).await,
            None => self.record_view(wedding_id, vendor_id).await,
        }
    }

    async fn resolve(
        &self,
        wedding_id: &str,
        vendor_id: &str,
    ) -> RecommendationResult<(WeddingId, VendorId)> {
        let wedding_id = wedding_id.trim();
        let vendor_id = vendor_id.trim();
        if wedding_id.is_empty() || vendor_id.is_empty() {
            return Err(RecommendationError::InvalidInput(
                "wedding_id and vendor_id are required".to_owned(),
            ));
        }
        let wedding_id = WeddingId(wedding_id.to_owned());
        let vendor_id = VendorId(vendor_id.to_owned());

        let exists = with_retry(self.settings.retry_backoff, "wedding_exists", || {
            self.stores.preferences.wedding_exists(&wedding_id)
        })
        .await?;
        if !exists {
            return Err(RecommendationError::NotFound(format!(
                "wedding `{wedding_id}` does not exist"
            )));
        }

        let vendor = with_retry(self.settings.retry_backoff, "find_vendor", || {
            self.stores.vendors.find_vendor(&vendor_id)
        })
        .await?;
        if vendor.is_none() {
            return Err(RecommendationError::NotFound(format!(
                "vendor `{vendor_id}` does not exist"
            )));
        }

        Ok((wedding_id, vendor_id))
    }

    async fn append(
        &self,
        wedding_id: &WeddingId,
        vendor_id: &VendorId,
        interaction_type: InteractionType,
    ) -> RecommendationResult<()> {
        let record = InteractionRecord::new(
            wedding_id.clone(),
            vendor_id.clone(),
            interaction_type,
            Utc::now(),
        );
        with_retry(self.settings.retry_backoff, "append_interaction", || {
            self.stores.interactions.append(record.clone())
        })
        .await
    }
}
