//! JSON API over the recommendation services.
//!
//! Errors are rendered as `{ error, detail, correlation_id }` with 400 for bad
//! input, 404 for unknown weddings or vendors and 503 when a store stays
//! unavailable after its retry.

use std::collections::BTreeSet;

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::{HeaderMap, StatusCode},
    routing::{get, post, put},
    Json, Router,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use wedmatch_core::domain::vendor::GeoPoint;
use wedmatch_core::domain::wedding::{
    BudgetRange, PreferredLocation, WeddingId, WeddingPreferences,
};
use wedmatch_core::recommendations::{InterestOutcome, RecommendationRequest};
use wedmatch_core::{InterfaceError, RecommendationError, RecommendationResponse};
use wedmatch_core::RecommendationServices;

pub const CORRELATION_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct ApiState {
    services: RecommendationServices,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecommendationsParams {
    pub category: Option<String>,
    pub limit: Option<i64>,
    #[serde(default)]
    pub refresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct InterestBody {
    pub vendor_id: String,
    pub interested: bool,
}

#[derive(Debug, Deserialize)]
pub struct InteractionBody {
    pub wedding_id: String,
    pub vendor_id: String,
    pub interaction_type: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PreferencesBody {
    pub budget_min: Option<Decimal>,
    pub budget_max: Option<Decimal>,
    #[serde(default)]
    pub style_tags: BTreeSet<String>,
    pub preferred_location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub wedding_date: Option<NaiveDate>,
}

impl PreferencesBody {
    fn into_preferences(self, wedding_id: String) -> WeddingPreferences {
        let point = self
            .latitude
            .zip(self.longitude)
            .map(|(latitude, longitude)| GeoPoint { latitude, longitude });
        let preferred_location = match (self.preferred_location, point) {
            (None, None) => None,
            (label, point) => Some(PreferredLocation { label: label.unwrap_or_default(), point }),
        };
        WeddingPreferences {
            wedding_id: WeddingId(wedding_id),
            budget: BudgetRange::new(self.budget_min, self.budget_max),
            style_tags: self.style_tags,
            preferred_location,
            wedding_date: self.wedding_date,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
    pub detail: String,
    pub correlation_id: String,
}

type ApiError = (StatusCode, Json<ErrorBody>);

pub fn router(services: RecommendationServices) -> Router {
    Router::new()
        .route("/api/v1/weddings/{wedding_id}/recommendations", get(get_recommendations))
        .route(
            "/api/v1/weddings/{wedding_id}/recommendations/interest",
            post(record_interest),
        )
        .route("/api/v1/weddings/{wedding_id}/preferences", put(upsert_preferences))
        .route("/api/v1/interactions", post(record_interaction))
        .with_state(ApiState { services })
}

pub async fn get_recommendations(
    State(state): State<ApiState>,
    Path(wedding_id): Path<String>,
    params: Result<Query<RecommendationsParams>, QueryRejection>,
    headers: HeaderMap,
) -> Result<Json<RecommendationResponse>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let Query(params) =
        params.map_err(|rejection| malformed(rejection.body_text(), &correlation_id))?;
    let mut request = RecommendationRequest::new(wedding_id).with_refresh(params.refresh);
    if let Some(category) = params.category {
        request = request.with_category(category);
    }
    if let Some(limit) = params.limit {
        request = request.with_limit(limit);
    }

    let response = state
        .services
        .engine
        .fetch(&request)
        .await
        .map_err(|error| reject(error, &correlation_id))?;

    info!(
        event_name = "api.recommendations.served",
        correlation_id = %correlation_id,
        wedding_id = %request.wedding_id,
        returned = response.recommendations.len(),
        from_cache = response.from_cache,
        "recommendations served"
    );
    Ok(Json(response))
}

pub async fn record_interest(
    State(state): State<ApiState>,
    Path(wedding_id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<InterestBody>, JsonRejection>,
) -> Result<Json<InterestOutcome>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let Json(body) = body.map_err(|rejection| malformed(rejection.body_text(), &correlation_id))?;
    state
        .services
        .interest
        .record_interest(&wedding_id, &body.vendor_id, body.interested)
        .await
        .map(Json)
        .map_err(|error| reject(error, &correlation_id))
}

pub async fn record_interaction(
    State(state): State<ApiState>,
    headers: HeaderMap,
    body: Result<Json<InteractionBody>, JsonRejection>,
) -> Result<Json<InterestOutcome>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let Json(body) = body.map_err(|rejection| malformed(rejection.body_text(), &correlation_id))?;
    state
        .services
        .interest
        .record_interaction(&body.wedding_id, &body.vendor_id, &body.interaction_type)
        .await
        .map(Json)
        .map_err(|error| reject(error, &correlation_id))
}

pub async fn upsert_preferences(
    State(state): State<ApiState>,
    Path(wedding_id): Path<String>,
    headers: HeaderMap,
    body: Result<Json<PreferencesBody>, JsonRejection>,
) -> Result<Json<WeddingPreferences>, ApiError> {
    let correlation_id = correlation_id(&headers);
    let Json(body) = body.map_err(|rejection| malformed(rejection.body_text(), &correlation_id))?;
    state
        .services
        .preferences
        .upsert_preferences(body.into_preferences(wedding_id))
        .await
        .map(Json)
        .map_err(|error| reject(error, &correlation_id))
}

fn correlation_id(headers: &HeaderMap) -> String {
    headers
        .get(CORRELATION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(|| format!("req-{}", Uuid::new_v4().simple()))
}

/// Extractor failures share the error body of every other bad request.
fn malformed(detail: String, correlation_id: &str) -> ApiError {
    reject(RecommendationError::InvalidInput(detail), correlation_id)
}

fn reject(error: RecommendationError, correlation_id: &str) -> ApiError {
    let interface = error.into_interface(correlation_id);
    let status = match &interface {
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        InterfaceError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };

    warn!(
        event_name = "api.request.failed",
        correlation_id = %correlation_id,
        status = status.as_u16(),
        error = %interface,
        "request failed"
    );

    (
        status,
        Json(ErrorBody {
            error: interface.user_message().to_owned(),
            detail: interface.message().to_owned(),
            correlation_id: correlation_id.to_owned(),
        }),
    )
}
