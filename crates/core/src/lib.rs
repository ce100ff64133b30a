pub mod config;
pub mod domain;
pub mod errors;
pub mod recommendations;

pub use domain::interaction::{InteractionRecord, InteractionType};
pub use domain::vendor::{Availability, GeoPoint, PriceTier, Vendor, VendorCategory, VendorId};
pub use domain::wedding::{BudgetRange, PreferredLocation, WeddingId, WeddingPreferences};
pub use errors::{DomainError, InterfaceError, RecommendationError, StoreError};
pub use recommendations::{
    RecommendationEngine, RecommendationRequest, RecommendationResponse, RecommendationScore,
    RecommendationServices, Stores,
};
