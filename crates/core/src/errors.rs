use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

/// Failure reported by a store adapter (preferences, catalog, interaction log, cache).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store returned undecodable data: {0}")]
    Decode(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RecommendationError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),
}

impl From<DomainError> for RecommendationError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::InvariantViolation(message) => Self::InvalidInput(message),
        }
    }
}

impl From<StoreError> for RecommendationError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Unavailable(message) | StoreError::Decode(message) => {
                Self::UpstreamUnavailable(message)
            }
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
    #[error("internal error: {message}")]
    Internal { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::NotFound { .. } => "We could not find that wedding or vendor.",
            Self::ServiceUnavailable { .. } => {
                "Recommendations are temporarily unavailable. Please retry shortly."
            }
            Self::Internal { .. } => "An unexpected internal error occurred.",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message, .. }
            | Self::NotFound { message, .. }
            | Self::ServiceUnavailable { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }
}

impl RecommendationError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. }
            | InterfaceError::Internal { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<RecommendationError> for InterfaceError {
    fn from(value: RecommendationError) -> Self {
        let correlation_id = "unassigned".to_owned();
        match value {
            RecommendationError::InvalidInput(message) => Self::BadRequest { message, correlation_id },
            RecommendationError::NotFound(message) => Self::NotFound { message, correlation_id },
            RecommendationError::UpstreamUnavailable(message) => {
                Self::ServiceUnavailable { message, correlation_id }
            }
            // The engine degrades instead of surfacing cache failures; reaching
            // the interface with one is a wiring bug.
            RecommendationError::CacheUnavailable(message) => {
                Self::Internal { message, correlation_id }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{DomainError, InterfaceError, RecommendationError, StoreError};

    #[test]
    fn domain_error_maps_to_bad_request_interface_error() {
        let interface = RecommendationError::from(DomainError::InvariantViolation(
            "limit must be positive".to_owned(),
        ))
        .into_interface("req-1");

        assert!(matches!(
            interface,
            InterfaceError::BadRequest {
                ref correlation_id,
                ..
            } if correlation_id == "req-1"
        ));
        assert_eq!(
            interface.user_message(),
            "The request could not be processed. Check inputs and try again."
        );
    }

    #[test]
    fn store_failure_maps_to_service_unavailable() {
        let interface =
            RecommendationError::from(StoreError::Unavailable("database lock timeout".to_owned()))
                .into_interface("req-2");

        assert!(matches!(interface, InterfaceError::ServiceUnavailable { .. }));
        assert_eq!(interface.message(), "database lock timeout");
    }

    #[test]
    fn not_found_stays_distinct_from_bad_request() {
        let interface =
            RecommendationError::NotFound("wedding `W-404`".to_owned()).into_interface("req-3");

        assert!(matches!(interface, InterfaceError::NotFound { .. }));
        assert_eq!(interface.user_message(), "We could not find that wedding or vendor.");
    }
}
