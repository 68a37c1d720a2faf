//! Error taxonomy for the reservation pipeline.

use thiserror::Error;

/// Result type alias for engine and adapter operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Typed errors surfaced by the identity gate, the reservation engine, and
/// the adapters. The API layer maps each variant onto a protocol response;
/// adapter failures that are not recognized are wrapped as
/// `StoreUnavailable`.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EngineError {
    /// Input malformed or missing. The caller fixes the input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Missing or invalid tenant or user identity.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Origin not permitted, or tenant disabled.
    #[error("not authorized: {0}")]
    Authorization(String),

    /// Referenced seat or reservation absent.
    #[error("{resource} {id} not found")]
    NotFound {
        /// Kind of the missing record ("seat", "reservation", ...).
        resource: &'static str,
        /// Identifier that failed to resolve.
        id: String,
    },

    /// Invariant violation: seat not available, reservation not ACTIVE,
    /// wrong owner. The caller aborts the flow.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A concurrent holder owns the seat lock, or lock verification failed.
    /// The caller may retry once `expires_in` has elapsed.
    #[error("seat is locked by another request")]
    SeatLocked {
        /// Remaining lock TTL in seconds, when known.
        expires_in: Option<u64>,
    },

    /// Payment reference malformed, failed gateway verification, or carried
    /// a bad signature.
    #[error("payment verification failed: {0}")]
    Payment(String),

    /// Underlying store I/O failure. Retriable.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
}

impl EngineError {
    /// Stable machine-readable code for the API error body.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Authentication(_) => "AUTHENTICATION_ERROR",
            Self::Authorization(_) => "AUTHORIZATION_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::SeatLocked { .. } => "SEAT_LOCKED",
            Self::Payment(_) => "PAYMENT_ERROR",
            Self::StoreUnavailable(_) => "STORE_UNAVAILABLE",
        }
    }

    /// Returns `true` if retrying the same request may succeed later.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::SeatLocked { .. } | Self::StoreUnavailable(_))
    }

    /// Shorthand for a missing-record error.
    #[must_use]
    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource,
            id: id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(
            EngineError::Validation("x".into()).code(),
            "VALIDATION_ERROR"
        );
        assert_eq!(
            EngineError::SeatLocked { expires_in: Some(3) }.code(),
            "SEAT_LOCKED"
        );
        assert_eq!(
            EngineError::not_found("seat", "s-1").to_string(),
            "seat s-1 not found"
        );
    }

    #[test]
    fn retriable_classification() {
        assert!(EngineError::StoreUnavailable("io".into()).is_retriable());
        assert!(EngineError::SeatLocked { expires_in: None }.is_retriable());
        assert!(!EngineError::Conflict("booked".into()).is_retriable());
    }
}
