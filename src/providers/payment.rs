//! Payment verifier trait.
//!
//! Abstraction over payment validation modes (simulated, gateway
//! reference, signed callback). Object-safe so the mode can be selected at
//! startup from configuration.

use crate::error::Result;
use crate::types::{Money, Reservation, ReservationToken};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Payment evidence supplied by the caller at confirmation time.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentProof {
    /// A bare payment identifier, validated by format and (in reference
    /// mode) against the gateway.
    Reference {
        /// Gateway payment identifier.
        payment_id: String,
    },
    /// A gateway callback: `signature` is a keyed MAC over
    /// `order_id|payment_id`.
    SignedCallback {
        /// Gateway order identifier.
        order_id: String,
        /// Gateway payment identifier.
        payment_id: String,
        /// Hex-encoded HMAC-SHA256 signature.
        signature: String,
    },
}

/// A payment reference that passed verification.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifiedPayment {
    /// The reference to persist on the booking.
    pub reference: String,
}

/// A gateway order created for a reservation, idempotent by token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayOrder {
    /// Gateway order identifier.
    pub order_id: String,
    /// Reservation this order pays for.
    pub reservation_token: ReservationToken,
    /// Amount in minor units.
    pub amount: Money,
    /// ISO currency code.
    pub currency: String,
    /// Public gateway key id for the client-side checkout.
    pub gateway_key: String,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Validates that payment evidence is trustworthy for a reservation.
///
/// Implementations must signal `EngineError::Payment` for malformed
/// references, failed gateway verification, and bad signatures.
pub trait PaymentVerifier: Send + Sync {
    /// Verify payment evidence for a reservation, yielding the reference
    /// to persist on the booking.
    ///
    /// # Errors
    ///
    /// Returns `Payment` on rejection and `StoreUnavailable` when the
    /// gateway cannot be reached.
    fn verify(
        &self,
        reservation: Reservation,
        proof: PaymentProof,
    ) -> Pin<Box<dyn Future<Output = Result<VerifiedPayment>> + Send + '_>>;

    /// Create a gateway order for the given amount.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` when the gateway cannot be reached.
    fn create_order(
        &self,
        reservation_token: ReservationToken,
        amount: Money,
        currency: String,
    ) -> Pin<Box<dyn Future<Output = Result<GatewayOrder>> + Send + '_>>;
}
