//! Simulated payment verification for development and testing.
//!
//! Accepts any well-formed reference that does not carry a failure marker,
//! and synthesizes gateway orders locally. In production deployments the
//! reference or signed-callback verifiers replace this.

use crate::error::{EngineError, Result};
use crate::providers::{GatewayOrder, PaymentProof, PaymentVerifier, VerifiedPayment};
use crate::types::{Money, Reservation, ReservationToken};
use chrono::Utc;
use std::future::Future;
use std::pin::Pin;
use uuid::Uuid;

/// Marker substring that makes the simulated gateway decline a reference.
const FAILURE_MARKER: &str = "FAIL";

/// Always-offline payment verifier.
#[derive(Debug, Clone)]
pub struct SimulatedVerifier {
    gateway_key: String,
}

impl SimulatedVerifier {
    /// Create a simulated verifier advertising the given gateway key.
    #[must_use]
    pub fn new(gateway_key: &str) -> Self {
        Self {
            gateway_key: gateway_key.to_string(),
        }
    }

    fn check_reference(payment_id: &str) -> Result<VerifiedPayment> {
        if !super::has_accepted_prefix(payment_id) {
            return Err(EngineError::Payment(format!(
                "malformed payment reference {payment_id}"
            )));
        }
        if payment_id.contains(FAILURE_MARKER) {
            return Err(EngineError::Payment(format!(
                "payment {payment_id} was declined"
            )));
        }
        Ok(VerifiedPayment {
            reference: payment_id.to_string(),
        })
    }
}

impl PaymentVerifier for SimulatedVerifier {
    fn verify(
        &self,
        reservation: Reservation,
        proof: PaymentProof,
    ) -> Pin<Box<dyn Future<Output = Result<VerifiedPayment>> + Send + '_>> {
        Box::pin(async move {
            let verified = match &proof {
                PaymentProof::Reference { payment_id }
                | PaymentProof::SignedCallback { payment_id, .. } => {
                    Self::check_reference(payment_id)?
                }
            };

            tracing::info!(
                token = %reservation.token,
                reference = %verified.reference,
                "Simulated payment accepted"
            );
            Ok(verified)
        })
    }

    fn create_order(
        &self,
        reservation_token: ReservationToken,
        amount: Money,
        currency: String,
    ) -> Pin<Box<dyn Future<Output = Result<GatewayOrder>> + Send + '_>> {
        Box::pin(async move {
            Ok(GatewayOrder {
                order_id: format!("order_{}", Uuid::new_v4().simple()),
                reservation_token,
                amount,
                currency,
                gateway_key: self.gateway_key.clone(),
                created_at: Utc::now(),
            })
        })
    }
}
