//! Signed-callback payment verification.
//!
//! The gateway calls back with `(orderId, paymentId, signature)` where the
//! signature is HMAC-SHA256 over `orderId|paymentId` keyed with the shared
//! secret. Equality is constant-time via the MAC verifier.

use crate::error::{EngineError, Result};
use crate::providers::{GatewayOrder, PaymentProof, PaymentVerifier, VerifiedPayment};
use crate::types::{Money, Reservation, ReservationToken};
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::future::Future;
use std::pin::Pin;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Verifier for gateway callback signatures.
#[derive(Debug, Clone)]
pub struct SignedCallbackVerifier {
    secret: String,
    gateway_key: String,
}

impl SignedCallbackVerifier {
    /// Create a verifier with the gateway's shared secret.
    #[must_use]
    pub fn new(secret: &str, gateway_key: &str) -> Self {
        Self {
            secret: secret.to_string(),
            gateway_key: gateway_key.to_string(),
        }
    }

    /// Recompute and check the callback MAC. Constant-time comparison.
    ///
    /// # Errors
    ///
    /// Returns `Payment` on a malformed or mismatching signature.
    pub fn check_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> Result<()> {
        let provided = hex::decode(signature)
            .map_err(|_| EngineError::Payment("signature is not valid hex".to_string()))?;

        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| EngineError::Payment(format!("bad signing key: {e}")))?;
        mac.update(format!("{order_id}|{payment_id}").as_bytes());

        mac.verify_slice(&provided)
            .map_err(|_| EngineError::Payment("payment signature mismatch".to_string()))
    }

    /// Produce a valid signature (test and simulation helper).
    #[must_use]
    pub fn sign(secret: &str, order_id: &str, payment_id: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .expect("HMAC accepts keys of any length");
        mac.update(format!("{order_id}|{payment_id}").as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }
}

impl PaymentVerifier for SignedCallbackVerifier {
    fn verify(
        &self,
        reservation: Reservation,
        proof: PaymentProof,
    ) -> Pin<Box<dyn Future<Output = Result<VerifiedPayment>> + Send + '_>> {
        Box::pin(async move {
            let PaymentProof::SignedCallback {
                order_id,
                payment_id,
                signature,
            } = proof
            else {
                return Err(EngineError::Payment(
                    "a signed callback (orderId, paymentId, signature) is required".to_string(),
                ));
            };

            self.check_signature(&order_id, &payment_id, &signature)?;

            tracing::info!(
                token = %reservation.token,
                order_id = %order_id,
                "Payment callback signature verified"
            );
            Ok(VerifiedPayment {
                reference: payment_id,
            })
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

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "callback-secret";

    #[test]
    fn valid_signature_passes() {
        let verifier = SignedCallbackVerifier::new(SECRET, "key_test");
        let signature = SignedCallbackVerifier::sign(SECRET, "order_1", "pay_1");
        assert!(verifier.check_signature("order_1", "pay_1", &signature).is_ok());
    }

    #[test]
    fn tampered_fields_fail() {
        let verifier = SignedCallbackVerifier::new(SECRET, "key_test");
        let signature = SignedCallbackVerifier::sign(SECRET, "order_1", "pay_1");

        assert!(verifier.check_signature("order_2", "pay_1", &signature).is_err());
        assert!(verifier.check_signature("order_1", "pay_2", &signature).is_err());
        assert!(verifier.check_signature("order_1", "pay_1", "deadbeef").is_err());
        assert!(verifier.check_signature("order_1", "pay_1", "not-hex").is_err());
    }

    #[test]
    fn wrong_secret_fails() {
        let verifier = SignedCallbackVerifier::new(SECRET, "key_test");
        let signature = SignedCallbackVerifier::sign("other-secret", "order_1", "pay_1");
        assert!(verifier.check_signature("order_1", "pay_1", &signature).is_err());
    }
}
