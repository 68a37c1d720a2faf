//! Gateway-reference payment verification.
//!
//! Validates the reference format locally, then asks the gateway's verify
//! endpoint whether the payment is captured and unconsumed. Consumption
//! idempotency is enforced downstream by the uniqueness of the reservation
//! token on bookings.

use crate::config::PaymentConfig;
use crate::error::{EngineError, Result};
use crate::providers::{GatewayOrder, PaymentProof, PaymentVerifier, VerifiedPayment};
use crate::types::{Money, Reservation, ReservationToken};
use chrono::Utc;
use serde::Deserialize;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Gateway response for a payment lookup.
#[derive(Debug, Deserialize)]
struct GatewayPayment {
    status: String,
    #[serde(default)]
    consumed: bool,
    #[serde(default)]
    amount: Option<u64>,
}

/// Gateway response for order creation.
#[derive(Debug, Deserialize)]
struct GatewayOrderResponse {
    id: String,
}

/// Verifier that calls the external gateway.
pub struct ReferenceVerifier {
    http: reqwest::Client,
    base_url: String,
    key_id: String,
    secret: String,
}

impl ReferenceVerifier {
    /// Build the verifier from payment configuration.
    #[must_use]
    pub fn new(config: &PaymentConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.gateway_timeout))
            .build()
            .unwrap_or_default();

        Self {
            http,
            base_url: config.gateway_url.trim_end_matches('/').to_string(),
            key_id: config.gateway_key_id.clone(),
            secret: config.shared_secret.clone(),
        }
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment> {
        let url = format!("{}/v1/payments/{payment_id}", self.base_url);
        let response = self
            .http
            .get(&url)
            .basic_auth(&self.key_id, Some(&self.secret))
            .send()
            .await
            .map_err(|e| EngineError::StoreUnavailable(format!("gateway unreachable: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(EngineError::Payment(format!(
                "payment {payment_id} is unknown to the gateway"
            )));
        }
        if !response.status().is_success() {
            return Err(EngineError::StoreUnavailable(format!(
                "gateway verify returned {}",
                response.status()
            )));
        }

        response
            .json::<GatewayPayment>()
            .await
            .map_err(|e| EngineError::StoreUnavailable(format!("gateway response decode: {e}")))
    }
}

impl PaymentVerifier for ReferenceVerifier {
    fn verify(
        &self,
        reservation: Reservation,
        proof: PaymentProof,
    ) -> Pin<Box<dyn Future<Output = Result<VerifiedPayment>> + Send + '_>> {
        Box::pin(async move {
            let payment_id = match proof {
                PaymentProof::Reference { payment_id }
                | PaymentProof::SignedCallback { payment_id, .. } => payment_id,
            };

            if !super::has_accepted_prefix(&payment_id) {
                return Err(EngineError::Payment(format!(
                    "malformed payment reference {payment_id}"
                )));
            }

            let payment = self.fetch_payment(&payment_id).await?;

            if payment.status != "captured" {
                return Err(EngineError::Payment(format!(
                    "payment {payment_id} is {} (captured required)",
                    payment.status
                )));
            }
            if payment.consumed {
                return Err(EngineError::Payment(format!(
                    "payment {payment_id} has already been consumed"
                )));
            }
            if let Some(amount) = payment.amount {
                if amount != reservation.seat.price.minor() {
                    return Err(EngineError::Payment(format!(
                        "payment amount {amount} does not match the reserved price {}",
                        reservation.seat.price.minor()
                    )));
                }
            }

            tracing::info!(
                token = %reservation.token,
                payment_id = %payment_id,
                "Gateway verified payment reference"
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
            let url = format!("{}/v1/orders", self.base_url);
            let body = serde_json::json!({
                "amount": amount.minor(),
                "currency": currency,
                "receipt": reservation_token.as_str(),
            });

            let response = self
                .http
                .post(&url)
                .basic_auth(&self.key_id, Some(&self.secret))
                .json(&body)
                .send()
                .await
                .map_err(|e| EngineError::StoreUnavailable(format!("gateway unreachable: {e}")))?;

            if !response.status().is_success() {
                return Err(EngineError::StoreUnavailable(format!(
                    "gateway order create returned {}",
                    response.status()
                )));
            }

            let created = response
                .json::<GatewayOrderResponse>()
                .await
                .map_err(|e| {
                    EngineError::StoreUnavailable(format!("gateway response decode: {e}"))
                })?;

            Ok(GatewayOrder {
                order_id: created.id,
                reservation_token,
                amount,
                currency,
                gateway_key: self.key_id.clone(),
                created_at: Utc::now(),
            })
        })
    }
}
