//! Reserve, confirm, release, and order-creation endpoints.

use crate::api::error::ApiError;
use crate::auth::{ExternalUser, RequestIdentity};
use crate::engine::{ConfirmRequest, CreateOrderRequest, ReleaseRequest, ReserveRequest};
use crate::providers::PaymentProof;
use crate::server::state::AppState;
use crate::types::{Booking, Money, ReservationToken, SeatId};
use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request body for `POST /api/reservations`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveBody {
    /// Seat to reserve.
    pub seat_id: Uuid,
    /// Body-declared external user (third user-auth mode).
    pub external_user: Option<ExternalUser>,
}

/// Seat snapshot inside a reserve response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReservedSeat {
    /// Seat id.
    pub id: Uuid,
    /// Seat number.
    pub seat_number: String,
    /// Price in minor units.
    pub price: u64,
    /// Entity the seat belongs to.
    pub entity_id: String,
}

/// Response body for `POST /api/reservations`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReserveResponse {
    /// Token to confirm or release with.
    pub reservation_token: String,
    /// Deadline for confirmation.
    pub expires_at: DateTime<Utc>,
    /// Lock TTL in seconds.
    pub ttl: u64,
    /// The reserved seat.
    pub seat: ReservedSeat,
}

/// `POST /api/reservations {seatId}`
///
/// # Errors
///
/// Identity-gate and engine errors map per the error taxonomy.
pub async fn reserve(
    identity: RequestIdentity,
    State(state): State<AppState>,
    Json(body): Json<ReserveBody>,
) -> Result<Json<ReserveResponse>, ApiError> {
    let user = identity.require_user(body.external_user.as_ref())?;

    let receipt = state
        .engine
        .reserve(
            &identity.tenant,
            &user,
            ReserveRequest {
                seat_id: SeatId::from_uuid(body.seat_id),
            },
        )
        .await?;

    Ok(Json(ReserveResponse {
        reservation_token: receipt.reservation_token.as_str().to_string(),
        expires_at: receipt.expires_at,
        ttl: receipt.ttl_seconds,
        seat: ReservedSeat {
            id: *receipt.seat_id.as_uuid(),
            seat_number: receipt.seat.seat_number,
            price: receipt.seat.price.minor(),
            entity_id: receipt.seat.entity_id.as_str().to_string(),
        },
    }))
}

/// Request body for `POST /api/reservations/confirm`.
///
/// Either `{paymentId}` (reference mode) or
/// `{orderId, paymentId, signature}` (signed-callback mode).
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmBody {
    /// Token from the reserve step.
    pub reservation_token: String,
    /// Payment reference.
    pub payment_id: Option<String>,
    /// Gateway order id (signed-callback mode).
    pub order_id: Option<String>,
    /// Callback signature (signed-callback mode).
    pub signature: Option<String>,
    /// Body-declared external user (third user-auth mode).
    pub external_user: Option<ExternalUser>,
}

/// A booking as shown to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingView {
    /// Human-readable booking id.
    pub booking_id: String,
    /// Booked seat id.
    pub seat_id: Uuid,
    /// Seat number.
    pub seat_number: String,
    /// Entity the seat belongs to.
    pub entity_id: String,
    /// Originating reservation token.
    pub reservation_token: String,
    /// Always `SUCCESS`.
    pub payment_status: String,
    /// Verified payment reference.
    pub payment_reference: String,
    /// Amount charged in minor units.
    pub amount: u64,
    /// ISO currency code.
    pub currency: String,
    /// Booking time.
    pub booked_at: DateTime<Utc>,
}

impl From<Booking> for BookingView {
    fn from(booking: Booking) -> Self {
        Self {
            booking_id: booking.booking_id.as_str().to_string(),
            seat_id: *booking.seat_id.as_uuid(),
            seat_number: booking.seat.seat_number,
            entity_id: booking.seat.entity_id.as_str().to_string(),
            reservation_token: booking.reservation_token.as_str().to_string(),
            payment_status: booking.payment_status,
            payment_reference: booking.payment_reference,
            amount: booking.amount.minor(),
            currency: booking.currency,
            booked_at: booking.booked_at,
        }
    }
}

/// Response body for `POST /api/reservations/confirm`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmResponse {
    /// Human-readable booking id.
    pub booking_id: String,
    /// The created booking.
    pub booking: BookingView,
}

fn proof_from_body(body: &ConfirmBody) -> Result<PaymentProof, ApiError> {
    match (&body.order_id, &body.signature, &body.payment_id) {
        (Some(order_id), Some(signature), Some(payment_id)) => {
            Ok(PaymentProof::SignedCallback {
                order_id: order_id.clone(),
                payment_id: payment_id.clone(),
                signature: signature.clone(),
            })
        }
        (None, None, Some(payment_id)) => Ok(PaymentProof::Reference {
            payment_id: payment_id.clone(),
        }),
        _ => Err(ApiError::bad_request(
            "provide paymentId, or orderId + paymentId + signature",
        )),
    }
}

/// `POST /api/reservations/confirm {reservationToken, paymentId | orderId+paymentId+signature}`
///
/// # Errors
///
/// Identity-gate and engine errors map per the error taxonomy.
pub async fn confirm(
    identity: RequestIdentity,
    State(state): State<AppState>,
    Json(body): Json<ConfirmBody>,
) -> Result<Json<ConfirmResponse>, ApiError> {
    let user = identity.require_user(body.external_user.as_ref())?;
    let proof = proof_from_body(&body)?;

    let booking = state
        .engine
        .confirm(
            &identity.tenant,
            &user,
            ConfirmRequest {
                reservation_token: ReservationToken::new(body.reservation_token),
                proof,
            },
        )
        .await?;

    Ok(Json(ConfirmResponse {
        booking_id: booking.booking_id.as_str().to_string(),
        booking: booking.into(),
    }))
}

/// Request body for `POST /api/reservations/release`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseBody {
    /// Token from the reserve step.
    pub reservation_token: String,
    /// Body-declared external user (third user-auth mode).
    pub external_user: Option<ExternalUser>,
}

/// Response body for `POST /api/reservations/release`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseResponse {
    /// Acknowledged; idempotent on repeat.
    pub released: bool,
}

/// `POST /api/reservations/release {reservationToken}`
///
/// # Errors
///
/// Identity-gate and engine errors map per the error taxonomy.
pub async fn release(
    identity: RequestIdentity,
    State(state): State<AppState>,
    Json(body): Json<ReleaseBody>,
) -> Result<Json<ReleaseResponse>, ApiError> {
    let user = identity.require_user(body.external_user.as_ref())?;

    state
        .engine
        .release(
            &identity.tenant,
            &user,
            ReleaseRequest {
                reservation_token: ReservationToken::new(body.reservation_token),
            },
        )
        .await?;

    Ok(Json(ReleaseResponse { released: true }))
}

/// Request body for `POST /api/orders`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderBody {
    /// Token from the reserve step.
    pub reservation_token: String,
    /// Expected amount in minor units; must match the reserved price.
    pub amount: Option<u64>,
    /// Currency override.
    pub currency: Option<String>,
    /// Body-declared external user (third user-auth mode).
    pub external_user: Option<ExternalUser>,
}

/// Response body for `POST /api/orders`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderResponse {
    /// Gateway order id.
    pub order_id: String,
    /// Amount in minor units.
    pub amount: u64,
    /// ISO currency code.
    pub currency: String,
    /// Reservation the order pays for.
    pub reservation_token: String,
    /// Public gateway key for the client checkout.
    pub gateway_key: String,
}

/// `POST /api/orders {reservationToken, amount?, currency?}` —
/// idempotent by reservation token.
///
/// # Errors
///
/// Identity-gate and engine errors map per the error taxonomy.
pub async fn create_order(
    identity: RequestIdentity,
    State(state): State<AppState>,
    Json(body): Json<CreateOrderBody>,
) -> Result<Json<CreateOrderResponse>, ApiError> {
    let user = identity.require_user(body.external_user.as_ref())?;

    let order = state
        .engine
        .create_order(
            &identity.tenant,
            &user,
            CreateOrderRequest {
                reservation_token: ReservationToken::new(body.reservation_token),
                amount: body.amount.map(Money::from_minor),
                currency: body.currency,
            },
        )
        .await?;

    Ok(Json(CreateOrderResponse {
        order_id: order.order_id,
        amount: order.amount.minor(),
        currency: order.currency,
        reservation_token: order.reservation_token.as_str().to_string(),
        gateway_key: order.gateway_key,
    }))
}
