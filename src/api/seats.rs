//! Seat listing endpoint.

use crate::api::error::ApiError;
use crate::auth::RequestIdentity;
use crate::engine::ListSeatsRequest;
use crate::server::state::AppState;
use crate::types::{EntityId, Money, Seat};
use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Query parameters for `GET /api/seats`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSeatsQuery {
    /// Bookable collection to list.
    pub entity_id: String,
    /// Inclusive lower price bound (minor units).
    pub min_price: Option<u64>,
    /// Inclusive upper price bound (minor units).
    pub max_price: Option<u64>,
}

/// A seat as shown to clients.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatView {
    /// Seat id to reserve with.
    pub id: Uuid,
    /// Seat number.
    pub seat_number: String,
    /// Price in minor units.
    pub price: u64,
    /// Entity the seat belongs to.
    pub entity_id: String,
    /// Business domain tag.
    pub domain: String,
    /// Tenant-supplied metadata, passed through opaquely.
    pub metadata: serde_json::Value,
}

impl From<Seat> for SeatView {
    fn from(seat: Seat) -> Self {
        Self {
            id: *seat.id.as_uuid(),
            seat_number: seat.seat_number,
            price: seat.price.minor(),
            entity_id: seat.entity_id.as_str().to_string(),
            domain: seat.domain,
            metadata: seat.metadata,
        }
    }
}

/// Response body for `GET /api/seats`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSeatsResponse {
    /// Seats currently available and unlocked.
    pub seats: Vec<SeatView>,
    /// Number of seats returned.
    pub count: usize,
    /// Echo of the requested entity.
    pub entity_id: String,
}

/// `GET /api/seats?entityId=…&minPrice=…&maxPrice=…`
///
/// The view is eventually consistent: reserve is the authoritative gate.
///
/// # Errors
///
/// Identity-gate and engine errors map per the error taxonomy.
pub async fn list_seats(
    identity: RequestIdentity,
    State(state): State<AppState>,
    Query(query): Query<ListSeatsQuery>,
) -> Result<Json<ListSeatsResponse>, ApiError> {
    identity.require_user(None)?;

    if query.entity_id.trim().is_empty() {
        return Err(ApiError::bad_request("entityId must not be empty"));
    }

    let seats = state
        .engine
        .list_seats(
            &identity.tenant,
            ListSeatsRequest {
                entity_id: EntityId::new(query.entity_id.clone()),
                min_price: query.min_price.map(Money::from_minor),
                max_price: query.max_price.map(Money::from_minor),
            },
        )
        .await?;

    let seats: Vec<SeatView> = seats.into_iter().map(SeatView::from).collect();
    Ok(Json(ListSeatsResponse {
        count: seats.len(),
        entity_id: query.entity_id,
        seats,
    }))
}
