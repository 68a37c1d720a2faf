//! Booking history endpoint.

use crate::api::error::ApiError;
use crate::api::reservations::BookingView;
use crate::auth::RequestIdentity;
use crate::engine::BookingsRequest;
use crate::server::state::AppState;
use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

const DEFAULT_PAGE: u32 = 1;
const DEFAULT_LIMIT: u32 = 20;

/// Query parameters for `GET /api/bookings`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MyBookingsQuery {
    /// 1-based page number (default 1).
    pub page: Option<u32>,
    /// Page size (default 20, max 100).
    pub limit: Option<u32>,
}

/// Response body for `GET /api/bookings`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MyBookingsResponse {
    /// Bookings newest first.
    pub bookings: Vec<BookingView>,
    /// 1-based page number.
    pub page: u32,
    /// Page size.
    pub limit: u32,
    /// Total matching bookings.
    pub total: u64,
}

/// `GET /api/bookings?page=&limit=`
///
/// # Errors
///
/// Identity-gate and engine errors map per the error taxonomy.
pub async fn my_bookings(
    identity: RequestIdentity,
    State(state): State<AppState>,
    Query(query): Query<MyBookingsQuery>,
) -> Result<Json<MyBookingsResponse>, ApiError> {
    let user = identity.require_user(None)?;

    let page = state
        .engine
        .my_bookings(
            &identity.tenant,
            &user,
            BookingsRequest {
                page: query.page.unwrap_or(DEFAULT_PAGE),
                limit: query.limit.unwrap_or(DEFAULT_LIMIT),
            },
        )
        .await?;

    Ok(Json(MyBookingsResponse {
        bookings: page.items.into_iter().map(BookingView::from).collect(),
        page: page.page,
        limit: page.limit,
        total: page.total,
    }))
}
