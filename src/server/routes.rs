//! Router configuration.

use super::health::{health_check, readiness_check};
use super::state::AppState;
use crate::api::{bookings, reservations, seats};
use axum::{
    routing::{get, post},
    Router,
};

/// Build the complete Axum router.
///
/// Health checks are unauthenticated; everything under `/api` passes the
/// identity gate via the `RequestIdentity` extractor in each handler.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/seats", get(seats::list_seats))
        .route("/reservations", post(reservations::reserve))
        .route("/reservations/confirm", post(reservations::confirm))
        .route("/reservations/release", post(reservations::release))
        .route("/orders", post(reservations::create_order))
        .route("/bookings", get(bookings::my_bookings));

    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .nest("/api", api_routes)
        .with_state(state)
}
