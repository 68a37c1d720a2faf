//! Health and readiness endpoints.

use crate::server::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
}

/// Liveness check: 200 OK whenever the process is running. Does not touch
/// dependencies.
pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    /// Overall readiness.
    pub ready: bool,
    /// Durable store connectivity.
    pub database: bool,
    /// Lock store connectivity.
    pub lock_store: bool,
}

/// Readiness check: probes both backing stores so load balancers only
/// route traffic to instances that can actually serve it.
pub async fn readiness_check(
    State(state): State<AppState>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let database = sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(state.store.pool())
        .await
        .is_ok();
    let lock_store = state.locks.ping().await.is_ok();

    let ready = database && lock_store;
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            ready,
            database,
            lock_store,
        }),
    )
}
