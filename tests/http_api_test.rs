//! End-to-end HTTP flow against real backing stores.
//!
//! Requires Postgres and Redis reachable via `DATABASE_URL` / `REDIS_URL`
//! (defaults target localhost). Run with:
//!
//! ```bash
//! docker run -d -p 5432:5432 -e POSTGRES_PASSWORD=postgres postgres:16-alpine
//! docker run -d -p 6379:6379 redis:7-alpine
//! cargo test --test http_api_test -- --ignored
//! ```

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use chrono::Utc;
use seathold::auth::tenant::hash_tenant_secret;
use seathold::auth::user::issue_user_token;
use seathold::config::Config;
use seathold::engine::ReservationEngine;
use seathold::payment::SimulatedVerifier;
use seathold::providers::{DurableStore, TenantRepository, UserRepository};
use seathold::server::{build_router, AppState};
use seathold::stores::{PgStore, RedisLockStore};
use seathold::types::{
    EntityId, Money, Seat, SeatId, SeatStatus, Tenant, TenantId, User, UserId,
};
use std::sync::Arc;
use uuid::Uuid;

const TENANT_SECRET: &str = "s3cret-app-secret";

struct Harness {
    base_url: String,
    tenant: Tenant,
    seat: Seat,
    user_token: String,
}

async fn start_server() -> Harness {
    let config = Config::from_env();

    let store = Arc::new(PgStore::connect(&config.postgres).await.unwrap());
    store.migrate().await.unwrap();
    let locks = Arc::new(RedisLockStore::connect(&config.redis.url).await.unwrap());

    // Unique per run so reruns never collide on seeded rows.
    let run = Uuid::new_v4().simple().to_string();
    let tenant = Tenant {
        id: TenantId::new(format!("app-{run}")),
        name: "HTTP test app".to_string(),
        secret_hash: hash_tenant_secret(TENANT_SECRET, 2).unwrap(),
        domain: "events".to_string(),
        allowed_origins: Vec::new(),
        active: true,
        created_at: Utc::now(),
    };
    store.insert_tenant(&tenant).await.unwrap();

    let user = User {
        id: UserId::new(format!("user-{run}")),
        email: format!("user-{run}@example.com"),
        name: Some("Flow Tester".to_string()),
        active: true,
        created_at: Utc::now(),
    };
    store.insert_user(&user).await.unwrap();

    let seat = Seat {
        id: SeatId::new(),
        tenant_id: tenant.id.clone(),
        entity_id: EntityId::new(format!("show-{run}")),
        seat_number: "H-1".to_string(),
        price: Money::from_minor(4500),
        domain: "events".to_string(),
        metadata: serde_json::json!({"row": "H"}),
        status: SeatStatus::Available,
        booked_by: None,
        booking_ref: None,
        created_at: Utc::now(),
    };
    store.insert_seat(&seat).await.unwrap();

    let engine = Arc::new(ReservationEngine::new(
        locks.clone(),
        store.clone(),
        Arc::new(SimulatedVerifier::new("key_test")),
        config.lock.ttl_seconds,
        config.payment.default_currency.clone(),
    ));
    let state = AppState::new(engine, store, locks, config.auth.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base_url = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });

    let user_token = issue_user_token(&user.id, &config.auth.user_token_secret, 600).unwrap();

    Harness {
        base_url,
        tenant,
        seat,
        user_token,
    }
}

impl Harness {
    fn authed(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("x-tenant-id", self.tenant.id.as_str())
            .header("x-tenant-secret", TENANT_SECRET)
            .header("authorization", format!("Bearer {}", self.user_token))
    }
}

#[tokio::test]
#[ignore] // Requires Postgres and Redis running
async fn full_booking_flow_over_http() {
    let harness = start_server().await;
    let base_url = &harness.base_url;
    let client = reqwest::Client::new();

    // Liveness and readiness.
    let health = client.get(format!("{base_url}/health")).send().await.unwrap();
    assert_eq!(health.status(), 200);
    let ready = client.get(format!("{base_url}/ready")).send().await.unwrap();
    assert_eq!(ready.status(), 200);

    // The seeded seat shows up in the listing.
    let seats: serde_json::Value = harness
        .authed(client.get(format!("{base_url}/api/seats")))
        .query(&[("entityId", harness.seat.entity_id.as_str())])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(seats["count"], 1);
    assert_eq!(seats["seats"][0]["seatNumber"], "H-1");

    // Reserve.
    let reserve: serde_json::Value = harness
        .authed(client.post(format!("{base_url}/api/reservations")))
        .json(&serde_json::json!({ "seatId": harness.seat.id.as_uuid() }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let reservation_token = reserve["reservationToken"].as_str().unwrap().to_string();
    assert_eq!(reserve["ttl"], 120);
    assert_eq!(reserve["seat"]["price"], 4500);

    // A reserved seat disappears from the listing.
    let seats: serde_json::Value = harness
        .authed(client.get(format!("{base_url}/api/seats")))
        .query(&[("entityId", harness.seat.entity_id.as_str())])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(seats["count"], 0);

    // Create the gateway order twice: idempotent by token.
    let order: serde_json::Value = harness
        .authed(client.post(format!("{base_url}/api/orders")))
        .json(&serde_json::json!({ "reservationToken": reservation_token }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let order_again: serde_json::Value = harness
        .authed(client.post(format!("{base_url}/api/orders")))
        .json(&serde_json::json!({ "reservationToken": reservation_token }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(order["orderId"], order_again["orderId"]);
    assert_eq!(order["amount"], 4500);

    // Confirm with a simulated payment reference.
    let confirm = harness
        .authed(client.post(format!("{base_url}/api/reservations/confirm")))
        .json(&serde_json::json!({
            "reservationToken": reservation_token,
            "paymentId": "PAY-OK-HTTP-1",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(confirm.status(), 200);
    let confirmed: serde_json::Value = confirm.json().await.unwrap();
    assert!(confirmed["bookingId"].as_str().unwrap().starts_with("BK-"));
    assert_eq!(confirmed["booking"]["paymentStatus"], "SUCCESS");

    // Release after confirm conflicts.
    let release = harness
        .authed(client.post(format!("{base_url}/api/reservations/release")))
        .json(&serde_json::json!({ "reservationToken": reservation_token }))
        .send()
        .await
        .unwrap();
    assert_eq!(release.status(), 409);

    // The booking shows up in history, attributed to the bearer user.
    let bookings: serde_json::Value = harness
        .authed(client.get(format!("{base_url}/api/bookings")))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(bookings["total"], 1);
    assert_eq!(bookings["bookings"][0]["bookingId"], confirmed["bookingId"]);
}

#[tokio::test]
#[ignore] // Requires Postgres and Redis running
async fn tenant_gate_rejects_bad_credentials() {
    let harness = start_server().await;
    let base_url = &harness.base_url;
    let client = reqwest::Client::new();

    // Wrong secret.
    let response = client
        .get(format!("{base_url}/api/seats"))
        .header("x-tenant-id", harness.tenant.id.as_str())
        .header("x-tenant-secret", "wrong-secret")
        .query(&[("entityId", "show-1")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    // Missing tenant headers entirely.
    let response = client
        .get(format!("{base_url}/api/seats"))
        .query(&[("entityId", "show-1")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    // Malformed Authorization header is rejected outright (strict mode),
    // even though external-user headers are present.
    let response = client
        .get(format!("{base_url}/api/seats"))
        .header("x-tenant-id", harness.tenant.id.as_str())
        .header("x-tenant-secret", TENANT_SECRET)
        .header("authorization", "Basic dXNlcjpwYXNz")
        .header("x-external-user-id", "ext-1")
        .query(&[("entityId", "show-1")])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    // External-user headers alone are a valid identity once tenant auth
    // passes.
    let response = client
        .get(format!("{base_url}/api/seats"))
        .header("x-tenant-id", harness.tenant.id.as_str())
        .header("x-tenant-secret", TENANT_SECRET)
        .header("x-external-user-id", "ext-1")
        .query(&[("entityId", harness.seat.entity_id.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}
