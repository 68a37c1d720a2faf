//! Application state for the HTTP server.

use crate::config::AuthConfig;
use crate::engine::ReservationEngine;
use crate::stores::{PgStore, RedisLockStore};
use std::sync::Arc;

/// The production engine wiring: Redis locks over the Postgres ledger.
pub type Engine = ReservationEngine<RedisLockStore, PgStore>;

/// Shared resources for HTTP handlers: the engine, the store handle the
/// identity gate reads tenants/users through, the lock store (readiness
/// probe), and the gate configuration. Cloned cheaply per request via
/// `Arc`s.
#[derive(Clone)]
pub struct AppState {
    /// The reservation engine.
    pub engine: Arc<Engine>,
    /// Durable store handle (tenant/user directory + readiness probe).
    pub store: Arc<PgStore>,
    /// Lock store handle (readiness probe).
    pub locks: Arc<RedisLockStore>,
    /// Identity gate configuration.
    pub auth: Arc<AuthConfig>,
}

impl AppState {
    /// Assemble the application state.
    #[must_use]
    pub fn new(
        engine: Arc<Engine>,
        store: Arc<PgStore>,
        locks: Arc<RedisLockStore>,
        auth: AuthConfig,
    ) -> Self {
        Self {
            engine,
            store,
            locks,
            auth: Arc::new(auth),
        }
    }
}
