//! Redis-based seat lock store.
//!
//! Locks are stored as JSON values under `lock:{seat_id}` with a Redis
//! TTL. Acquisition is a single `SET NX EX`, so under arbitrary concurrent
//! callers exactly one wins; compare-and-delete release runs as a Lua
//! script so the read and the delete cannot interleave with another
//! holder's acquisition.

use crate::error::{EngineError, Result};
use crate::providers::{AcquireOutcome, LockStore, SeatLock};
use crate::types::{ReservationToken, SeatId, UserId};
use chrono::{Duration, Utc};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client};
use std::collections::HashMap;

/// Compare-and-delete: remove the lock only when the stored token matches.
const RELEASE_SCRIPT: &str = r#"
local raw = redis.call('GET', KEYS[1])
if not raw then return 0 end
local ok, lock = pcall(cjson.decode, raw)
if not ok then return 0 end
if lock.token == ARGV[1] then
    return redis.call('DEL', KEYS[1])
end
return 0
"#;

/// Redis-backed implementation of [`LockStore`].
///
/// `Clone` shares the underlying [`ConnectionManager`].
#[derive(Clone)]
pub struct RedisLockStore {
    conn_manager: ConnectionManager,
    release_script: redis::Script,
}

impl RedisLockStore {
    /// Connect to Redis.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the URL is malformed or the
    /// connection cannot be established.
    pub async fn connect(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url).map_err(|e| {
            EngineError::StoreUnavailable(format!("failed to create Redis client: {e}"))
        })?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            EngineError::StoreUnavailable(format!(
                "failed to create Redis connection manager: {e}"
            ))
        })?;

        tracing::info!("RedisLockStore connected");

        Ok(Self {
            conn_manager,
            release_script: redis::Script::new(RELEASE_SCRIPT),
        })
    }

    /// Readiness probe: a bare `PING`.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if Redis does not answer.
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.conn_manager.clone();
        let _: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| Self::store_err("ping failed", &e))?;
        Ok(())
    }

    fn lock_key(seat_id: SeatId) -> String {
        format!("lock:{seat_id}")
    }

    fn store_err(context: &str, e: &redis::RedisError) -> EngineError {
        EngineError::StoreUnavailable(format!("{context}: {e}"))
    }
}

impl LockStore for RedisLockStore {
    async fn acquire(
        &self,
        seat_id: SeatId,
        user_id: &UserId,
        ttl: Duration,
    ) -> Result<AcquireOutcome> {
        let mut conn = self.conn_manager.clone();
        let key = Self::lock_key(seat_id);

        let now = Utc::now();
        let lock = SeatLock {
            seat_id,
            token: ReservationToken::generate(),
            user_id: user_id.clone(),
            acquired_at: now,
            expires_at: now + ttl,
        };

        let payload = serde_json::to_string(&lock)
            .map_err(|e| EngineError::StoreUnavailable(format!("lock encode failed: {e}")))?;

        #[allow(clippy::cast_sign_loss)]
        let ttl_seconds = ttl.num_seconds().max(1) as u64;

        // Atomic create-if-absent-with-expiry in one command.
        let created: Option<String> = redis::cmd("SET")
            .arg(&key)
            .arg(&payload)
            .arg("NX")
            .arg("EX")
            .arg(ttl_seconds)
            .query_async(&mut conn)
            .await
            .map_err(|e| Self::store_err("lock acquire failed", &e))?;

        if created.is_some() {
            tracing::debug!(
                seat_id = %seat_id,
                user_id = %user_id,
                token = %lock.token,
                ttl_seconds,
                "Seat lock acquired"
            );
            return Ok(AcquireOutcome::Acquired(lock));
        }

        // Lost the race: report how long the current holder has left.
        let remaining: i64 = conn
            .ttl(&key)
            .await
            .map_err(|e| Self::store_err("lock TTL read failed", &e))?;

        #[allow(clippy::cast_sign_loss)]
        let expires_in = (remaining > 0).then_some(remaining as u64);

        tracing::debug!(seat_id = %seat_id, ?expires_in, "Seat lock already held");
        Ok(AcquireOutcome::Held { expires_in })
    }

    async fn inspect(&self, seat_id: SeatId) -> Result<Option<SeatLock>> {
        let mut conn = self.conn_manager.clone();
        let key = Self::lock_key(seat_id);

        let raw: Option<String> = conn
            .get(&key)
            .await
            .map_err(|e| Self::store_err("lock read failed", &e))?;

        match raw {
            Some(raw) => {
                let lock: SeatLock = serde_json::from_str(&raw).map_err(|e| {
                    EngineError::StoreUnavailable(format!("lock decode failed: {e}"))
                })?;
                Ok(Some(lock))
            }
            None => Ok(None),
        }
    }

    async fn verify(
        &self,
        seat_id: SeatId,
        token: &ReservationToken,
        user_id: &UserId,
    ) -> Result<bool> {
        // Redis TTL already evicts expired locks; the expiry re-check below
        // guards against clock skew between this process and the store.
        let Some(lock) = self.inspect(seat_id).await? else {
            return Ok(false);
        };

        Ok(lock.token == *token && lock.user_id == *user_id && lock.is_live(Utc::now()))
    }

    async fn release(
        &self,
        seat_id: SeatId,
        expected: Option<&ReservationToken>,
    ) -> Result<bool> {
        let mut conn = self.conn_manager.clone();
        let key = Self::lock_key(seat_id);

        let removed: i64 = match expected {
            Some(token) => self
                .release_script
                .key(&key)
                .arg(token.as_str())
                .invoke_async(&mut conn)
                .await
                .map_err(|e| Self::store_err("compare-and-delete failed", &e))?,
            None => conn
                .del(&key)
                .await
                .map_err(|e| Self::store_err("lock delete failed", &e))?,
        };

        tracing::debug!(seat_id = %seat_id, removed, "Seat lock release");
        Ok(removed > 0)
    }

    async fn bulk_exists(&self, seat_ids: &[SeatId]) -> Result<HashMap<SeatId, bool>> {
        if seat_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let mut conn = self.conn_manager.clone();
        let mut pipe = redis::pipe();
        for seat_id in seat_ids {
            pipe.cmd("EXISTS").arg(Self::lock_key(*seat_id));
        }

        let flags: Vec<bool> = pipe
            .query_async(&mut conn)
            .await
            .map_err(|e| Self::store_err("bulk lock check failed", &e))?;

        Ok(seat_ids.iter().copied().zip(flags).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // These tests require a running Redis instance.
    // Run with: docker run -d -p 6379:6379 redis:7-alpine
    // Then: cargo test --lib -- --ignored lock_redis

    const REDIS_URL: &str = "redis://127.0.0.1:6379";

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used)]
    async fn acquire_is_exclusive_until_released() {
        let store = RedisLockStore::connect(REDIS_URL).await.unwrap();
        let seat_id = SeatId::new();
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");

        let first = store
            .acquire(seat_id, &alice, Duration::seconds(30))
            .await
            .unwrap();
        let AcquireOutcome::Acquired(lock) = first else {
            panic!("first acquire should win");
        };

        let second = store
            .acquire(seat_id, &bob, Duration::seconds(30))
            .await
            .unwrap();
        match second {
            AcquireOutcome::Held { expires_in } => {
                let remaining = expires_in.unwrap();
                assert!(remaining > 0 && remaining <= 30);
            }
            AcquireOutcome::Acquired(_) => panic!("second acquire must not win"),
        }

        assert!(store.verify(seat_id, &lock.token, &alice).await.unwrap());
        assert!(!store.verify(seat_id, &lock.token, &bob).await.unwrap());

        assert!(store.release(seat_id, Some(&lock.token)).await.unwrap());
        assert!(store.inspect(seat_id).await.unwrap().is_none());

        // Seat is reservable again.
        let third = store
            .acquire(seat_id, &bob, Duration::seconds(30))
            .await
            .unwrap();
        assert!(matches!(third, AcquireOutcome::Acquired(_)));
        store.release(seat_id, None).await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used)]
    async fn compare_and_delete_spares_foreign_locks() {
        let store = RedisLockStore::connect(REDIS_URL).await.unwrap();
        let seat_id = SeatId::new();
        let alice = UserId::new("alice");

        let AcquireOutcome::Acquired(lock) = store
            .acquire(seat_id, &alice, Duration::seconds(30))
            .await
            .unwrap()
        else {
            panic!("acquire should win");
        };

        // A stale token must not remove the current holder's lock.
        let stale = ReservationToken::generate();
        assert!(!store.release(seat_id, Some(&stale)).await.unwrap());
        assert!(store.inspect(seat_id).await.unwrap().is_some());

        assert!(store.release(seat_id, Some(&lock.token)).await.unwrap());
    }

    #[tokio::test]
    #[ignore] // Requires Redis running
    #[allow(clippy::unwrap_used)]
    async fn bulk_exists_reports_point_in_time() {
        let store = RedisLockStore::connect(REDIS_URL).await.unwrap();
        let locked = SeatId::new();
        let free = SeatId::new();
        let alice = UserId::new("alice");

        let AcquireOutcome::Acquired(lock) = store
            .acquire(locked, &alice, Duration::seconds(30))
            .await
            .unwrap()
        else {
            panic!("acquire should win");
        };

        let flags = store.bulk_exists(&[locked, free]).await.unwrap();
        assert_eq!(flags.get(&locked), Some(&true));
        assert_eq!(flags.get(&free), Some(&false));

        store.release(locked, Some(&lock.token)).await.unwrap();
    }
}
