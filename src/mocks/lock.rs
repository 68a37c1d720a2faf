//! Mock seat lock store for testing.

use crate::error::{EngineError, Result};
use crate::providers::{AcquireOutcome, LockStore, SeatLock};
use crate::types::{ReservationToken, SeatId, UserId};
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// In-memory lock store.
///
/// Expired locks are treated as absent at every read, mirroring the
/// backing store's auto-expiry.
#[derive(Debug, Clone, Default)]
pub struct MemoryLockStore {
    locks: Arc<Mutex<HashMap<SeatId, SeatLock>>>,
}

impl MemoryLockStore {
    /// Create an empty mock lock store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live locks (for assertions).
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the lock is poisoned.
    pub fn live_count(&self) -> Result<usize> {
        let now = Utc::now();
        Ok(self
            .guard()?
            .values()
            .filter(|lock| lock.is_live(now))
            .count())
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, HashMap<SeatId, SeatLock>>> {
        self.locks
            .lock()
            .map_err(|_| EngineError::StoreUnavailable("mutex poisoned".to_string()))
    }
}

impl LockStore for MemoryLockStore {
    async fn acquire(
        &self,
        seat_id: SeatId,
        user_id: &UserId,
        ttl: Duration,
    ) -> Result<AcquireOutcome> {
        let now = Utc::now();
        let mut locks = self.guard()?;

        if let Some(existing) = locks.get(&seat_id) {
            if existing.is_live(now) {
                let remaining = (existing.expires_at - now).num_seconds();
                #[allow(clippy::cast_sign_loss)]
                let expires_in = (remaining > 0).then_some(remaining as u64);
                return Ok(AcquireOutcome::Held { expires_in });
            }
        }

        let lock = SeatLock {
            seat_id,
            token: ReservationToken::generate(),
            user_id: user_id.clone(),
            acquired_at: now,
            expires_at: now + ttl,
        };
        locks.insert(seat_id, lock.clone());
        Ok(AcquireOutcome::Acquired(lock))
    }

    async fn inspect(&self, seat_id: SeatId) -> Result<Option<SeatLock>> {
        let now = Utc::now();
        Ok(self
            .guard()?
            .get(&seat_id)
            .filter(|lock| lock.is_live(now))
            .cloned())
    }

    async fn verify(
        &self,
        seat_id: SeatId,
        token: &ReservationToken,
        user_id: &UserId,
    ) -> Result<bool> {
        let now = Utc::now();
        Ok(self
            .guard()?
            .get(&seat_id)
            .is_some_and(|lock| {
                lock.token == *token && lock.user_id == *user_id && lock.is_live(now)
            }))
    }

    async fn release(
        &self,
        seat_id: SeatId,
        expected: Option<&ReservationToken>,
    ) -> Result<bool> {
        let mut locks = self.guard()?;

        match expected {
            Some(token) => {
                let matches = locks.get(&seat_id).is_some_and(|lock| lock.token == *token);
                if matches {
                    locks.remove(&seat_id);
                }
                Ok(matches)
            }
            None => Ok(locks.remove(&seat_id).is_some()),
        }
    }

    async fn bulk_exists(&self, seat_ids: &[SeatId]) -> Result<HashMap<SeatId, bool>> {
        let now = Utc::now();
        let locks = self.guard()?;
        Ok(seat_ids
            .iter()
            .map(|seat_id| {
                let live = locks.get(seat_id).is_some_and(|lock| lock.is_live(now));
                (*seat_id, live)
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exclusive_until_expiry() {
        let store = MemoryLockStore::new();
        let seat_id = SeatId::new();
        let alice = UserId::new("alice");
        let bob = UserId::new("bob");

        let Ok(AcquireOutcome::Acquired(lock)) = store
            .acquire(seat_id, &alice, Duration::seconds(30))
            .await
        else {
            panic!("first acquire should win");
        };

        assert!(matches!(
            store.acquire(seat_id, &bob, Duration::seconds(30)).await,
            Ok(AcquireOutcome::Held { .. })
        ));

        // Wrong token must not release.
        let stale = ReservationToken::generate();
        assert!(!store.release(seat_id, Some(&stale)).await.unwrap());
        assert!(store.verify(seat_id, &lock.token, &alice).await.unwrap());

        assert!(store.release(seat_id, Some(&lock.token)).await.unwrap());
        assert!(store.inspect(seat_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn expired_lock_is_absent() {
        let store = MemoryLockStore::new();
        let seat_id = SeatId::new();
        let alice = UserId::new("alice");

        let Ok(AcquireOutcome::Acquired(lock)) = store
            .acquire(seat_id, &alice, Duration::seconds(-1))
            .await
        else {
            panic!("acquire should win on an unlocked seat");
        };

        // Already past its deadline: invisible to every read.
        assert!(store.inspect(seat_id).await.unwrap().is_none());
        assert!(!store.verify(seat_id, &lock.token, &alice).await.unwrap());
        assert_eq!(
            store.bulk_exists(&[seat_id]).await.unwrap().get(&seat_id),
            Some(&false)
        );

        // And the seat is reacquirable.
        assert!(matches!(
            store.acquire(seat_id, &alice, Duration::seconds(30)).await,
            Ok(AcquireOutcome::Acquired(_))
        ));
    }
}
