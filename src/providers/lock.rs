//! Seat lock store trait.

use crate::error::Result;
use crate::types::{ReservationToken, SeatId, UserId};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::future::Future;

/// An ephemeral, TTL-bounded seat lock.
///
/// Lives only in the lock store; disappears at `expires_at` without
/// external action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeatLock {
    /// Locked seat.
    pub seat_id: SeatId,
    /// Fresh opaque token identifying this acquisition.
    pub token: ReservationToken,
    /// Holder.
    pub user_id: UserId,
    /// Acquisition time.
    pub acquired_at: DateTime<Utc>,
    /// Expiry deadline. A lock is live strictly before this instant.
    pub expires_at: DateTime<Utc>,
}

impl SeatLock {
    /// Whether the lock is live at `now` (strict inequality at the deadline).
    #[must_use]
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Outcome of an acquisition attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum AcquireOutcome {
    /// This caller now holds the lock.
    Acquired(SeatLock),
    /// Another holder owns the lock.
    Held {
        /// Remaining TTL in seconds, when the store reports one.
        expires_in: Option<u64>,
    },
}

/// The atomic gate deciding which single requester gets a seat right now.
///
/// # Contract
///
/// - `acquire` MUST be atomic: under arbitrary concurrent callers for the
///   same seat, exactly one observes `Acquired` and all others `Held`.
/// - `release` with an expected token MUST NOT delete a lock it does not
///   own (compare-and-delete).
/// - Store unavailability surfaces as `EngineError::StoreUnavailable`,
///   never as silent success. No internal blocking retries.
pub trait LockStore: Send + Sync {
    /// Attempt an atomic create-if-absent-with-expiry for `seat_id`,
    /// generating a fresh reservation token.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the backing store cannot be reached.
    fn acquire(
        &self,
        seat_id: SeatId,
        user_id: &UserId,
        ttl: Duration,
    ) -> impl Future<Output = Result<AcquireOutcome>> + Send;

    /// Return the current lock value without mutation.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the backing store cannot be reached.
    fn inspect(&self, seat_id: SeatId) -> impl Future<Output = Result<Option<SeatLock>>> + Send;

    /// True iff a lock exists for `seat_id`, its token and holder match,
    /// and its expiry is strictly in the future.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the backing store cannot be reached.
    fn verify(
        &self,
        seat_id: SeatId,
        token: &ReservationToken,
        user_id: &UserId,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Delete the lock. With `expected`, delete only when the stored token
    /// matches (compare-and-delete). Returns whether a key was removed.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the backing store cannot be reached.
    fn release(
        &self,
        seat_id: SeatId,
        expected: Option<&ReservationToken>,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Single-round-trip batch existence check. Point-in-time best effort.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the backing store cannot be reached.
    fn bulk_exists(
        &self,
        seat_ids: &[SeatId],
    ) -> impl Future<Output = Result<HashMap<SeatId, bool>>> + Send;
}
