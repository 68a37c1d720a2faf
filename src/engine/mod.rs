//! The reservation engine: reserve, confirm, release, and the read paths.
//!
//! Every operation assumes the identity gate has already established the
//! tenant and the user. The lock store is the fast concurrency gate; the
//! durable store holds authoritative state; the only path to a booking
//! runs through holding both the live lock and the ACTIVE reservation row.

pub mod janitor;

use crate::error::{EngineError, Result};
use crate::providers::{
    AcquireOutcome, DurableStore, GatewayOrder, LockStore, PaymentProof, PaymentVerifier,
};
use crate::types::{
    Booking, EntityId, Money, Page, Reservation, ReservationStatus, ReservationToken, Seat,
    SeatId, SeatSnapshot, SeatStatus, Tenant,
};
use crate::auth::AuthedUser;
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;

/// Inputs for the seat listing read path.
#[derive(Debug, Clone)]
pub struct ListSeatsRequest {
    /// Bookable collection to list.
    pub entity_id: EntityId,
    /// Inclusive lower price bound.
    pub min_price: Option<Money>,
    /// Inclusive upper price bound.
    pub max_price: Option<Money>,
}

/// Inputs for reserving a seat.
#[derive(Debug, Clone)]
pub struct ReserveRequest {
    /// Seat to reserve.
    pub seat_id: SeatId,
}

/// Inputs for confirming a reservation into a booking.
#[derive(Debug, Clone)]
pub struct ConfirmRequest {
    /// Token from the reserve step.
    pub reservation_token: ReservationToken,
    /// Payment evidence.
    pub proof: PaymentProof,
}

/// Inputs for releasing a reservation.
#[derive(Debug, Clone)]
pub struct ReleaseRequest {
    /// Token from the reserve step.
    pub reservation_token: ReservationToken,
}

/// Inputs for creating a gateway order.
#[derive(Debug, Clone)]
pub struct CreateOrderRequest {
    /// Token from the reserve step.
    pub reservation_token: ReservationToken,
    /// Expected amount; must equal the reserved seat price when given.
    pub amount: Option<Money>,
    /// Currency override.
    pub currency: Option<String>,
}

/// Inputs for the booking history read path.
#[derive(Debug, Clone)]
pub struct BookingsRequest {
    /// 1-based page number.
    pub page: u32,
    /// Page size (1..=100).
    pub limit: u32,
}

/// Successful reserve output.
#[derive(Debug, Clone, PartialEq)]
pub struct ReservationReceipt {
    /// Token to confirm or release with.
    pub reservation_token: ReservationToken,
    /// Deadline mirroring the lock TTL.
    pub expires_at: DateTime<Utc>,
    /// Lock TTL in seconds.
    pub ttl_seconds: u64,
    /// Reserved seat.
    pub seat_id: SeatId,
    /// Seat snapshot frozen into the reservation.
    pub seat: SeatSnapshot,
}

/// Successful release output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseOutcome {
    /// The reservation was ACTIVE and has been released.
    Released,
    /// The reservation was already released (or expired); no mutation.
    AlreadyReleased,
}

/// Releases a freshly acquired lock if the owning operation never reaches
/// its disarm point — including when the request future is dropped by a
/// client disconnect between lock acquisition and reservation insert.
struct ReleaseOnDrop<L: LockStore + 'static> {
    armed: Option<(Arc<L>, SeatId, ReservationToken)>,
}

impl<L: LockStore + 'static> ReleaseOnDrop<L> {
    fn new(locks: Arc<L>, seat_id: SeatId, token: ReservationToken) -> Self {
        Self {
            armed: Some((locks, seat_id, token)),
        }
    }

    fn disarm(&mut self) {
        self.armed = None;
    }
}

impl<L: LockStore + 'static> Drop for ReleaseOnDrop<L> {
    fn drop(&mut self) {
        let Some((locks, seat_id, token)) = self.armed.take() else {
            return;
        };
        // Without a runtime (process teardown) the TTL is the backstop.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        handle.spawn(async move {
            if let Err(e) = locks.release(seat_id, Some(&token)).await {
                tracing::warn!(
                    seat_id = %seat_id,
                    error = %e,
                    "Compensating lock release failed; lock will expire by TTL"
                );
            }
        });
    }
}

/// The reservation engine.
///
/// Generic over the lock and durable stores so the test-suite can run it
/// against the in-memory mocks; the payment verifier is chosen at startup
/// from configuration.
pub struct ReservationEngine<L, D> {
    locks: Arc<L>,
    store: Arc<D>,
    payment: Arc<dyn PaymentVerifier>,
    lock_ttl: Duration,
    default_currency: String,
}

impl<L, D> ReservationEngine<L, D>
where
    L: LockStore + 'static,
    D: DurableStore,
{
    /// Wire up an engine.
    pub fn new(
        locks: Arc<L>,
        store: Arc<D>,
        payment: Arc<dyn PaymentVerifier>,
        lock_ttl_seconds: u64,
        default_currency: impl Into<String>,
    ) -> Self {
        Self {
            locks,
            store,
            payment,
            lock_ttl: Duration::seconds(i64::try_from(lock_ttl_seconds).unwrap_or(120)),
            default_currency: default_currency.into(),
        }
    }

    /// Lock TTL in seconds.
    #[must_use]
    pub fn ttl_seconds(&self) -> u64 {
        u64::try_from(self.lock_ttl.num_seconds()).unwrap_or(0)
    }

    /// List available seats for an entity, hiding seats under a live lock.
    ///
    /// The view is eventually consistent: a seat may be locked between this
    /// read and a later reserve. Reserve remains the authoritative gate.
    ///
    /// # Errors
    ///
    /// `Validation` for an inverted price range; adapter errors pass
    /// through.
    pub async fn list_seats(&self, tenant: &Tenant, request: ListSeatsRequest) -> Result<Vec<Seat>> {
        if let (Some(min), Some(max)) = (request.min_price, request.max_price) {
            if min > max {
                return Err(EngineError::Validation(
                    "minPrice must not exceed maxPrice".to_string(),
                ));
            }
        }

        let mut seats = self
            .store
            .available_seats(
                &tenant.id,
                &request.entity_id,
                request.min_price,
                request.max_price,
            )
            .await?;

        let ids: Vec<SeatId> = seats.iter().map(|seat| seat.id).collect();
        let locked = self.locks.bulk_exists(&ids).await?;
        seats.retain(|seat| !locked.get(&seat.id).copied().unwrap_or(false));

        Ok(seats)
    }

    /// Reserve a seat: acquire the lock, then write the audit row.
    ///
    /// If the row insert fails — or the request is cancelled between the
    /// two steps — the freshly acquired lock is released again so the seat
    /// is not blocked until TTL expiry.
    ///
    /// # Errors
    ///
    /// - `NotFound` — no such seat.
    /// - `Conflict` — foreign tenant's seat, or seat not `AVAILABLE`.
    /// - `SeatLocked` — another request holds the lock (with remaining TTL).
    pub async fn reserve(
        &self,
        tenant: &Tenant,
        user: &AuthedUser,
        request: ReserveRequest,
    ) -> Result<ReservationReceipt> {
        let seat = self
            .store
            .seat(request.seat_id)
            .await?
            .ok_or_else(|| EngineError::not_found("seat", request.seat_id.to_string()))?;

        if seat.tenant_id != tenant.id {
            return Err(EngineError::Conflict(
                "seat belongs to a different tenant".to_string(),
            ));
        }
        if seat.status != SeatStatus::Available {
            return Err(EngineError::Conflict(format!(
                "seat is {}",
                seat.status
            )));
        }

        let lock = match self
            .locks
            .acquire(seat.id, &user.id, self.lock_ttl)
            .await?
        {
            AcquireOutcome::Acquired(lock) => lock,
            AcquireOutcome::Held { expires_in } => {
                metrics::counter!("engine.reserve.total", "result" => "held").increment(1);
                return Err(EngineError::SeatLocked { expires_in });
            }
        };

        let mut guard = ReleaseOnDrop::new(self.locks.clone(), seat.id, lock.token.clone());

        let reservation = Reservation {
            token: lock.token.clone(),
            user_id: user.id.clone(),
            tenant_id: tenant.id.clone(),
            seat_id: seat.id,
            status: ReservationStatus::Active,
            expires_at: lock.expires_at,
            seat: SeatSnapshot::of(&seat),
            created_at: lock.acquired_at,
        };

        if let Err(e) = self.store.insert_reservation(&reservation).await {
            guard.disarm();
            let _ = self.locks.release(seat.id, Some(&lock.token)).await;
            metrics::counter!("engine.reserve.total", "result" => "insert_failed").increment(1);
            return Err(e);
        }
        guard.disarm();

        metrics::counter!("engine.reserve.total", "result" => "reserved").increment(1);
        tracing::info!(
            seat_id = %seat.id,
            token = %reservation.token,
            user_id = %user.id,
            expires_at = %reservation.expires_at,
            "Seat reserved"
        );

        Ok(ReservationReceipt {
            reservation_token: reservation.token,
            expires_at: reservation.expires_at,
            ttl_seconds: self.ttl_seconds(),
            seat_id: seat.id,
            seat: reservation.seat,
        })
    }

    /// Confirm a reservation into a booking.
    ///
    /// # Errors
    ///
    /// - `NotFound` — unknown token.
    /// - `Conflict` — foreign tenant/user, reservation not ACTIVE, expired
    ///   deadline, or seat no longer available.
    /// - `SeatLocked` — the lock vanished even though the row was ACTIVE.
    /// - `Payment` — the evidence did not verify; the lock is retained
    ///   until TTL so the caller can retry.
    pub async fn confirm(
        &self,
        tenant: &Tenant,
        user: &AuthedUser,
        request: ConfirmRequest,
    ) -> Result<Booking> {
        let token = &request.reservation_token;
        let reservation = self
            .store
            .reservation(token)
            .await?
            .ok_or_else(|| EngineError::not_found("reservation", token.as_str()))?;

        if reservation.tenant_id != tenant.id || reservation.user_id != user.id {
            return Err(EngineError::Conflict(
                "reservation does not belong to the requester".to_string(),
            ));
        }
        if reservation.status != ReservationStatus::Active {
            return Err(EngineError::Conflict(format!(
                "reservation status is {}",
                reservation.status
            )));
        }

        let now = Utc::now();
        if reservation.is_expired(now) {
            self.expire(&reservation).await?;
            metrics::counter!("engine.confirm.total", "result" => "expired").increment(1);
            return Err(EngineError::Conflict("reservation expired".to_string()));
        }

        // The lock can expire between the row read and here; the row alone
        // is not enough to proceed.
        if !self
            .locks
            .verify(reservation.seat_id, token, &user.id)
            .await?
        {
            metrics::counter!("engine.confirm.total", "result" => "lock_lost").increment(1);
            return Err(EngineError::SeatLocked { expires_in: None });
        }

        let seat = self
            .store
            .seat(reservation.seat_id)
            .await?
            .ok_or_else(|| EngineError::not_found("seat", reservation.seat_id.to_string()))?;
        if seat.status != SeatStatus::Available {
            return Err(EngineError::Conflict(format!("seat is {}", seat.status)));
        }

        // A payment failure keeps the lock so the user can retry within TTL.
        let verified = self
            .payment
            .verify(reservation.clone(), request.proof)
            .await?;

        let booking = self
            .store
            .confirm_booking(&reservation, &verified.reference, &self.default_currency)
            .await?;

        // Post-commit: an already-expired lock makes this a no-op.
        let _ = self
            .locks
            .release(reservation.seat_id, Some(token))
            .await;

        metrics::counter!("engine.confirm.total", "result" => "confirmed").increment(1);
        tracing::info!(
            booking_id = %booking.booking_id,
            seat_id = %booking.seat_id,
            token = %token,
            "Reservation confirmed"
        );

        Ok(booking)
    }

    /// Release a reservation. Idempotent on already-released tokens.
    ///
    /// # Errors
    ///
    /// - `NotFound` — unknown token.
    /// - `Conflict` — foreign tenant/user, or the reservation is CONFIRMED.
    pub async fn release(
        &self,
        tenant: &Tenant,
        user: &AuthedUser,
        request: ReleaseRequest,
    ) -> Result<ReleaseOutcome> {
        let token = &request.reservation_token;
        let reservation = self
            .store
            .reservation(token)
            .await?
            .ok_or_else(|| EngineError::not_found("reservation", token.as_str()))?;

        if reservation.tenant_id != tenant.id || reservation.user_id != user.id {
            return Err(EngineError::Conflict(
                "reservation does not belong to the requester".to_string(),
            ));
        }

        match reservation.status {
            ReservationStatus::Released | ReservationStatus::Expired => {
                return Ok(ReleaseOutcome::AlreadyReleased);
            }
            ReservationStatus::Confirmed => {
                return Err(EngineError::Conflict(
                    "reservation status is CONFIRMED".to_string(),
                ));
            }
            ReservationStatus::Active => {}
        }

        // Row first, lock second: a concurrent confirm serializes against
        // the same guarded transition.
        let moved = self
            .store
            .transition_reservation(token, ReservationStatus::Active, ReservationStatus::Released)
            .await?;

        if !moved {
            // Someone else moved the row between our read and the guard.
            let current = self
                .store
                .reservation(token)
                .await?
                .ok_or_else(|| EngineError::not_found("reservation", token.as_str()))?;
            return match current.status {
                ReservationStatus::Confirmed => Err(EngineError::Conflict(
                    "reservation status is CONFIRMED".to_string(),
                )),
                _ => Ok(ReleaseOutcome::AlreadyReleased),
            };
        }

        let _ = self
            .locks
            .release(reservation.seat_id, Some(token))
            .await;

        metrics::counter!("engine.release.total", "result" => "released").increment(1);
        tracing::info!(token = %token, seat_id = %reservation.seat_id, "Reservation released");
        Ok(ReleaseOutcome::Released)
    }

    /// Create (or return) the gateway order for a reservation.
    /// Idempotent by reservation token.
    ///
    /// # Errors
    ///
    /// - `NotFound` — unknown token.
    /// - `Conflict` — foreign tenant/user, not ACTIVE, or expired.
    /// - `Validation` — caller-supplied amount disagrees with the snapshot.
    pub async fn create_order(
        &self,
        tenant: &Tenant,
        user: &AuthedUser,
        request: CreateOrderRequest,
    ) -> Result<GatewayOrder> {
        let token = &request.reservation_token;
        let reservation = self
            .store
            .reservation(token)
            .await?
            .ok_or_else(|| EngineError::not_found("reservation", token.as_str()))?;

        if reservation.tenant_id != tenant.id || reservation.user_id != user.id {
            return Err(EngineError::Conflict(
                "reservation does not belong to the requester".to_string(),
            ));
        }
        if reservation.status != ReservationStatus::Active {
            return Err(EngineError::Conflict(format!(
                "reservation status is {}",
                reservation.status
            )));
        }
        if reservation.is_expired(Utc::now()) {
            self.expire(&reservation).await?;
            return Err(EngineError::Conflict("reservation expired".to_string()));
        }

        if let Some(existing) = self.store.order_for_reservation(token).await? {
            return Ok(existing);
        }

        let amount = request.amount.unwrap_or(reservation.seat.price);
        if amount != reservation.seat.price {
            return Err(EngineError::Validation(format!(
                "amount {} does not match the reserved seat price {}",
                amount.minor(),
                reservation.seat.price.minor()
            )));
        }
        let currency = request
            .currency
            .unwrap_or_else(|| self.default_currency.clone());

        let order = self
            .payment
            .create_order(token.clone(), amount, currency)
            .await?;

        // A concurrent create-order may have landed first; the store hands
        // back whichever row won.
        self.store.insert_order(&order).await
    }

    /// A user's bookings within the tenant, newest first.
    ///
    /// # Errors
    ///
    /// `Validation` for an out-of-range page or limit.
    pub async fn my_bookings(
        &self,
        tenant: &Tenant,
        user: &AuthedUser,
        request: BookingsRequest,
    ) -> Result<Page<Booking>> {
        if request.page == 0 {
            return Err(EngineError::Validation("page starts at 1".to_string()));
        }
        if request.limit == 0 || request.limit > 100 {
            return Err(EngineError::Validation(
                "limit must be between 1 and 100".to_string(),
            ));
        }

        self.store
            .user_bookings(&tenant.id, &user.id, request.page, request.limit)
            .await
    }

    /// Lazy expiry: reconcile the audit row with the already-vanished lock.
    async fn expire(&self, reservation: &Reservation) -> Result<()> {
        self.store
            .transition_reservation(
                &reservation.token,
                ReservationStatus::Active,
                ReservationStatus::Expired,
            )
            .await?;
        let _ = self
            .locks
            .release(reservation.seat_id, Some(&reservation.token))
            .await;
        tracing::debug!(token = %reservation.token, "Reservation expired lazily");
        Ok(())
    }
}
