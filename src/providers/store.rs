//! Durable store trait.

use crate::error::Result;
use crate::providers::payment::GatewayOrder;
use crate::types::{
    Booking, EntityId, Money, Page, Reservation, ReservationStatus, ReservationToken, Seat, SeatId,
    TenantId, UserId,
};
use chrono::{DateTime, Utc};
use std::future::Future;

/// Indexed reads and multi-record transactions over seats, reservations,
/// bookings, and gateway orders.
///
/// Implementations must make `confirm_booking` ACID: either every write of
/// the confirmation lands, or none does.
pub trait DurableStore: Send + Sync {
    /// Load a seat by id.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` on I/O failure.
    fn seat(&self, seat_id: SeatId) -> impl Future<Output = Result<Option<Seat>>> + Send;

    /// All `AVAILABLE` seats for `(tenant, entity)` ordered by seat number,
    /// optionally filtered to a price range (inclusive).
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` on I/O failure.
    fn available_seats(
        &self,
        tenant_id: &TenantId,
        entity_id: &EntityId,
        min_price: Option<Money>,
        max_price: Option<Money>,
    ) -> impl Future<Output = Result<Vec<Seat>>> + Send;

    /// Insert a seat (tenant sync path).
    ///
    /// # Errors
    ///
    /// Returns `Conflict` when the `(tenant, entity, seat_number)` key is
    /// taken and `StoreUnavailable` on I/O failure.
    fn insert_seat(&self, seat: &Seat) -> impl Future<Output = Result<()>> + Send;

    /// Insert a reservation audit row.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` when the token is already present and
    /// `StoreUnavailable` on I/O failure.
    fn insert_reservation(
        &self,
        reservation: &Reservation,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Load a reservation by token.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` on I/O failure.
    fn reservation(
        &self,
        token: &ReservationToken,
    ) -> impl Future<Output = Result<Option<Reservation>>> + Send;

    /// Guarded one-way transition: move the reservation from `from` to `to`
    /// only if it is still in `from`. Returns whether the row moved.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` on I/O failure.
    fn transition_reservation(
        &self,
        token: &ReservationToken,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// The confirmation transaction: insert the booking, flip the seat to
    /// `BOOKED` (carrying `booked_by` and the new booking reference in one
    /// update), and move the reservation to `CONFIRMED` — atomically.
    ///
    /// The booking id is generated inside the transaction and regenerated
    /// on collision.
    ///
    /// # Errors
    ///
    /// Returns `Conflict` when the seat is no longer `AVAILABLE` or the
    /// reservation is no longer `ACTIVE` (nothing is written), and
    /// `StoreUnavailable` on I/O failure.
    fn confirm_booking(
        &self,
        reservation: &Reservation,
        payment_reference: &str,
        currency: &str,
    ) -> impl Future<Output = Result<Booking>> + Send;

    /// Load the booking created from a reservation token, if any.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` on I/O failure.
    fn booking_for_reservation(
        &self,
        token: &ReservationToken,
    ) -> impl Future<Output = Result<Option<Booking>>> + Send;

    /// A user's bookings within a tenant, newest first, paginated.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` on I/O failure.
    fn user_bookings(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId,
        page: u32,
        limit: u32,
    ) -> impl Future<Output = Result<Page<Booking>>> + Send;

    /// Janitor sweep: mark every `ACTIVE` reservation whose deadline is
    /// strictly before `now` as `EXPIRED`. Returns the number of rows
    /// moved.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` on I/O failure.
    fn expire_overdue_reservations(
        &self,
        now: DateTime<Utc>,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Load the gateway order created for a reservation token, if any.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` on I/O failure.
    fn order_for_reservation(
        &self,
        token: &ReservationToken,
    ) -> impl Future<Output = Result<Option<GatewayOrder>>> + Send;

    /// Persist a gateway order. Idempotent by reservation token: when a
    /// concurrent insert wins, the stored order is returned instead.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` on I/O failure.
    fn insert_order(
        &self,
        order: &GatewayOrder,
    ) -> impl Future<Output = Result<GatewayOrder>> + Send;
}
