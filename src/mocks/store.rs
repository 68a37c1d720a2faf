//! Mock durable store for testing.

use crate::error::{EngineError, Result};
use crate::providers::{DurableStore, GatewayOrder, TenantRepository, UserRepository};
use crate::types::{
    Booking, BookingId, EntityId, Money, Page, Reservation, ReservationStatus, ReservationToken,
    Seat, SeatId, SeatStatus, Tenant, TenantId, User, UserId,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

#[derive(Debug, Default)]
struct Inner {
    tenants: HashMap<String, Tenant>,
    users: HashMap<String, User>,
    seats: HashMap<SeatId, Seat>,
    reservations: HashMap<String, Reservation>,
    bookings: HashMap<Uuid, Booking>,
    orders: HashMap<String, GatewayOrder>,
}

/// In-memory durable store.
///
/// All maps live behind a single mutex, so `confirm_booking` applies its
/// guards and writes atomically, like the real transaction.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Create an empty mock store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count of ACTIVE reservations for a seat (for assertions).
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the lock is poisoned.
    pub fn active_reservations_for(&self, seat_id: SeatId) -> Result<usize> {
        Ok(self
            .guard()?
            .reservations
            .values()
            .filter(|r| r.seat_id == seat_id && r.status == ReservationStatus::Active)
            .count())
    }

    fn guard(&self) -> Result<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| EngineError::StoreUnavailable("mutex poisoned".to_string()))
    }
}

impl DurableStore for MemoryStore {
    async fn seat(&self, seat_id: SeatId) -> Result<Option<Seat>> {
        Ok(self.guard()?.seats.get(&seat_id).cloned())
    }

    async fn available_seats(
        &self,
        tenant_id: &TenantId,
        entity_id: &EntityId,
        min_price: Option<Money>,
        max_price: Option<Money>,
    ) -> Result<Vec<Seat>> {
        let mut seats: Vec<Seat> = self
            .guard()?
            .seats
            .values()
            .filter(|seat| {
                seat.tenant_id == *tenant_id
                    && seat.entity_id == *entity_id
                    && seat.status == SeatStatus::Available
                    && min_price.map_or(true, |min| seat.price >= min)
                    && max_price.map_or(true, |max| seat.price <= max)
            })
            .cloned()
            .collect();
        seats.sort_by(|a, b| a.seat_number.cmp(&b.seat_number));
        Ok(seats)
    }

    async fn insert_seat(&self, seat: &Seat) -> Result<()> {
        let mut inner = self.guard()?;
        let duplicate = inner.seats.values().any(|existing| {
            existing.tenant_id == seat.tenant_id
                && existing.entity_id == seat.entity_id
                && existing.seat_number == seat.seat_number
        });
        if duplicate {
            return Err(EngineError::Conflict(format!(
                "seat {} already exists for entity {}",
                seat.seat_number, seat.entity_id
            )));
        }
        inner.seats.insert(seat.id, seat.clone());
        Ok(())
    }

    async fn insert_reservation(&self, reservation: &Reservation) -> Result<()> {
        let mut inner = self.guard()?;
        let key = reservation.token.as_str().to_string();
        if inner.reservations.contains_key(&key) {
            return Err(EngineError::Conflict(
                "reservation token already exists".to_string(),
            ));
        }
        inner.reservations.insert(key, reservation.clone());
        Ok(())
    }

    async fn reservation(&self, token: &ReservationToken) -> Result<Option<Reservation>> {
        Ok(self.guard()?.reservations.get(token.as_str()).cloned())
    }

    async fn transition_reservation(
        &self,
        token: &ReservationToken,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> Result<bool> {
        let mut inner = self.guard()?;
        match inner.reservations.get_mut(token.as_str()) {
            Some(reservation) if reservation.status == from => {
                reservation.status = to;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn confirm_booking(
        &self,
        reservation: &Reservation,
        payment_reference: &str,
        currency: &str,
    ) -> Result<Booking> {
        let mut inner = self.guard()?;

        // Guards re-check current state, not the caller's snapshot.
        let current = inner
            .reservations
            .get(reservation.token.as_str())
            .cloned()
            .ok_or_else(|| {
                EngineError::not_found("reservation", reservation.token.as_str())
            })?;
        if current.status != ReservationStatus::Active {
            return Err(EngineError::Conflict(
                "reservation is no longer active".to_string(),
            ));
        }

        let seat = inner
            .seats
            .get(&reservation.seat_id)
            .cloned()
            .ok_or_else(|| {
                EngineError::not_found("seat", reservation.seat_id.to_string())
            })?;
        if seat.status != SeatStatus::Available {
            return Err(EngineError::Conflict(
                "seat is no longer available".to_string(),
            ));
        }

        let already_booked = inner
            .bookings
            .values()
            .any(|b| b.reservation_token == reservation.token);
        if already_booked {
            return Err(EngineError::Conflict(
                "reservation has already been confirmed".to_string(),
            ));
        }

        let booked_at = Utc::now();
        let mut booking_id = BookingId::generate(booked_at);
        while inner.bookings.values().any(|b| b.booking_id == booking_id) {
            booking_id = BookingId::generate(booked_at);
        }

        let booking = Booking {
            id: Uuid::new_v4(),
            booking_id,
            user_id: reservation.user_id.clone(),
            tenant_id: reservation.tenant_id.clone(),
            seat_id: reservation.seat_id,
            reservation_token: reservation.token.clone(),
            payment_status: "SUCCESS".to_string(),
            payment_reference: payment_reference.to_string(),
            amount: reservation.seat.price,
            currency: currency.to_string(),
            booked_at,
            seat: reservation.seat.clone(),
        };

        if let Some(seat) = inner.seats.get_mut(&reservation.seat_id) {
            seat.status = SeatStatus::Booked;
            seat.booked_by = Some(reservation.user_id.clone());
            seat.booking_ref = Some(booking.id);
        }
        if let Some(row) = inner.reservations.get_mut(reservation.token.as_str()) {
            row.status = ReservationStatus::Confirmed;
        }
        inner.bookings.insert(booking.id, booking.clone());

        Ok(booking)
    }

    async fn booking_for_reservation(&self, token: &ReservationToken) -> Result<Option<Booking>> {
        Ok(self
            .guard()?
            .bookings
            .values()
            .find(|b| b.reservation_token == *token)
            .cloned())
    }

    async fn user_bookings(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId,
        page: u32,
        limit: u32,
    ) -> Result<Page<Booking>> {
        let mut items: Vec<Booking> = self
            .guard()?
            .bookings
            .values()
            .filter(|b| b.tenant_id == *tenant_id && b.user_id == *user_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            b.booked_at
                .cmp(&a.booked_at)
                .then_with(|| b.booking_id.as_str().cmp(a.booking_id.as_str()))
        });

        let total = items.len() as u64;
        let offset = (page.saturating_sub(1) as usize).saturating_mul(limit as usize);
        let items = items
            .into_iter()
            .skip(offset)
            .take(limit as usize)
            .collect();

        Ok(Page {
            items,
            page,
            limit,
            total,
        })
    }

    async fn expire_overdue_reservations(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut inner = self.guard()?;
        let mut moved = 0;
        for reservation in inner.reservations.values_mut() {
            if reservation.status == ReservationStatus::Active && reservation.expires_at < now {
                reservation.status = ReservationStatus::Expired;
                moved += 1;
            }
        }
        Ok(moved)
    }

    async fn order_for_reservation(&self, token: &ReservationToken) -> Result<Option<GatewayOrder>> {
        Ok(self.guard()?.orders.get(token.as_str()).cloned())
    }

    async fn insert_order(&self, order: &GatewayOrder) -> Result<GatewayOrder> {
        let mut inner = self.guard()?;
        let key = order.reservation_token.as_str().to_string();
        if let Some(existing) = inner.orders.get(&key) {
            return Ok(existing.clone());
        }
        inner.orders.insert(key, order.clone());
        Ok(order.clone())
    }
}

impl TenantRepository for MemoryStore {
    async fn tenant(&self, tenant_id: &TenantId) -> Result<Option<Tenant>> {
        Ok(self.guard()?.tenants.get(tenant_id.as_str()).cloned())
    }

    async fn insert_tenant(&self, tenant: &Tenant) -> Result<()> {
        let mut inner = self.guard()?;
        let key = tenant.id.as_str().to_string();
        if inner.tenants.contains_key(&key) {
            return Err(EngineError::Conflict(format!(
                "tenant {} already exists",
                tenant.id
            )));
        }
        inner.tenants.insert(key, tenant.clone());
        Ok(())
    }
}

impl UserRepository for MemoryStore {
    async fn user(&self, user_id: &UserId) -> Result<Option<User>> {
        Ok(self.guard()?.users.get(user_id.as_str()).cloned())
    }

    async fn insert_user(&self, user: &User) -> Result<()> {
        let mut inner = self.guard()?;
        let key = user.id.as_str().to_string();
        if inner.users.contains_key(&key) {
            return Err(EngineError::Conflict(format!(
                "user {} already exists",
                user.id
            )));
        }
        inner.users.insert(key, user.clone());
        Ok(())
    }
}
