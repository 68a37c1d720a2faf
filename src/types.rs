//! Domain types for the seat-booking backend.
//!
//! Value objects, entities, and state enums shared by the identity gate,
//! the reservation engine, and the adapters.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Opaque identifier of a tenant (a frontend application).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TenantId(String);

impl TenantId {
    /// Wrap an opaque tenant id string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of a user.
///
/// Registered users carry their stored id; external users carry the
/// namespaced form `ext:{tenantId}:{externalId}` so that two tenants
/// declaring the same external id can never collide.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(String);

impl UserId {
    /// Wrap an opaque user id string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Synthesize the namespaced id for a tenant-declared external user.
    #[must_use]
    pub fn external(tenant_id: &TenantId, external_id: &str) -> Self {
        Self(format!("ext:{}:{}", tenant_id.as_str(), external_id))
    }

    /// Whether this id is a tenant-declared external identity.
    #[must_use]
    pub fn is_external(&self) -> bool {
        self.0.starts_with("ext:")
    }

    /// Borrow the id as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque identifier of a bookable collection (an event, a route, a show).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityId(String);

impl EntityId {
    /// Wrap an opaque entity id string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a seat.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeatId(Uuid);

impl SeatId {
    /// Creates a new random `SeatId`.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `SeatId` from a `Uuid`.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SeatId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque token binding a lock, a reservation row, and a future booking.
///
/// Freshly generated at lock acquisition and unique forever.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationToken(String);

impl ReservationToken {
    /// Generate a fresh opaque token.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("rsv_{}", Uuid::new_v4().simple()))
    }

    /// Wrap an existing token string.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Borrow the token as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReservationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Human-readable booking identifier: `BK-YYYYMMDD-XXXXXX`.
///
/// The suffix is six uppercase base-36 characters; collisions are resolved
/// by regeneration inside the confirm transaction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookingId(String);

const BOOKING_SUFFIX_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const BOOKING_SUFFIX_LEN: usize = 6;

impl BookingId {
    /// Generate a booking id for the given booking date.
    #[must_use]
    pub fn generate(date: DateTime<Utc>) -> Self {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..BOOKING_SUFFIX_LEN)
            .map(|_| {
                let idx = rng.gen_range(0..BOOKING_SUFFIX_ALPHABET.len());
                BOOKING_SUFFIX_ALPHABET[idx] as char
            })
            .collect();
        Self(format!("BK-{}-{}", date.format("%Y%m%d"), suffix))
    }

    /// Wrap an existing booking id string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Money (minor units, to avoid floating point errors)
// ============================================================================

/// Represents money in minor units (cents, paise, ...).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Creates a `Money` value from minor units.
    #[must_use]
    pub const fn from_minor(units: u64) -> Self {
        Self(units)
    }

    /// Returns the amount in minor units.
    #[must_use]
    pub const fn minor(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero.
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two money amounts with overflow checking.
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Status enums
// ============================================================================

/// Durable seat status. One-way within the engine: `Available → Booked`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeatStatus {
    /// Open for reservation (may still be ephemerally locked).
    Available,
    /// Paid for; exactly one booking references this seat.
    Booked,
}

impl SeatStatus {
    /// Database/wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "AVAILABLE",
            Self::Booked => "BOOKED",
        }
    }

    /// Parse the database/wire representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "AVAILABLE" => Some(Self::Available),
            "BOOKED" => Some(Self::Booked),
            _ => None,
        }
    }
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reservation lifecycle status.
///
/// Transitions are one-way: `Active → {Expired, Confirmed, Released}`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationStatus {
    /// Lock held, awaiting confirmation or release.
    Active,
    /// Lock TTL elapsed before confirmation.
    Expired,
    /// Confirmed into a booking.
    Confirmed,
    /// Voluntarily released by the holder.
    Released,
}

impl ReservationStatus {
    /// Database/wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "ACTIVE",
            Self::Expired => "EXPIRED",
            Self::Confirmed => "CONFIRMED",
            Self::Released => "RELEASED",
        }
    }

    /// Parse the database/wire representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ACTIVE" => Some(Self::Active),
            "EXPIRED" => Some(Self::Expired),
            "CONFIRMED" => Some(Self::Confirmed),
            "RELEASED" => Some(Self::Released),
            _ => None,
        }
    }

    /// Whether this status is terminal.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Active)
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Entities
// ============================================================================

/// Tenant record: a first-class caller with isolated data scope.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    /// Opaque tenant id.
    pub id: TenantId,
    /// Display name.
    pub name: String,
    /// Argon2 PHC-format hash of the tenant secret.
    pub secret_hash: String,
    /// Business domain tag (e.g. "events", "transport").
    pub domain: String,
    /// Allowed request origins. Empty means unrestricted.
    pub allowed_origins: Vec<String>,
    /// Disabled tenants fail every tenant-scoped operation.
    pub active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Registered user record.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// Opaque user id.
    pub id: UserId,
    /// Email address.
    pub email: String,
    /// Display name.
    pub name: Option<String>,
    /// Inactive users fail bearer-token authentication.
    pub active: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Seat: the atomic bookable unit, keyed by `(tenant, entity, seat_number)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Seat {
    /// Unique seat id.
    pub id: SeatId,
    /// Owning tenant.
    pub tenant_id: TenantId,
    /// Bookable collection this seat belongs to.
    pub entity_id: EntityId,
    /// Seat number, unique within `(tenant, entity)`.
    pub seat_number: String,
    /// Price in minor units.
    pub price: Money,
    /// Business domain tag.
    pub domain: String,
    /// Opaque tenant-supplied metadata.
    pub metadata: serde_json::Value,
    /// Durable status.
    pub status: SeatStatus,
    /// User the seat was booked by, once `Booked`.
    pub booked_by: Option<UserId>,
    /// Internal id of the booking referencing this seat, once `Booked`.
    pub booking_ref: Option<Uuid>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Snapshot of the seat taken at reservation time.
///
/// Frozen into the reservation row so the confirm step and the receipts
/// shown to the user do not depend on later seat mutations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SeatSnapshot {
    /// Seat number at reservation time.
    pub seat_number: String,
    /// Price at reservation time, in minor units.
    pub price: Money,
    /// Entity the seat belonged to.
    pub entity_id: EntityId,
}

impl SeatSnapshot {
    /// Take a snapshot of a seat.
    #[must_use]
    pub fn of(seat: &Seat) -> Self {
        Self {
            seat_number: seat.seat_number.clone(),
            price: seat.price,
            entity_id: seat.entity_id.clone(),
        }
    }
}

/// Durable audit record of a lock acquisition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    /// The token binding lock, reservation, and booking. Unique forever.
    pub token: ReservationToken,
    /// Holder.
    pub user_id: UserId,
    /// Tenant the reservation is attributed to.
    pub tenant_id: TenantId,
    /// Reserved seat.
    pub seat_id: SeatId,
    /// Lifecycle status.
    pub status: ReservationStatus,
    /// Deadline mirroring the lock TTL.
    pub expires_at: DateTime<Utc>,
    /// Seat snapshot at reservation time.
    pub seat: SeatSnapshot,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    /// Whether the reservation deadline has passed at `now`.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Terminal, immutable record that a seat has been paid for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Booking {
    /// Internal id.
    pub id: Uuid,
    /// Human-readable id (`BK-YYYYMMDD-XXXXXX`).
    pub booking_id: BookingId,
    /// Purchaser.
    pub user_id: UserId,
    /// Tenant the booking is attributed to.
    pub tenant_id: TenantId,
    /// Booked seat.
    pub seat_id: SeatId,
    /// Originating reservation token.
    pub reservation_token: ReservationToken,
    /// Always `"SUCCESS"` on creation; bookings are immutable after.
    pub payment_status: String,
    /// Verified payment reference.
    pub payment_reference: String,
    /// Amount charged (the seat price snapshot), in minor units.
    pub amount: Money,
    /// ISO currency code.
    pub currency: String,
    /// Booking time.
    pub booked_at: DateTime<Utc>,
    /// Seat snapshot carried over from the reservation.
    pub seat: SeatSnapshot,
}

/// A page of results, newest first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    /// Items on this page.
    pub items: Vec<T>,
    /// 1-based page number.
    pub page: u32,
    /// Page size.
    pub limit: u32,
    /// Total matching items.
    pub total: u64,
}
