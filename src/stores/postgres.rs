//! PostgreSQL durable store.
//!
//! Implements [`DurableStore`] plus the tenant/user directories on a single
//! pooled connection handle. All queries use the runtime `sqlx` API; the
//! confirmation step runs as one transaction whose guards (`rows_affected`
//! checks) abort the whole write set on any invariant violation.

use crate::config::PostgresConfig;
use crate::error::{EngineError, Result};
use crate::providers::{DurableStore, GatewayOrder, TenantRepository, UserRepository};
use crate::types::{
    Booking, BookingId, EntityId, Money, Page, Reservation, ReservationStatus, ReservationToken,
    Seat, SeatId, SeatSnapshot, SeatStatus, Tenant, TenantId, User, UserId,
};
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;
use std::time::Duration;
use uuid::Uuid;

/// Attempts at generating a non-colliding booking id inside the confirm
/// transaction before giving up. With a 36^6 suffix space this bound is
/// effectively never reached.
const BOOKING_ID_ATTEMPTS: u32 = 4;

/// PostgreSQL-backed durable store.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    /// Connect to PostgreSQL with the configured pool limits.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if the connection cannot be established.
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connect_timeout))
            .connect(&config.url)
            .await
            .map_err(|e| EngineError::StoreUnavailable(format!("connection failed: {e}")))?;

        tracing::info!("PgStore connected");
        Ok(Self { pool })
    }

    /// Wrap an existing pool (test harnesses).
    #[must_use]
    pub const fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns `StoreUnavailable` if migrations fail.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| EngineError::StoreUnavailable(format!("migration failed: {e}")))?;
        tracing::info!("Database migrations completed");
        Ok(())
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    fn db_err(context: &str, e: &sqlx::Error) -> EngineError {
        EngineError::StoreUnavailable(format!("{context}: {e}"))
    }

    fn is_unique_violation(e: &sqlx::Error) -> bool {
        matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
    }

    fn money_from_row(row: &PgRow, column: &str) -> Result<Money> {
        let raw: i64 = row
            .try_get(column)
            .map_err(|e| Self::db_err("price column read failed", &e))?;
        let units = u64::try_from(raw).map_err(|_| {
            EngineError::StoreUnavailable(format!("negative amount {raw} in column {column}"))
        })?;
        Ok(Money::from_minor(units))
    }

    #[allow(clippy::cast_possible_wrap)]
    fn money_to_db(money: Money) -> i64 {
        money.minor() as i64
    }

    fn seat_from_row(row: &PgRow) -> Result<Seat> {
        let status_raw: String = row
            .try_get("status")
            .map_err(|e| Self::db_err("seat status read failed", &e))?;
        let status = SeatStatus::parse(&status_raw).ok_or_else(|| {
            EngineError::StoreUnavailable(format!("unknown seat status {status_raw}"))
        })?;

        Ok(Seat {
            id: SeatId::from_uuid(
                row.try_get("id")
                    .map_err(|e| Self::db_err("seat id read failed", &e))?,
            ),
            tenant_id: TenantId::new(
                row.try_get::<String, _>("tenant_id")
                    .map_err(|e| Self::db_err("seat tenant read failed", &e))?,
            ),
            entity_id: EntityId::new(
                row.try_get::<String, _>("entity_id")
                    .map_err(|e| Self::db_err("seat entity read failed", &e))?,
            ),
            seat_number: row
                .try_get("seat_number")
                .map_err(|e| Self::db_err("seat number read failed", &e))?,
            price: Self::money_from_row(row, "price")?,
            domain: row
                .try_get("domain")
                .map_err(|e| Self::db_err("seat domain read failed", &e))?,
            metadata: row
                .try_get("metadata")
                .map_err(|e| Self::db_err("seat metadata read failed", &e))?,
            status,
            booked_by: row
                .try_get::<Option<String>, _>("booked_by")
                .map_err(|e| Self::db_err("seat booker read failed", &e))?
                .map(UserId::new),
            booking_ref: row
                .try_get("booking_ref")
                .map_err(|e| Self::db_err("seat booking ref read failed", &e))?,
            created_at: row
                .try_get("created_at")
                .map_err(|e| Self::db_err("seat created_at read failed", &e))?,
        })
    }

    fn reservation_from_row(row: &PgRow) -> Result<Reservation> {
        let status_raw: String = row
            .try_get("status")
            .map_err(|e| Self::db_err("reservation status read failed", &e))?;
        let status = ReservationStatus::parse(&status_raw).ok_or_else(|| {
            EngineError::StoreUnavailable(format!("unknown reservation status {status_raw}"))
        })?;

        Ok(Reservation {
            token: ReservationToken::new(
                row.try_get::<String, _>("token")
                    .map_err(|e| Self::db_err("reservation token read failed", &e))?,
            ),
            user_id: UserId::new(
                row.try_get::<String, _>("user_id")
                    .map_err(|e| Self::db_err("reservation user read failed", &e))?,
            ),
            tenant_id: TenantId::new(
                row.try_get::<String, _>("tenant_id")
                    .map_err(|e| Self::db_err("reservation tenant read failed", &e))?,
            ),
            seat_id: SeatId::from_uuid(
                row.try_get("seat_id")
                    .map_err(|e| Self::db_err("reservation seat read failed", &e))?,
            ),
            status,
            expires_at: row
                .try_get("expires_at")
                .map_err(|e| Self::db_err("reservation expiry read failed", &e))?,
            seat: SeatSnapshot {
                seat_number: row
                    .try_get("seat_number")
                    .map_err(|e| Self::db_err("snapshot seat number read failed", &e))?,
                price: Self::money_from_row(row, "price")?,
                entity_id: EntityId::new(
                    row.try_get::<String, _>("entity_id")
                        .map_err(|e| Self::db_err("snapshot entity read failed", &e))?,
                ),
            },
            created_at: row
                .try_get("created_at")
                .map_err(|e| Self::db_err("reservation created_at read failed", &e))?,
        })
    }

    fn booking_from_row(row: &PgRow) -> Result<Booking> {
        let amount = Self::money_from_row(row, "amount")?;
        Ok(Booking {
            id: row
                .try_get("id")
                .map_err(|e| Self::db_err("booking id read failed", &e))?,
            booking_id: BookingId::new(
                row.try_get::<String, _>("booking_id")
                    .map_err(|e| Self::db_err("booking code read failed", &e))?,
            ),
            user_id: UserId::new(
                row.try_get::<String, _>("user_id")
                    .map_err(|e| Self::db_err("booking user read failed", &e))?,
            ),
            tenant_id: TenantId::new(
                row.try_get::<String, _>("tenant_id")
                    .map_err(|e| Self::db_err("booking tenant read failed", &e))?,
            ),
            seat_id: SeatId::from_uuid(
                row.try_get("seat_id")
                    .map_err(|e| Self::db_err("booking seat read failed", &e))?,
            ),
            reservation_token: ReservationToken::new(
                row.try_get::<String, _>("reservation_token")
                    .map_err(|e| Self::db_err("booking token read failed", &e))?,
            ),
            payment_status: row
                .try_get("payment_status")
                .map_err(|e| Self::db_err("booking payment status read failed", &e))?,
            payment_reference: row
                .try_get("payment_reference")
                .map_err(|e| Self::db_err("booking reference read failed", &e))?,
            amount,
            currency: row
                .try_get("currency")
                .map_err(|e| Self::db_err("booking currency read failed", &e))?,
            booked_at: row
                .try_get("booked_at")
                .map_err(|e| Self::db_err("booking time read failed", &e))?,
            seat: SeatSnapshot {
                seat_number: row
                    .try_get("seat_number")
                    .map_err(|e| Self::db_err("booking seat number read failed", &e))?,
                price: amount,
                entity_id: EntityId::new(
                    row.try_get::<String, _>("entity_id")
                        .map_err(|e| Self::db_err("booking entity read failed", &e))?,
                ),
            },
        })
    }

    fn order_from_row(row: &PgRow) -> Result<GatewayOrder> {
        Ok(GatewayOrder {
            order_id: row
                .try_get("order_id")
                .map_err(|e| Self::db_err("order id read failed", &e))?,
            reservation_token: ReservationToken::new(
                row.try_get::<String, _>("reservation_token")
                    .map_err(|e| Self::db_err("order token read failed", &e))?,
            ),
            amount: Self::money_from_row(row, "amount")?,
            currency: row
                .try_get("currency")
                .map_err(|e| Self::db_err("order currency read failed", &e))?,
            gateway_key: row
                .try_get("gateway_key")
                .map_err(|e| Self::db_err("order gateway key read failed", &e))?,
            created_at: row
                .try_get("created_at")
                .map_err(|e| Self::db_err("order created_at read failed", &e))?,
        })
    }
}

impl DurableStore for PgStore {
    async fn seat(&self, seat_id: SeatId) -> Result<Option<Seat>> {
        let row = sqlx::query(
            r"
            SELECT id, tenant_id, entity_id, seat_number, price, domain,
                   metadata, status, booked_by, booking_ref, created_at
            FROM seats
            WHERE id = $1
            ",
        )
        .bind(seat_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Self::db_err("failed to load seat", &e))?;

        row.as_ref().map(Self::seat_from_row).transpose()
    }

    async fn available_seats(
        &self,
        tenant_id: &TenantId,
        entity_id: &EntityId,
        min_price: Option<Money>,
        max_price: Option<Money>,
    ) -> Result<Vec<Seat>> {
        let rows = sqlx::query(
            r"
            SELECT id, tenant_id, entity_id, seat_number, price, domain,
                   metadata, status, booked_by, booking_ref, created_at
            FROM seats
            WHERE tenant_id = $1
              AND entity_id = $2
              AND status = 'AVAILABLE'
              AND ($3::bigint IS NULL OR price >= $3)
              AND ($4::bigint IS NULL OR price <= $4)
            ORDER BY seat_number ASC
            ",
        )
        .bind(tenant_id.as_str())
        .bind(entity_id.as_str())
        .bind(min_price.map(Self::money_to_db))
        .bind(max_price.map(Self::money_to_db))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::db_err("failed to list seats", &e))?;

        rows.iter().map(Self::seat_from_row).collect()
    }

    async fn insert_seat(&self, seat: &Seat) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO seats
                (id, tenant_id, entity_id, seat_number, price, domain,
                 metadata, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ",
        )
        .bind(seat.id.as_uuid())
        .bind(seat.tenant_id.as_str())
        .bind(seat.entity_id.as_str())
        .bind(&seat.seat_number)
        .bind(Self::money_to_db(seat.price))
        .bind(&seat.domain)
        .bind(&seat.metadata)
        .bind(seat.status.as_str())
        .bind(seat.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if Self::is_unique_violation(&e) {
                EngineError::Conflict(format!(
                    "seat {} already exists for entity {}",
                    seat.seat_number, seat.entity_id
                ))
            } else {
                Self::db_err("failed to insert seat", &e)
            }
        })?;

        Ok(())
    }

    async fn insert_reservation(&self, reservation: &Reservation) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO reservations
                (token, user_id, tenant_id, seat_id, status, expires_at,
                 seat_number, price, entity_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ",
        )
        .bind(reservation.token.as_str())
        .bind(reservation.user_id.as_str())
        .bind(reservation.tenant_id.as_str())
        .bind(reservation.seat_id.as_uuid())
        .bind(reservation.status.as_str())
        .bind(reservation.expires_at)
        .bind(&reservation.seat.seat_number)
        .bind(Self::money_to_db(reservation.seat.price))
        .bind(reservation.seat.entity_id.as_str())
        .bind(reservation.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if Self::is_unique_violation(&e) {
                EngineError::Conflict("reservation token already exists".to_string())
            } else {
                Self::db_err("failed to insert reservation", &e)
            }
        })?;

        Ok(())
    }

    async fn reservation(&self, token: &ReservationToken) -> Result<Option<Reservation>> {
        let row = sqlx::query(
            r"
            SELECT token, user_id, tenant_id, seat_id, status, expires_at,
                   seat_number, price, entity_id, created_at
            FROM reservations
            WHERE token = $1
            ",
        )
        .bind(token.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Self::db_err("failed to load reservation", &e))?;

        row.as_ref().map(Self::reservation_from_row).transpose()
    }

    async fn transition_reservation(
        &self,
        token: &ReservationToken,
        from: ReservationStatus,
        to: ReservationStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            r"
            UPDATE reservations
            SET status = $3
            WHERE token = $1 AND status = $2
            ",
        )
        .bind(token.as_str())
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| Self::db_err("failed to transition reservation", &e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn confirm_booking(
        &self,
        reservation: &Reservation,
        payment_reference: &str,
        currency: &str,
    ) -> Result<Booking> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| Self::db_err("failed to start transaction", &e))?;

        let booked_at = Utc::now();

        // Generate the human-readable id inside the transaction; the unique
        // index on booking_id remains the backstop for a lost race.
        let mut booking_id = BookingId::generate(booked_at);
        for attempt in 0..BOOKING_ID_ATTEMPTS {
            let taken: bool = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM bookings WHERE booking_id = $1)",
            )
            .bind(booking_id.as_str())
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| Self::db_err("failed to check booking id", &e))?;

            if !taken {
                break;
            }
            tracing::warn!(
                booking_id = %booking_id,
                attempt,
                "Booking id collision, regenerating"
            );
            booking_id = BookingId::generate(booked_at);
        }

        let internal_id = Uuid::new_v4();

        let insert = sqlx::query(
            r"
            INSERT INTO bookings
                (id, booking_id, user_id, tenant_id, seat_id, reservation_token,
                 payment_status, payment_reference, amount, currency, booked_at,
                 seat_number, entity_id)
            VALUES ($1, $2, $3, $4, $5, $6, 'SUCCESS', $7, $8, $9, $10, $11, $12)
            ",
        )
        .bind(internal_id)
        .bind(booking_id.as_str())
        .bind(reservation.user_id.as_str())
        .bind(reservation.tenant_id.as_str())
        .bind(reservation.seat_id.as_uuid())
        .bind(reservation.token.as_str())
        .bind(payment_reference)
        .bind(Self::money_to_db(reservation.seat.price))
        .bind(currency)
        .bind(booked_at)
        .bind(&reservation.seat.seat_number)
        .bind(reservation.seat.entity_id.as_str())
        .execute(&mut *tx)
        .await;

        if let Err(e) = insert {
            let _ = tx.rollback().await;
            if Self::is_unique_violation(&e) {
                // A concurrent confirm won the reservation_token index.
                return Err(EngineError::Conflict(
                    "reservation has already been confirmed".to_string(),
                ));
            }
            return Err(Self::db_err("failed to insert booking", &e));
        }

        // One seat mutation carrying status, booker, and booking reference.
        let seat_update = sqlx::query(
            r"
            UPDATE seats
            SET status = 'BOOKED', booked_by = $2, booking_ref = $3
            WHERE id = $1 AND status = 'AVAILABLE'
            ",
        )
        .bind(reservation.seat_id.as_uuid())
        .bind(reservation.user_id.as_str())
        .bind(internal_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| Self::db_err("failed to update seat", &e))?;

        if seat_update.rows_affected() != 1 {
            let _ = tx.rollback().await;
            return Err(EngineError::Conflict(
                "seat is no longer available".to_string(),
            ));
        }

        let reservation_update = sqlx::query(
            r"
            UPDATE reservations
            SET status = 'CONFIRMED'
            WHERE token = $1 AND status = 'ACTIVE'
            ",
        )
        .bind(reservation.token.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| Self::db_err("failed to confirm reservation", &e))?;

        if reservation_update.rows_affected() != 1 {
            let _ = tx.rollback().await;
            return Err(EngineError::Conflict(
                "reservation is no longer active".to_string(),
            ));
        }

        tx.commit()
            .await
            .map_err(|e| Self::db_err("failed to commit booking", &e))?;

        tracing::info!(
            booking_id = %booking_id,
            seat_id = %reservation.seat_id,
            token = %reservation.token,
            "Booking confirmed"
        );

        Ok(Booking {
            id: internal_id,
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
        })
    }

    async fn booking_for_reservation(&self, token: &ReservationToken) -> Result<Option<Booking>> {
        let row = sqlx::query(
            r"
            SELECT id, booking_id, user_id, tenant_id, seat_id, reservation_token,
                   payment_status, payment_reference, amount, currency, booked_at,
                   seat_number, entity_id
            FROM bookings
            WHERE reservation_token = $1
            ",
        )
        .bind(token.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Self::db_err("failed to load booking", &e))?;

        row.as_ref().map(Self::booking_from_row).transpose()
    }

    async fn user_bookings(
        &self,
        tenant_id: &TenantId,
        user_id: &UserId,
        page: u32,
        limit: u32,
    ) -> Result<Page<Booking>> {
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM bookings WHERE tenant_id = $1 AND user_id = $2",
        )
        .bind(tenant_id.as_str())
        .bind(user_id.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| Self::db_err("failed to count bookings", &e))?;

        let offset = i64::from(page.saturating_sub(1)) * i64::from(limit);
        let rows = sqlx::query(
            r"
            SELECT id, booking_id, user_id, tenant_id, seat_id, reservation_token,
                   payment_status, payment_reference, amount, currency, booked_at,
                   seat_number, entity_id
            FROM bookings
            WHERE tenant_id = $1 AND user_id = $2
            ORDER BY booked_at DESC
            LIMIT $3 OFFSET $4
            ",
        )
        .bind(tenant_id.as_str())
        .bind(user_id.as_str())
        .bind(i64::from(limit))
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| Self::db_err("failed to list bookings", &e))?;

        Ok(Page {
            items: rows.iter().map(Self::booking_from_row).collect::<Result<_>>()?,
            page,
            limit,
            total: u64::try_from(total).unwrap_or(0),
        })
    }

    async fn expire_overdue_reservations(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query(
            r"
            UPDATE reservations
            SET status = 'EXPIRED'
            WHERE status = 'ACTIVE' AND expires_at < $1
            ",
        )
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::db_err("failed to expire reservations", &e))?;

        Ok(result.rows_affected())
    }

    async fn order_for_reservation(&self, token: &ReservationToken) -> Result<Option<GatewayOrder>> {
        let row = sqlx::query(
            r"
            SELECT order_id, reservation_token, amount, currency, gateway_key, created_at
            FROM payment_orders
            WHERE reservation_token = $1
            ",
        )
        .bind(token.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Self::db_err("failed to load order", &e))?;

        row.as_ref().map(Self::order_from_row).transpose()
    }

    async fn insert_order(&self, order: &GatewayOrder) -> Result<GatewayOrder> {
        let result = sqlx::query(
            r"
            INSERT INTO payment_orders
                (order_id, reservation_token, amount, currency, gateway_key, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (reservation_token) DO NOTHING
            ",
        )
        .bind(&order.order_id)
        .bind(order.reservation_token.as_str())
        .bind(Self::money_to_db(order.amount))
        .bind(&order.currency)
        .bind(&order.gateway_key)
        .bind(order.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| Self::db_err("failed to insert order", &e))?;

        if result.rows_affected() == 1 {
            return Ok(order.clone());
        }

        // A concurrent create-order won; hand back the stored row.
        self.order_for_reservation(&order.reservation_token)
            .await?
            .ok_or_else(|| {
                EngineError::StoreUnavailable("order insert raced with delete".to_string())
            })
    }
}

impl TenantRepository for PgStore {
    async fn tenant(&self, tenant_id: &TenantId) -> Result<Option<Tenant>> {
        let row = sqlx::query(
            r"
            SELECT id, name, secret_hash, domain, allowed_origins, active, created_at
            FROM tenants
            WHERE id = $1
            ",
        )
        .bind(tenant_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Self::db_err("failed to load tenant", &e))?;

        let Some(row) = row else { return Ok(None) };

        Ok(Some(Tenant {
            id: TenantId::new(
                row.try_get::<String, _>("id")
                    .map_err(|e| Self::db_err("tenant id read failed", &e))?,
            ),
            name: row
                .try_get("name")
                .map_err(|e| Self::db_err("tenant name read failed", &e))?,
            secret_hash: row
                .try_get("secret_hash")
                .map_err(|e| Self::db_err("tenant hash read failed", &e))?,
            domain: row
                .try_get("domain")
                .map_err(|e| Self::db_err("tenant domain read failed", &e))?,
            allowed_origins: row
                .try_get("allowed_origins")
                .map_err(|e| Self::db_err("tenant origins read failed", &e))?,
            active: row
                .try_get("active")
                .map_err(|e| Self::db_err("tenant active read failed", &e))?,
            created_at: row
                .try_get("created_at")
                .map_err(|e| Self::db_err("tenant created_at read failed", &e))?,
        }))
    }

    async fn insert_tenant(&self, tenant: &Tenant) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO tenants
                (id, name, secret_hash, domain, allowed_origins, active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(tenant.id.as_str())
        .bind(&tenant.name)
        .bind(&tenant.secret_hash)
        .bind(&tenant.domain)
        .bind(&tenant.allowed_origins)
        .bind(tenant.active)
        .bind(tenant.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if Self::is_unique_violation(&e) {
                EngineError::Conflict(format!("tenant {} already exists", tenant.id))
            } else {
                Self::db_err("failed to insert tenant", &e)
            }
        })?;

        Ok(())
    }
}

impl UserRepository for PgStore {
    async fn user(&self, user_id: &UserId) -> Result<Option<User>> {
        let row = sqlx::query(
            r"
            SELECT id, email, name, active, created_at
            FROM users
            WHERE id = $1
            ",
        )
        .bind(user_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| Self::db_err("failed to load user", &e))?;

        let Some(row) = row else { return Ok(None) };

        Ok(Some(User {
            id: UserId::new(
                row.try_get::<String, _>("id")
                    .map_err(|e| Self::db_err("user id read failed", &e))?,
            ),
            email: row
                .try_get("email")
                .map_err(|e| Self::db_err("user email read failed", &e))?,
            name: row
                .try_get("name")
                .map_err(|e| Self::db_err("user name read failed", &e))?,
            active: row
                .try_get("active")
                .map_err(|e| Self::db_err("user active read failed", &e))?,
            created_at: row
                .try_get("created_at")
                .map_err(|e| Self::db_err("user created_at read failed", &e))?,
        }))
    }

    async fn insert_user(&self, user: &User) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO users (id, email, name, active, created_at)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(user.id.as_str())
        .bind(&user.email)
        .bind(&user.name)
        .bind(user.active)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if Self::is_unique_violation(&e) {
                EngineError::Conflict(format!("user {} already exists", user.id))
            } else {
                Self::db_err("failed to insert user", &e)
            }
        })?;

        Ok(())
    }
}
