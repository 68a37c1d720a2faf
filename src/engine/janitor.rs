//! Background sweep reconciling expired reservations.
//!
//! The core flows expire lazily on read; the janitor only bounds how stale
//! an ACTIVE row whose lock already vanished can get.

use crate::providers::DurableStore;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Spawn the periodic expiry sweep. Returns the task handle; aborting it
/// stops the janitor.
pub fn spawn<D>(store: Arc<D>, interval_secs: u64) -> JoinHandle<()>
where
    D: DurableStore + 'static,
{
    tokio::spawn(async move {
        info!(interval_secs, "Reservation janitor started");
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            match store.expire_overdue_reservations(Utc::now()).await {
                Ok(0) => debug!("Janitor sweep: nothing to expire"),
                Ok(expired) => {
                    metrics::counter!("engine.janitor.expired_total").increment(expired);
                    info!(expired, "Janitor expired overdue reservations");
                }
                Err(e) => warn!(error = %e, "Janitor sweep failed; will retry next tick"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use crate::mocks::MemoryStore;
    use crate::providers::DurableStore;
    use crate::types::{
        EntityId, Money, Reservation, ReservationStatus, ReservationToken, SeatId, SeatSnapshot,
        TenantId, UserId,
    };
    use chrono::{Duration, Utc};

    fn reservation(expires_in: Duration) -> Reservation {
        let now = Utc::now();
        Reservation {
            token: ReservationToken::generate(),
            user_id: UserId::new("u-1"),
            tenant_id: TenantId::new("t-1"),
            seat_id: SeatId::new(),
            status: ReservationStatus::Active,
            expires_at: now + expires_in,
            seat: SeatSnapshot {
                seat_number: "A-1".to_string(),
                price: Money::from_minor(100),
                entity_id: EntityId::new("show-1"),
            },
            created_at: now,
        }
    }

    #[tokio::test]
    async fn sweep_expires_only_overdue_rows() {
        let store = MemoryStore::new();
        let overdue = reservation(Duration::seconds(-5));
        let live = reservation(Duration::seconds(60));
        store.insert_reservation(&overdue).await.unwrap();
        store.insert_reservation(&live).await.unwrap();

        let moved = store.expire_overdue_reservations(Utc::now()).await.unwrap();
        assert_eq!(moved, 1);

        let overdue_now = store.reservation(&overdue.token).await.unwrap().unwrap();
        assert_eq!(overdue_now.status, ReservationStatus::Expired);
        let live_now = store.reservation(&live.token).await.unwrap().unwrap();
        assert_eq!(live_now.status, ReservationStatus::Active);
    }
}
