use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::BookingError;
use crate::models::{Booking, BookingSnapshot, SlotView};
use crate::services::ledger::BookingLedger;
use crate::services::registry::SlotRegistry;

#[derive(Debug, Clone, Serialize)]
pub struct ReservationOutcome {
    pub slot: SlotView,
    pub booking: Booking,
}

/// Coordinates the free -> occupied -> free transitions of a slot, keeping
/// the registry flag and the booking ledger consistent.
///
/// Each reserve/cancel runs under an exclusive per-slot lock, and the slot is
/// re-read after the lock is taken — a stale pre-lock read must never decide
/// the outcome. The registry's conditional update remains the arbiter across
/// processes that don't share this lock table.
#[derive(Clone)]
pub struct ReservationService {
    registry: Arc<dyn SlotRegistry>,
    ledger: Arc<dyn BookingLedger>,
    // Slots are never deleted, so the lock table only grows with the catalog.
    slot_locks: Arc<Mutex<HashMap<Uuid, Arc<Mutex<()>>>>>,
}

impl ReservationService {
    pub fn new(registry: Arc<dyn SlotRegistry>, ledger: Arc<dyn BookingLedger>) -> Self {
        Self {
            registry,
            ledger,
            slot_locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn slot_lock(&self, slot_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.slot_locks.lock().await;
        locks
            .entry(slot_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Reserve a slot for `user`.
    ///
    /// The ledger insert happens before the registry flip: a partial failure
    /// between the two leaves an orphaned active ledger entry (detectable,
    /// reconcilable out of band) rather than an occupied slot with no record
    /// behind it (which would strand the slot).
    pub async fn reserve(
        &self,
        slot_id: Uuid,
        user: Uuid,
    ) -> Result<ReservationOutcome, BookingError> {
        let lock = self.slot_lock(slot_id).await;
        let _guard = lock.lock().await;

        let slot = self
            .registry
            .get_slot(slot_id)
            .await?
            .ok_or(BookingError::SlotNotFound)?;
        if slot.is_booked {
            return Err(BookingError::AlreadyBooked);
        }

        let snapshot = BookingSnapshot::of(&slot);
        let booking = self.ledger.create_active_booking(&snapshot, user).await?;
        self.registry.mark_occupied(slot_id, user, Utc::now()).await?;

        let view = self
            .registry
            .get_slot_view(slot_id)
            .await?
            .ok_or(BookingError::SlotNotFound)?;

        tracing::info!(%slot_id, %user, booking_id = %booking.id, "slot reserved");
        Ok(ReservationOutcome {
            slot: view,
            booking,
        })
    }

    /// Cancel the active booking on a slot. Only the occupant may cancel.
    ///
    /// A missing ledger entry does not block the slot-side release; the
    /// drift is logged for out-of-band reconciliation instead of failing the
    /// caller's request.
    pub async fn cancel(&self, slot_id: Uuid, requester: Uuid) -> Result<SlotView, BookingError> {
        let lock = self.slot_lock(slot_id).await;
        let _guard = lock.lock().await;

        let slot = self
            .registry
            .get_slot(slot_id)
            .await?
            .ok_or(BookingError::SlotNotFound)?;
        if !slot.is_booked {
            return Err(BookingError::NotBooked);
        }
        if slot.booked_by != Some(requester) {
            return Err(BookingError::NotOwner);
        }

        match self
            .ledger
            .find_active_booking_for_slot(slot_id, requester)
            .await?
        {
            Some(booking) => match self.ledger.cancel_booking(booking.id, Utc::now()).await {
                Ok(()) => {}
                Err(BookingError::BookingNotFound) => {
                    tracing::warn!(
                        %slot_id,
                        booking_id = %booking.id,
                        "active booking vanished before cancellation; releasing slot anyway"
                    );
                }
                Err(e) => return Err(e),
            },
            None => {
                tracing::warn!(
                    %slot_id,
                    %requester,
                    "occupied slot has no active ledger entry; releasing slot anyway"
                );
            }
        }

        self.registry.mark_free(slot_id).await?;

        let view = self
            .registry
            .get_slot_view(slot_id)
            .await?
            .ok_or(BookingError::SlotNotFound)?;

        tracing::info!(%slot_id, %requester, "booking cancelled");
        Ok(view)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::booking::{STATUS_ACTIVE, STATUS_CANCELLED};
    use crate::models::{BookingView, Slot, SlotFilter, UserSummary};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::Mutex as StdMutex;

    struct MemRegistry {
        slots: StdMutex<HashMap<Uuid, Slot>>,
    }

    impl MemRegistry {
        fn new() -> Self {
            Self {
                slots: StdMutex::new(HashMap::new()),
            }
        }

        fn insert(&self, slot: Slot) {
            self.slots.lock().unwrap().insert(slot.id, slot);
        }

        fn set_price(&self, id: Uuid, price: f64) {
            self.slots.lock().unwrap().get_mut(&id).unwrap().price = price;
        }

        fn snapshot(&self, id: Uuid) -> Slot {
            self.slots.lock().unwrap().get(&id).unwrap().clone()
        }
    }

    #[async_trait]
    impl SlotRegistry for MemRegistry {
        async fn list_slots(&self, filter: &SlotFilter) -> Result<Vec<SlotView>, BookingError> {
            let slots = self.slots.lock().unwrap();
            let mut views: Vec<SlotView> = slots
                .values()
                .filter(|s| filter.date.as_ref().map_or(true, |d| &s.date == d))
                .filter(|s| filter.court_name.as_ref().map_or(true, |c| &s.court_name == c))
                .filter(|s| !filter.available_only || !s.is_booked)
                .cloned()
                .map(|s| {
                    let occupant = s.booked_by.map(test_user_summary);
                    SlotView::from_slot(s, occupant)
                })
                .collect();
            views.sort_by(|a, b| (&a.date, &a.time_slot).cmp(&(&b.date, &b.time_slot)));
            Ok(views)
        }

        async fn get_slot(&self, id: Uuid) -> Result<Option<Slot>, BookingError> {
            Ok(self.slots.lock().unwrap().get(&id).cloned())
        }

        async fn get_slot_view(&self, id: Uuid) -> Result<Option<SlotView>, BookingError> {
            Ok(self.slots.lock().unwrap().get(&id).cloned().map(|s| {
                let occupant = s.booked_by.map(test_user_summary);
                SlotView::from_slot(s, occupant)
            }))
        }

        async fn mark_occupied(
            &self,
            id: Uuid,
            user: Uuid,
            at: DateTime<Utc>,
        ) -> Result<(), BookingError> {
            let mut slots = self.slots.lock().unwrap();
            let slot = slots.get_mut(&id).ok_or(BookingError::SlotNotFound)?;
            if slot.is_booked {
                return Err(BookingError::AlreadyBooked);
            }
            slot.is_booked = true;
            slot.booked_by = Some(user);
            slot.booked_at = Some(at);
            Ok(())
        }

        async fn mark_free(&self, id: Uuid) -> Result<(), BookingError> {
            let mut slots = self.slots.lock().unwrap();
            let slot = slots.get_mut(&id).ok_or(BookingError::SlotNotFound)?;
            slot.is_booked = false;
            slot.booked_by = None;
            slot.booked_at = None;
            Ok(())
        }
    }

    struct MemLedger {
        bookings: StdMutex<Vec<Booking>>,
    }

    impl MemLedger {
        fn new() -> Self {
            Self {
                bookings: StdMutex::new(Vec::new()),
            }
        }

        fn active_count_for_slot(&self, slot_id: Uuid) -> usize {
            self.bookings
                .lock()
                .unwrap()
                .iter()
                .filter(|b| b.slot_id == slot_id && b.is_active())
                .count()
        }

        fn all(&self) -> Vec<Booking> {
            self.bookings.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl BookingLedger for MemLedger {
        async fn create_active_booking(
            &self,
            snapshot: &BookingSnapshot,
            user: Uuid,
        ) -> Result<Booking, BookingError> {
            let booking = Booking {
                id: Uuid::new_v4(),
                slot_id: snapshot.slot_id,
                user_id: user,
                court_name: snapshot.court_name.clone(),
                date: snapshot.date.clone(),
                time_slot: snapshot.time_slot.clone(),
                price: snapshot.price,
                status: STATUS_ACTIVE.to_string(),
                booked_at: Utc::now(),
                cancelled_at: None,
            };
            self.bookings.lock().unwrap().push(booking.clone());
            Ok(booking)
        }

        async fn find_active_booking_for_slot(
            &self,
            slot_id: Uuid,
            user: Uuid,
        ) -> Result<Option<Booking>, BookingError> {
            Ok(self
                .bookings
                .lock()
                .unwrap()
                .iter()
                .find(|b| b.slot_id == slot_id && b.user_id == user && b.status == STATUS_ACTIVE)
                .cloned())
        }

        async fn cancel_booking(&self, id: Uuid, at: DateTime<Utc>) -> Result<(), BookingError> {
            let mut bookings = self.bookings.lock().unwrap();
            match bookings
                .iter_mut()
                .find(|b| b.id == id && b.status == STATUS_ACTIVE)
            {
                Some(b) => {
                    b.status = STATUS_CANCELLED.to_string();
                    b.cancelled_at = Some(at);
                    Ok(())
                }
                None => Err(BookingError::BookingNotFound),
            }
        }

        async fn list_active_bookings_for_user(
            &self,
            user: Uuid,
        ) -> Result<Vec<BookingView>, BookingError> {
            let mut views: Vec<BookingView> = self
                .bookings
                .lock()
                .unwrap()
                .iter()
                .filter(|b| b.user_id == user && b.status == STATUS_ACTIVE)
                .cloned()
                .map(|b| BookingView {
                    booking: b,
                    slot: None,
                })
                .collect();
            views.sort_by(|a, b| {
                (&a.booking.date, &a.booking.time_slot).cmp(&(&b.booking.date, &b.booking.time_slot))
            });
            Ok(views)
        }
    }

    fn test_user_summary(id: Uuid) -> UserSummary {
        UserSummary {
            id,
            name: "Test User".to_string(),
            email: "test@example.com".to_string(),
        }
    }

    fn court_a_slot() -> Slot {
        Slot {
            id: Uuid::new_v4(),
            court_name: "Court A - Indoor".to_string(),
            date: "2024-06-01".to_string(),
            time_slot: "06:00 - 07:00".to_string(),
            price: 800.0,
            is_booked: false,
            booked_by: None,
            booked_at: None,
        }
    }

    fn setup() -> (ReservationService, Arc<MemRegistry>, Arc<MemLedger>, Uuid) {
        let registry = Arc::new(MemRegistry::new());
        let ledger = Arc::new(MemLedger::new());
        let slot = court_a_slot();
        let slot_id = slot.id;
        registry.insert(slot);
        let service = ReservationService::new(registry.clone(), ledger.clone());
        (service, registry, ledger, slot_id)
    }

    #[tokio::test]
    async fn reserve_books_free_slot() {
        let (service, registry, ledger, slot_id) = setup();
        let user = Uuid::new_v4();

        let outcome = service.reserve(slot_id, user).await.unwrap();

        assert_eq!(outcome.booking.status, STATUS_ACTIVE);
        assert_eq!(outcome.booking.price, 800.0);
        assert_eq!(outcome.booking.court_name, "Court A - Indoor");
        assert!(outcome.slot.is_booked);
        assert_eq!(outcome.slot.booked_by.as_ref().map(|u| u.id), Some(user));

        assert_eq!(registry.snapshot(slot_id).booked_by, Some(user));
        assert_eq!(ledger.active_count_for_slot(slot_id), 1);
    }

    #[tokio::test]
    async fn reserve_rejects_occupied_slot() {
        let (service, registry, ledger, slot_id) = setup();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        service.reserve(slot_id, first).await.unwrap();
        let err = service.reserve(slot_id, second).await.unwrap_err();

        assert!(matches!(err, BookingError::AlreadyBooked));
        // The loser must not have mutated anything.
        assert_eq!(registry.snapshot(slot_id).booked_by, Some(first));
        assert_eq!(ledger.active_count_for_slot(slot_id), 1);
    }

    #[tokio::test]
    async fn reserve_unknown_slot_is_not_found() {
        let (service, _, _, _) = setup();
        let err = service
            .reserve(Uuid::new_v4(), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::SlotNotFound));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn concurrent_reserves_pick_exactly_one_winner() {
        let (service, registry, ledger, slot_id) = setup();

        let attempts = 16;
        let futures: Vec<_> = (0..attempts)
            .map(|_| {
                let service = service.clone();
                let user = Uuid::new_v4();
                tokio::spawn(async move { service.reserve(slot_id, user).await })
            })
            .collect();

        let results = futures::future::join_all(futures).await;
        let mut won = 0;
        let mut conflicts = 0;
        for result in results {
            match result.unwrap() {
                Ok(_) => won += 1,
                Err(BookingError::AlreadyBooked) => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }

        assert_eq!(won, 1);
        assert_eq!(conflicts, attempts - 1);
        // Exactly one active ledger entry, and the flag agrees with it.
        assert_eq!(ledger.active_count_for_slot(slot_id), 1);
        assert!(registry.snapshot(slot_id).is_booked);
    }

    #[tokio::test]
    async fn cancel_releases_slot_and_cancels_ledger_entry() {
        let (service, registry, ledger, slot_id) = setup();
        let user = Uuid::new_v4();

        service.reserve(slot_id, user).await.unwrap();
        let view = service.cancel(slot_id, user).await.unwrap();

        assert!(!view.is_booked);
        assert!(view.booked_by.is_none());
        let slot = registry.snapshot(slot_id);
        assert!(!slot.is_booked);
        assert!(slot.booked_at.is_none());

        let bookings = ledger.all();
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].status, STATUS_CANCELLED);
        assert!(bookings[0].cancelled_at.is_some());
    }

    #[tokio::test]
    async fn cancel_by_non_occupant_is_forbidden() {
        let (service, registry, ledger, slot_id) = setup();
        let owner = Uuid::new_v4();
        let intruder = Uuid::new_v4();

        service.reserve(slot_id, owner).await.unwrap();
        let err = service.cancel(slot_id, intruder).await.unwrap_err();

        assert!(matches!(err, BookingError::NotOwner));
        // Slot must remain occupied by the owner.
        assert_eq!(registry.snapshot(slot_id).booked_by, Some(owner));
        assert_eq!(ledger.active_count_for_slot(slot_id), 1);
    }

    #[tokio::test]
    async fn cancel_on_free_slot_is_rejected() {
        let (service, registry, ledger, slot_id) = setup();

        let err = service.cancel(slot_id, Uuid::new_v4()).await.unwrap_err();

        assert!(matches!(err, BookingError::NotBooked));
        assert!(!registry.snapshot(slot_id).is_booked);
        assert!(ledger.all().is_empty());
    }

    #[tokio::test]
    async fn cancel_after_cancel_is_rejected() {
        let (service, _, _, slot_id) = setup();
        let user = Uuid::new_v4();

        service.reserve(slot_id, user).await.unwrap();
        service.cancel(slot_id, user).await.unwrap();
        let err = service.cancel(slot_id, user).await.unwrap_err();

        assert!(matches!(err, BookingError::NotBooked));
    }

    #[tokio::test]
    async fn cancel_survives_missing_ledger_entry() {
        // Drift: slot occupied with no active ledger record. The slot-side
        // release must still go through.
        let (service, registry, ledger, slot_id) = setup();
        let user = Uuid::new_v4();
        registry
            .mark_occupied(slot_id, user, Utc::now())
            .await
            .unwrap();

        let view = service.cancel(slot_id, user).await.unwrap();

        assert!(!view.is_booked);
        assert!(ledger.all().is_empty());
    }

    #[tokio::test]
    async fn slot_can_be_rebooked_after_cancellation() {
        let (service, registry, ledger, slot_id) = setup();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        service.reserve(slot_id, first).await.unwrap();
        service.cancel(slot_id, first).await.unwrap();
        service.reserve(slot_id, second).await.unwrap();

        assert_eq!(registry.snapshot(slot_id).booked_by, Some(second));
        assert_eq!(ledger.active_count_for_slot(slot_id), 1);
        assert_eq!(ledger.all().len(), 2);
    }

    #[tokio::test]
    async fn booking_snapshot_keeps_price_at_reserve_time() {
        let (service, registry, ledger, slot_id) = setup();
        let user = Uuid::new_v4();

        service.reserve(slot_id, user).await.unwrap();
        registry.set_price(slot_id, 950.0);

        let bookings = ledger.list_active_bookings_for_user(user).await.unwrap();
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].booking.price, 800.0);
        // The slot itself reflects the new price.
        assert_eq!(registry.snapshot(slot_id).price, 950.0);
    }

    #[tokio::test]
    async fn flag_and_ledger_agree_after_mixed_sequence() {
        let (service, registry, ledger, slot_id) = setup();
        let users: Vec<Uuid> = (0..4).map(|_| Uuid::new_v4()).collect();

        service.reserve(slot_id, users[0]).await.unwrap();
        service.cancel(slot_id, users[0]).await.unwrap();
        service.reserve(slot_id, users[1]).await.unwrap();
        let _ = service.reserve(slot_id, users[2]).await;
        let _ = service.cancel(slot_id, users[3]).await;

        let slot = registry.snapshot(slot_id);
        let active = ledger.active_count_for_slot(slot_id);
        assert_eq!(slot.is_booked, active == 1);
        assert_eq!(active, 1);
        assert_eq!(slot.booked_by, Some(users[1]));
    }

    #[tokio::test]
    async fn list_slots_filters_and_orders() {
        let registry = Arc::new(MemRegistry::new());
        let ledger = Arc::new(MemLedger::new());

        let mut early = court_a_slot();
        early.time_slot = "06:00 - 07:00".to_string();
        let mut late = court_a_slot();
        late.time_slot = "18:00 - 19:00".to_string();
        let mut outdoor = court_a_slot();
        outdoor.court_name = "Court B - Outdoor".to_string();
        outdoor.time_slot = "06:00 - 07:00".to_string();

        let late_id = late.id;
        registry.insert(late);
        registry.insert(early);
        registry.insert(outdoor);

        let service = ReservationService::new(registry.clone(), ledger);
        service.reserve(late_id, Uuid::new_v4()).await.unwrap();

        let all = registry.list_slots(&SlotFilter::default()).await.unwrap();
        assert_eq!(all.len(), 3);
        assert!(all[0].time_slot <= all[1].time_slot);

        let available = registry
            .list_slots(&SlotFilter {
                available_only: true,
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(available.len(), 2);
        assert!(available.iter().all(|s| !s.is_booked));

        let indoor = registry
            .list_slots(&SlotFilter {
                court_name: Some("Court A - Indoor".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(indoor.len(), 2);
    }
}
