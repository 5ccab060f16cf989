use crate::events::{EventPublisher, PublishError, ReservationEvent};
use crate::lot::{Lot, Spot};
use crate::repository::{
    LotRepository, ReservationRepository, SpotRepository, StoreResult, TransitionChange,
};
use crate::reservation::Reservation;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// In-memory lot/spot registry store. The mutex is the serialization point
/// that gives claim and release the same conditional-write semantics the
/// SQL store gets from a conditional UPDATE.
#[derive(Default)]
pub struct MemoryRegistry {
    inner: Mutex<RegistryState>,
}

#[derive(Default)]
struct RegistryState {
    lots: HashMap<Uuid, Lot>,
    spots: HashMap<Uuid, Spot>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_lot(&self, lot: Lot) {
        self.inner.lock().unwrap().lots.insert(lot.id, lot);
    }

    pub fn insert_spot(&self, spot: Spot) {
        self.inner.lock().unwrap().spots.insert(spot.id, spot);
    }

    pub fn available_count(&self, lot_id: Uuid) -> usize {
        self.inner
            .lock()
            .unwrap()
            .spots
            .values()
            .filter(|s| s.lot_id == lot_id && s.is_available)
            .count()
    }
}

#[async_trait]
impl SpotRepository for MemoryRegistry {
    async fn claim_lowest_available(&self, lot_id: Uuid) -> StoreResult<Option<Uuid>> {
        let mut state = self.inner.lock().unwrap();
        let claimed = state
            .spots
            .values()
            .filter(|s| s.lot_id == lot_id && s.is_available)
            .map(|s| s.id)
            .min();
        if let Some(id) = claimed {
            if let Some(spot) = state.spots.get_mut(&id) {
                spot.is_available = false;
            }
        }
        Ok(claimed)
    }

    async fn release(&self, spot_id: Uuid) -> StoreResult<()> {
        if let Some(spot) = self.inner.lock().unwrap().spots.get_mut(&spot_id) {
            spot.is_available = true;
        }
        Ok(())
    }

    async fn get_spot(&self, spot_id: Uuid) -> StoreResult<Option<Spot>> {
        Ok(self.inner.lock().unwrap().spots.get(&spot_id).cloned())
    }
}

#[async_trait]
impl LotRepository for MemoryRegistry {
    async fn get_lot(&self, lot_id: Uuid) -> StoreResult<Option<Lot>> {
        Ok(self.inner.lock().unwrap().lots.get(&lot_id).cloned())
    }
}

/// In-memory reservation ledger store with compare-and-swap transitions.
#[derive(Default)]
pub struct MemoryReservations {
    inner: Mutex<HashMap<Uuid, Reservation>>,
}

impl MemoryReservations {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReservationRepository for MemoryReservations {
    async fn insert_if_no_current(
        &self,
        reservation: &Reservation,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut map = self.inner.lock().unwrap();
        let conflict = map
            .values()
            .any(|r| r.user_id == reservation.user_id && r.is_current(now));
        if conflict {
            return Ok(false);
        }
        map.insert(reservation.id, reservation.clone());
        Ok(true)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Reservation>> {
        Ok(self.inner.lock().unwrap().get(&id).cloned())
    }

    async fn find_current_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Reservation>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .values()
            .find(|r| r.user_id == user_id && r.is_current(now))
            .cloned())
    }

    async fn find_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Reservation>> {
        let mut found: Vec<Reservation> = self
            .inner
            .lock()
            .unwrap()
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        found.sort_by_key(|r| r.created_at);
        Ok(found)
    }

    async fn find_on_spots(&self, spot_ids: &[Uuid]) -> StoreResult<Vec<Reservation>> {
        let mut found: Vec<Reservation> = self
            .inner
            .lock()
            .unwrap()
            .values()
            .filter(|r| spot_ids.contains(&r.spot_id))
            .cloned()
            .collect();
        found.sort_by_key(|r| r.created_at);
        Ok(found)
    }

    async fn find_expired_pending(&self, now: DateTime<Utc>) -> StoreResult<Vec<Reservation>> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .values()
            .filter(|r| {
                r.status == crate::reservation::ReservationStatus::Pending
                    && r.check_out_at.is_none()
                    && r.expires_at < now
            })
            .cloned()
            .collect())
    }

    async fn apply_transition(
        &self,
        id: Uuid,
        expected: &[crate::reservation::ReservationStatus],
        change: TransitionChange,
    ) -> StoreResult<Option<Reservation>> {
        let mut map = self.inner.lock().unwrap();
        match map.get_mut(&id) {
            Some(reservation) if expected.contains(&reservation.status) => {
                reservation.status = change.status;
                if change.check_in_at.is_some() {
                    reservation.check_in_at = change.check_in_at;
                }
                if change.check_out_at.is_some() {
                    reservation.check_out_at = change.check_out_at;
                }
                reservation.updated_at = change.updated_at;
                Ok(Some(reservation.clone()))
            }
            _ => Ok(None),
        }
    }
}

/// Records published events in order. Used as the bus in tests and as a
/// stand-in sink when no broker is wired.
#[derive(Default)]
pub struct MemoryEventSink {
    events: Mutex<Vec<ReservationEvent>>,
}

impl MemoryEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<ReservationEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn topics(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.topic()).collect()
    }
}

#[async_trait]
impl EventPublisher for MemoryEventSink {
    async fn publish(&self, event: &ReservationEvent) -> Result<(), PublishError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}
