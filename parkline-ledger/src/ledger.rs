use crate::actions;
use crate::workflow::ClaimedSpot;
use chrono::{DateTime, Duration, Utc};
use parkline_core::{
    ActionSet, EventPublisher, Reservation, ReservationAction, ReservationEvent,
    ReservationRepository, ReservationStatus, StoreError, TransitionChange,
};
use parkline_registry::SpotRegistry;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

pub const DEFAULT_RESERVATION_TTL_HOURS: i64 = 24;

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("no spot available in lot {0}")]
    NoSpotAvailable(Uuid),

    #[error("user {0} already has a current reservation")]
    AlreadyHasCurrentReservation(Uuid),

    #[error("user {0} has no current reservation")]
    NoCurrentReservation(Uuid),

    #[error("cannot {action} a reservation in status {from}")]
    InvalidTransition {
        from: ReservationStatus,
        action: &'static str,
    },

    #[error("reservation {0} not found")]
    NotFound(Uuid),

    #[error("user {user_id} may not {action} reservation {reservation_id}")]
    Forbidden {
        user_id: Uuid,
        action: ReservationAction,
        reservation_id: Uuid,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// The Reservation Ledger: owns reservation records and drives the
/// multi-actor state machine. Every transition is a conditional write keyed
/// on the expected prior status, so concurrent duplicates lose the race and
/// get `InvalidTransition` instead of double-applying. Events are published
/// only after the store accepts a transition, in store-acceptance order.
pub struct ReservationLedger {
    reservations: Arc<dyn ReservationRepository>,
    registry: Arc<SpotRegistry>,
    publisher: Arc<dyn EventPublisher>,
    reservation_ttl: Duration,
}

impl ReservationLedger {
    pub fn new(
        reservations: Arc<dyn ReservationRepository>,
        registry: Arc<SpotRegistry>,
        publisher: Arc<dyn EventPublisher>,
    ) -> Self {
        Self {
            reservations,
            registry,
            publisher,
            reservation_ttl: Duration::hours(DEFAULT_RESERVATION_TTL_HOURS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.reservation_ttl = ttl;
        self
    }

    /// Creates a pending reservation on an available spot in the lot.
    ///
    /// Claim-before-create: the spot claim and the reservation insert live
    /// in different stores, so the claim is taken first and released again
    /// if the insert does not go through. The per-user pre-check runs
    /// before the claim to avoid occupying a spot for a doomed request; the
    /// conditional insert is the authoritative guard under concurrency.
    pub async fn create_reservation(
        &self,
        user_id: Uuid,
        lot_id: Uuid,
    ) -> Result<Reservation, LedgerError> {
        let now = Utc::now();

        if self
            .reservations
            .find_current_for_user(user_id, now)
            .await?
            .is_some()
        {
            return Err(LedgerError::AlreadyHasCurrentReservation(user_id));
        }

        let claim = match ClaimedSpot::claim(&self.registry, lot_id).await? {
            Some(claim) => claim,
            None => return Err(LedgerError::NoSpotAvailable(lot_id)),
        };

        let reservation = Reservation::new(user_id, claim.spot_id(), now, self.reservation_ttl);
        match self.reservations.insert_if_no_current(&reservation, now).await {
            Ok(true) => {
                claim.commit();
                info!(reservation_id = %reservation.id, %user_id, %lot_id, "reservation created");
                self.publish(ReservationEvent::ReservationCreated(reservation.clone()))
                    .await;
                Ok(reservation)
            }
            Ok(false) => {
                claim.compensate().await;
                Err(LedgerError::AlreadyHasCurrentReservation(user_id))
            }
            Err(err) => {
                claim.compensate().await;
                Err(err.into())
            }
        }
    }

    pub async fn get_reservation(&self, id: Uuid) -> Result<Option<Reservation>, LedgerError> {
        Ok(self.reservations.find_by_id(id).await?)
    }

    pub async fn current_reservation(
        &self,
        user_id: Uuid,
    ) -> Result<Option<Reservation>, LedgerError> {
        Ok(self
            .reservations
            .find_current_for_user(user_id, Utc::now())
            .await?)
    }

    pub async fn reservations_for_user(&self, user_id: Uuid) -> Result<Vec<Reservation>, LedgerError> {
        Ok(self.reservations.find_for_user(user_id).await?)
    }

    pub async fn reservations_on_spots(
        &self,
        spot_ids: &[Uuid],
    ) -> Result<Vec<Reservation>, LedgerError> {
        Ok(self.reservations.find_on_spots(spot_ids).await?)
    }

    /// Pending reservations past their expiry. Consumed by the sweeper.
    pub async fn overdue_reservations(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reservation>, LedgerError> {
        Ok(self.reservations.find_expired_pending(now).await?)
    }

    /// pending → active, stamping the check-in time.
    pub async fn check_in(&self, id: Uuid) -> Result<Reservation, LedgerError> {
        let now = Utc::now();
        let updated = self
            .transition(
                id,
                "check-in",
                &[ReservationStatus::Pending],
                TransitionChange {
                    status: ReservationStatus::Active,
                    check_in_at: Some(now),
                    check_out_at: None,
                    updated_at: now,
                },
            )
            .await?;
        self.publish(ReservationEvent::ReservationUpdated(updated.clone()))
            .await;
        Ok(updated)
    }

    /// active → check-out-initiated. The lot owner confirms or denies.
    pub async fn initiate_check_out(&self, id: Uuid) -> Result<Reservation, LedgerError> {
        let updated = self
            .transition(
                id,
                "initiate-check-out",
                &[ReservationStatus::Active],
                TransitionChange::to_status(ReservationStatus::CheckOutInitiated, Utc::now()),
            )
            .await?;
        self.publish(ReservationEvent::ReservationUpdated(updated.clone()))
            .await;
        Ok(updated)
    }

    /// check-out-initiated → completed; releases the spot.
    pub async fn confirm_check_out(&self, id: Uuid) -> Result<Reservation, LedgerError> {
        let updated = self
            .transition(
                id,
                "confirm-check-out",
                &[ReservationStatus::CheckOutInitiated],
                TransitionChange::to_status(ReservationStatus::Completed, Utc::now()),
            )
            .await?;
        self.release_for(&updated).await;
        self.publish(ReservationEvent::ReservationCompleted(updated.clone()))
            .await;
        self.publish(ReservationEvent::ReservationUpdated(updated.clone()))
            .await;
        Ok(updated)
    }

    /// check-out-initiated → active: the lot owner rejects the check-out.
    pub async fn deny_check_out(&self, id: Uuid) -> Result<Reservation, LedgerError> {
        let updated = self
            .transition(
                id,
                "deny-check-out",
                &[ReservationStatus::CheckOutInitiated],
                TransitionChange::to_status(ReservationStatus::Active, Utc::now()),
            )
            .await?;
        self.publish(ReservationEvent::ReservationUpdated(updated.clone()))
            .await;
        Ok(updated)
    }

    /// Lot-owner escape hatch: completes the reservation from `active` or
    /// `check-out-initiated` (the latter so a force issued while the driver
    /// initiates check-out concurrently still lands), stamping the
    /// check-out time and releasing the spot.
    pub async fn force_check_out(&self, id: Uuid) -> Result<Reservation, LedgerError> {
        let now = Utc::now();
        let updated = self
            .transition(
                id,
                "force-check-out",
                &[
                    ReservationStatus::Active,
                    ReservationStatus::CheckOutInitiated,
                ],
                TransitionChange {
                    status: ReservationStatus::Completed,
                    check_in_at: None,
                    check_out_at: Some(now),
                    updated_at: now,
                },
            )
            .await?;
        self.release_for(&updated).await;
        self.publish(ReservationEvent::ReservationCompleted(updated.clone()))
            .await;
        self.publish(ReservationEvent::ReservationUpdated(updated.clone()))
            .await;
        Ok(updated)
    }

    /// Cancels a pending reservation on behalf of `actor_user_id`. The
    /// action table is re-derived here, so only the reservation owner or
    /// the lot owner gets through.
    pub async fn cancel(&self, id: Uuid, actor_user_id: Uuid) -> Result<Reservation, LedgerError> {
        let allowed = self.actions_for(id, actor_user_id).await?;
        if !allowed.contains(&ReservationAction::Cancel) {
            if self.reservations.find_by_id(id).await?.is_none() {
                return Err(LedgerError::NotFound(id));
            }
            return Err(LedgerError::Forbidden {
                user_id: actor_user_id,
                action: ReservationAction::Cancel,
                reservation_id: id,
            });
        }
        self.cancel_reservation(id).await
    }

    pub async fn cancel_current(&self, user_id: Uuid) -> Result<Reservation, LedgerError> {
        let current = self.require_current(user_id).await?;
        self.cancel_reservation(current.id).await
    }

    pub async fn check_in_current(&self, user_id: Uuid) -> Result<Reservation, LedgerError> {
        let current = self.require_current(user_id).await?;
        self.check_in(current.id).await
    }

    pub async fn initiate_check_out_current(
        &self,
        user_id: Uuid,
    ) -> Result<Reservation, LedgerError> {
        let current = self.require_current(user_id).await?;
        if current.status != ReservationStatus::Active {
            return Err(LedgerError::InvalidTransition {
                from: current.status,
                action: "initiate-check-out",
            });
        }
        self.initiate_check_out(current.id).await
    }

    /// pending → expired; applied by the sweeper. Idempotent through the
    /// status guard: a reservation already out of `pending` is rejected.
    pub async fn expire_reservation(&self, id: Uuid) -> Result<Reservation, LedgerError> {
        let updated = self
            .transition(
                id,
                "expire",
                &[ReservationStatus::Pending],
                TransitionChange::to_status(ReservationStatus::Expired, Utc::now()),
            )
            .await?;
        self.release_for(&updated).await;
        self.publish(ReservationEvent::ReservationExpired(updated.clone()))
            .await;
        self.publish(ReservationEvent::ReservationUpdated(updated.clone()))
            .await;
        Ok(updated)
    }

    /// Actions `user_id` may perform on the reservation. Empty when the
    /// reservation or its lot cannot be resolved.
    pub async fn actions_for(&self, id: Uuid, user_id: Uuid) -> Result<ActionSet, LedgerError> {
        let reservation = match self.reservations.find_by_id(id).await? {
            Some(reservation) => reservation,
            None => return Ok(ActionSet::new()),
        };
        let lot = match self.registry.lot_of_spot(reservation.spot_id).await? {
            Some(lot) => lot,
            None => return Ok(ActionSet::new()),
        };
        Ok(actions::actions_for(&reservation, &lot, user_id))
    }

    async fn cancel_reservation(&self, id: Uuid) -> Result<Reservation, LedgerError> {
        let updated = self
            .transition(
                id,
                "cancel",
                &[ReservationStatus::Pending],
                TransitionChange::to_status(ReservationStatus::Canceled, Utc::now()),
            )
            .await?;
        self.release_for(&updated).await;
        self.publish(ReservationEvent::ReservationCanceled(updated.clone()))
            .await;
        self.publish(ReservationEvent::ReservationUpdated(updated.clone()))
            .await;
        Ok(updated)
    }

    async fn require_current(&self, user_id: Uuid) -> Result<Reservation, LedgerError> {
        self.reservations
            .find_current_for_user(user_id, Utc::now())
            .await?
            .ok_or(LedgerError::NoCurrentReservation(user_id))
    }

    /// Applies a guarded transition; a failed guard is mapped to
    /// `InvalidTransition` (id known, stale status) or `NotFound`. Nothing
    /// is published on a rejected transition.
    async fn transition(
        &self,
        id: Uuid,
        action: &'static str,
        expected: &[ReservationStatus],
        change: TransitionChange,
    ) -> Result<Reservation, LedgerError> {
        match self.reservations.apply_transition(id, expected, change).await? {
            Some(updated) => Ok(updated),
            None => match self.reservations.find_by_id(id).await? {
                Some(stale) => Err(LedgerError::InvalidTransition {
                    from: stale.status,
                    action,
                }),
                None => Err(LedgerError::NotFound(id)),
            },
        }
    }

    /// Terminal transitions hand the spot back. A failed release is logged
    /// loudly rather than failing the already-accepted transition; release
    /// is idempotent, so a later compensation pass can retry it.
    async fn release_for(&self, reservation: &Reservation) {
        if let Err(err) = self.registry.release_spot(reservation.spot_id).await {
            error!(
                reservation_id = %reservation.id,
                spot_id = %reservation.spot_id,
                %err,
                "failed to release spot after terminal transition"
            );
        }
    }

    async fn publish(&self, event: ReservationEvent) {
        if let Err(err) = self.publisher.publish(&event).await {
            warn!(topic = event.topic(), %err, "event publish failed");
        }
    }
}
