use crate::lot::{Lot, Spot};
use crate::reservation::{Reservation, ReservationStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Infrastructure fault at the persistence boundary. Business-rule outcomes
/// (no spot, guard mismatch) are modeled in the return types, not here.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Spot availability state, owned by the lot/spot registry context.
#[async_trait]
pub trait SpotRepository: Send + Sync {
    /// Atomically claims the lowest-id available spot in the lot, flipping
    /// it unavailable in the same operation. Two concurrent callers must
    /// never receive the same spot. `None` means the lot has no capacity;
    /// that is a normal outcome, not an error.
    async fn claim_lowest_available(&self, lot_id: Uuid) -> StoreResult<Option<Uuid>>;

    /// Marks the spot available again. Idempotent: releasing an already
    /// available spot is a no-op, since compensation and sweeper paths race.
    async fn release(&self, spot_id: Uuid) -> StoreResult<()>;

    async fn get_spot(&self, spot_id: Uuid) -> StoreResult<Option<Spot>>;
}

#[async_trait]
pub trait LotRepository: Send + Sync {
    async fn get_lot(&self, lot_id: Uuid) -> StoreResult<Option<Lot>>;
}

/// Field changes applied together with a status transition. `check_in_at`
/// and `check_out_at` are set when `Some`, left untouched when `None`.
#[derive(Debug, Clone)]
pub struct TransitionChange {
    pub status: ReservationStatus,
    pub check_in_at: Option<DateTime<Utc>>,
    pub check_out_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl TransitionChange {
    pub fn to_status(status: ReservationStatus, now: DateTime<Utc>) -> Self {
        Self {
            status,
            check_in_at: None,
            check_out_at: None,
            updated_at: now,
        }
    }
}

/// The reservation ledger's persistence contract. All mutations are
/// conditional writes so concurrent actors racing the same reservation
/// produce exactly one winner.
#[async_trait]
pub trait ReservationRepository: Send + Sync {
    /// Inserts the reservation only if the user has no current reservation
    /// at `now`. Returns `false` when the insert was rejected. This is the
    /// authoritative per-user exclusivity guard under concurrency.
    async fn insert_if_no_current(
        &self,
        reservation: &Reservation,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Reservation>>;

    async fn find_current_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Reservation>>;

    async fn find_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Reservation>>;

    async fn find_on_spots(&self, spot_ids: &[Uuid]) -> StoreResult<Vec<Reservation>>;

    /// Pending reservations past their expiry, never checked out. Input to
    /// the expiration sweep.
    async fn find_expired_pending(&self, now: DateTime<Utc>) -> StoreResult<Vec<Reservation>>;

    /// Compare-and-swap on status: applies `change` only while the current
    /// status is one of `expected`, returning the post-update snapshot.
    /// `None` means the guard did not match (unknown id or stale status).
    async fn apply_transition(
        &self,
        id: Uuid,
        expected: &[ReservationStatus],
        change: TransitionChange,
    ) -> StoreResult<Option<Reservation>>;
}
