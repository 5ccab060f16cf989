use crate::reservation::Reservation;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Domain events emitted on every accepted transition. Each carries a full
/// reservation snapshot; consumers dedupe on `id` + `updatedAt` since
/// delivery is at-least-once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event", content = "reservation", rename_all = "snake_case")]
pub enum ReservationEvent {
    ReservationCreated(Reservation),
    ReservationUpdated(Reservation),
    ReservationCompleted(Reservation),
    ReservationCanceled(Reservation),
    ReservationExpired(Reservation),
}

impl ReservationEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            ReservationEvent::ReservationCreated(_) => "reservation_created",
            ReservationEvent::ReservationUpdated(_) => "reservation_updated",
            ReservationEvent::ReservationCompleted(_) => "reservation_completed",
            ReservationEvent::ReservationCanceled(_) => "reservation_canceled",
            ReservationEvent::ReservationExpired(_) => "reservation_expired",
        }
    }

    pub fn reservation(&self) -> &Reservation {
        match self {
            ReservationEvent::ReservationCreated(r)
            | ReservationEvent::ReservationUpdated(r)
            | ReservationEvent::ReservationCompleted(r)
            | ReservationEvent::ReservationCanceled(r)
            | ReservationEvent::ReservationExpired(r) => r,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("event publish failed: {0}")]
pub struct PublishError(pub String);

/// Fire-and-forget emission to the event bus. Implementations are expected
/// to be at-least-once; delivery order per reservation follows the order
/// publish is called in.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &ReservationEvent) -> Result<(), PublishError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use uuid::Uuid;

    #[test]
    fn test_topic_names() {
        let reservation =
            Reservation::new(Uuid::new_v4(), Uuid::new_v4(), Utc::now(), Duration::hours(24));

        assert_eq!(
            ReservationEvent::ReservationCreated(reservation.clone()).topic(),
            "reservation_created"
        );
        assert_eq!(
            ReservationEvent::ReservationExpired(reservation).topic(),
            "reservation_expired"
        );
    }

    #[test]
    fn test_payload_carries_snapshot() {
        let reservation =
            Reservation::new(Uuid::new_v4(), Uuid::new_v4(), Utc::now(), Duration::hours(24));
        let event = ReservationEvent::ReservationUpdated(reservation.clone());

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "reservation_updated");
        assert_eq!(json["reservation"]["id"], reservation.id.to_string());
    }
}
