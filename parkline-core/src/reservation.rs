use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A single reservation of a spot. Rows are never hard-deleted; terminal
/// reservations are retained for history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub spot_id: Uuid,
    pub status: ReservationStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub check_in_at: Option<DateTime<Utc>>,
    pub check_out_at: Option<DateTime<Utc>>,
}

impl Reservation {
    pub fn new(user_id: Uuid, spot_id: Uuid, now: DateTime<Utc>, ttl: Duration) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            spot_id,
            status: ReservationStatus::Pending,
            created_at: now,
            updated_at: now,
            expires_at: now + ttl,
            check_in_at: None,
            check_out_at: None,
        }
    }

    /// The "current reservation" predicate: not checked out, not past its
    /// expiry, and not in a terminal status. At most one reservation per
    /// user may satisfy this at any instant.
    pub fn is_current(&self, now: DateTime<Utc>) -> bool {
        self.check_out_at.is_none() && self.expires_at > now && !self.status.is_terminal()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ReservationStatus {
    Pending,
    Active,
    CheckOutInitiated,
    Completed,
    Canceled,
    Expired,
}

impl ReservationStatus {
    /// Terminal statuses admit no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Completed | ReservationStatus::Canceled | ReservationStatus::Expired
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "pending",
            ReservationStatus::Active => "active",
            ReservationStatus::CheckOutInitiated => "check-out-initiated",
            ReservationStatus::Completed => "completed",
            ReservationStatus::Canceled => "canceled",
            ReservationStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown reservation status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for ReservationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ReservationStatus::Pending),
            "active" => Ok(ReservationStatus::Active),
            "check-out-initiated" => Ok(ReservationStatus::CheckOutInitiated),
            "completed" => Ok(ReservationStatus::Completed),
            "canceled" => Ok(ReservationStatus::Canceled),
            "expired" => Ok(ReservationStatus::Expired),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(!ReservationStatus::Pending.is_terminal());
        assert!(!ReservationStatus::Active.is_terminal());
        assert!(!ReservationStatus::CheckOutInitiated.is_terminal());
        assert!(ReservationStatus::Completed.is_terminal());
        assert!(ReservationStatus::Canceled.is_terminal());
        assert!(ReservationStatus::Expired.is_terminal());
    }

    #[test]
    fn test_status_round_trips_through_str() {
        for status in [
            ReservationStatus::Pending,
            ReservationStatus::Active,
            ReservationStatus::CheckOutInitiated,
            ReservationStatus::Completed,
            ReservationStatus::Canceled,
            ReservationStatus::Expired,
        ] {
            assert_eq!(status.as_str().parse::<ReservationStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_current_predicate() {
        let now = Utc::now();
        let mut reservation =
            Reservation::new(Uuid::new_v4(), Uuid::new_v4(), now, Duration::hours(24));

        assert!(reservation.is_current(now));

        // Past its expiry it is no longer current even while pending.
        assert!(!reservation.is_current(now + Duration::hours(25)));

        // A checked-out reservation is never current.
        reservation.check_out_at = Some(now);
        assert!(!reservation.is_current(now));
        reservation.check_out_at = None;

        reservation.status = ReservationStatus::Canceled;
        assert!(!reservation.is_current(now));
    }

    #[test]
    fn test_wire_field_names_are_camel_case() {
        let now = Utc::now();
        let reservation =
            Reservation::new(Uuid::new_v4(), Uuid::new_v4(), now, Duration::hours(24));

        let json = serde_json::to_value(&reservation).unwrap();
        assert!(json.get("userId").is_some());
        assert!(json.get("spotId").is_some());
        assert!(json.get("expiresAt").is_some());
        assert_eq!(json["status"], "pending");
        assert_eq!(json["checkInAt"], serde_json::Value::Null);
    }
}
