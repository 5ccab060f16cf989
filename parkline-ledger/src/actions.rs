use parkline_core::{ActionSet, Lot, Reservation, ReservationAction, ReservationStatus};
use uuid::Uuid;

/// Computes the set of actions `actor_user_id` may perform on the
/// reservation. Pure function of the reservation status, whether the actor
/// made the reservation, and whether the actor owns the lot. The same table
/// authorizes top-level `cancel` requests, so the two cannot drift apart.
pub fn actions_for(reservation: &Reservation, lot: &Lot, actor_user_id: Uuid) -> ActionSet {
    let made_reservation = reservation.user_id == actor_user_id;
    let owns_lot = lot.owner_id == actor_user_id;

    let mut actions = ActionSet::new();
    match reservation.status {
        ReservationStatus::Pending => {
            if made_reservation {
                actions.insert(ReservationAction::CheckIn);
                actions.insert(ReservationAction::Cancel);
            } else if owns_lot {
                actions.insert(ReservationAction::Cancel);
            }
        }
        ReservationStatus::CheckOutInitiated => {
            if owns_lot {
                actions.insert(ReservationAction::ConfirmCheckOut);
                actions.insert(ReservationAction::DenyCheckOut);
            }
        }
        ReservationStatus::Active => {
            if made_reservation {
                actions.insert(ReservationAction::InitiateCheckOut);
            } else if owns_lot {
                actions.insert(ReservationAction::ForceCheckOut);
            }
        }
        ReservationStatus::Completed | ReservationStatus::Canceled | ReservationStatus::Expired => {}
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use parkline_core::GeoPoint;

    struct Actors {
        driver: Uuid,
        lot_owner: Uuid,
        stranger: Uuid,
    }

    fn fixture(status: ReservationStatus) -> (Reservation, Lot, Actors) {
        let actors = Actors {
            driver: Uuid::new_v4(),
            lot_owner: Uuid::new_v4(),
            stranger: Uuid::new_v4(),
        };
        let lot = Lot {
            id: Uuid::new_v4(),
            owner_id: actors.lot_owner,
            name: "Pier lot".to_string(),
            address: "2 Pier Ave".to_string(),
            location: GeoPoint {
                latitude: 0.0,
                longitude: 0.0,
            },
        };
        let mut reservation =
            Reservation::new(actors.driver, Uuid::new_v4(), Utc::now(), Duration::hours(24));
        reservation.status = status;
        (reservation, lot, actors)
    }

    fn set(actions: &[ReservationAction]) -> ActionSet {
        actions.iter().copied().collect()
    }

    #[test]
    fn test_pending_actions() {
        let (reservation, lot, actors) = fixture(ReservationStatus::Pending);

        assert_eq!(
            actions_for(&reservation, &lot, actors.driver),
            set(&[ReservationAction::CheckIn, ReservationAction::Cancel])
        );
        assert_eq!(
            actions_for(&reservation, &lot, actors.lot_owner),
            set(&[ReservationAction::Cancel])
        );
        assert!(actions_for(&reservation, &lot, actors.stranger).is_empty());
    }

    #[test]
    fn test_active_actions() {
        let (reservation, lot, actors) = fixture(ReservationStatus::Active);

        assert_eq!(
            actions_for(&reservation, &lot, actors.driver),
            set(&[ReservationAction::InitiateCheckOut])
        );
        assert_eq!(
            actions_for(&reservation, &lot, actors.lot_owner),
            set(&[ReservationAction::ForceCheckOut])
        );
        assert!(actions_for(&reservation, &lot, actors.stranger).is_empty());
    }

    #[test]
    fn test_check_out_initiated_actions() {
        let (reservation, lot, actors) = fixture(ReservationStatus::CheckOutInitiated);

        // The driver has nothing to do but wait; the lot owner arbitrates.
        assert!(actions_for(&reservation, &lot, actors.driver).is_empty());
        assert_eq!(
            actions_for(&reservation, &lot, actors.lot_owner),
            set(&[
                ReservationAction::ConfirmCheckOut,
                ReservationAction::DenyCheckOut
            ])
        );
    }

    #[test]
    fn test_terminal_statuses_offer_nothing() {
        for status in [
            ReservationStatus::Completed,
            ReservationStatus::Canceled,
            ReservationStatus::Expired,
        ] {
            let (reservation, lot, actors) = fixture(status);
            assert!(actions_for(&reservation, &lot, actors.driver).is_empty());
            assert!(actions_for(&reservation, &lot, actors.lot_owner).is_empty());
        }
    }
}
