use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// An action an actor may perform on a reservation. Derived per
/// (reservation, actor) pair, never stored.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "kebab-case")]
pub enum ReservationAction {
    CheckIn,
    InitiateCheckOut,
    ForceCheckOut,
    ConfirmCheckOut,
    DenyCheckOut,
    Cancel,
}

impl ReservationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationAction::CheckIn => "check-in",
            ReservationAction::InitiateCheckOut => "initiate-check-out",
            ReservationAction::ForceCheckOut => "force-check-out",
            ReservationAction::ConfirmCheckOut => "confirm-check-out",
            ReservationAction::DenyCheckOut => "deny-check-out",
            ReservationAction::Cancel => "cancel",
        }
    }
}

impl fmt::Display for ReservationAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered so serialized action lists are deterministic.
pub type ActionSet = BTreeSet<ReservationAction>;
