pub mod actions;
pub mod ledger;
pub mod sweeper;
mod workflow;

pub use actions::actions_for;
pub use ledger::{LedgerError, ReservationLedger};
pub use sweeper::ExpirationSweeper;
