use crate::ledger::{LedgerError, ReservationLedger};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Periodic task that expires overdue pending reservations. Runs on its own
/// timer, concurrently with request handlers, and talks to the ledger only
/// through its public operations.
pub struct ExpirationSweeper {
    ledger: Arc<ReservationLedger>,
    interval: Duration,
}

impl ExpirationSweeper {
    pub fn new(ledger: Arc<ReservationLedger>) -> Self {
        Self {
            ledger,
            interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub async fn run(self) {
        info!(interval_secs = self.interval.as_secs(), "expiration sweeper started");
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            ticker.tick().await;
            match self.sweep_once().await {
                Ok(0) => {}
                Ok(expired) => info!(expired, "expiration sweep complete"),
                Err(err) => error!(%err, "expiration sweep failed"),
            }
        }
    }

    /// One sweep pass. Each overdue reservation is expired independently; a
    /// failure on one is logged and does not abort the batch. Losing the
    /// status-guard race to another actor counts as already handled.
    pub async fn sweep_once(&self) -> Result<usize, LedgerError> {
        let overdue = self.ledger.overdue_reservations(Utc::now()).await?;
        let mut expired = 0;
        for reservation in overdue {
            match self.ledger.expire_reservation(reservation.id).await {
                Ok(_) => expired += 1,
                Err(LedgerError::InvalidTransition { .. }) | Err(LedgerError::NotFound(_)) => {}
                Err(err) => {
                    error!(reservation_id = %reservation.id, %err, "failed to expire reservation");
                }
            }
        }
        Ok(expired)
    }
}
