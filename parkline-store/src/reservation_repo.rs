use crate::retry::{decode_err, with_retry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parkline_core::reservation::{Reservation, ReservationStatus};
use parkline_core::{ReservationRepository, StoreResult, TransitionChange};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

const RESERVATION_COLUMNS: &str =
    "id, user_id, spot_id, status, created_at, updated_at, expires_at, check_in_at, check_out_at";

/// Postgres-backed reservation ledger store. Transitions are conditional
/// UPDATEs guarded on both id and expected status, which makes the database
/// the serialization point for racing actors; inserts serialize per user on
/// a transaction-scoped advisory lock so the current-reservation guard
/// always sees the latest committed row.
pub struct StoreReservationRepository {
    pool: PgPool,
}

impl StoreReservationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Advisory lock key for a user's reservation inserts. Folds the uuid into
/// the bigint keyspace `pg_advisory_xact_lock` takes.
fn user_lock_key(user_id: Uuid) -> i64 {
    let n = user_id.as_u128();
    let hi = (n >> 64) as u64;
    let lo = n as u64;
    (hi.wrapping_mul(0x9e37_79b9_7f4a_7c15) ^ lo) as i64
}

fn row_to_reservation(row: &PgRow) -> Result<Reservation, sqlx::Error> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<ReservationStatus>()
        .map_err(|err| sqlx::Error::Decode(Box::new(err)))?;

    Ok(Reservation {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        spot_id: row.try_get("spot_id")?,
        status,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        expires_at: row.try_get("expires_at")?,
        check_in_at: row.try_get("check_in_at")?,
        check_out_at: row.try_get("check_out_at")?,
    })
}

fn rows_to_reservations(rows: Vec<PgRow>) -> StoreResult<Vec<Reservation>> {
    rows.iter()
        .map(|row| row_to_reservation(row).map_err(decode_err))
        .collect()
}

#[async_trait]
impl ReservationRepository for StoreReservationRepository {
    async fn insert_if_no_current(
        &self,
        reservation: &Reservation,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        // The NOT EXISTS clause is the current-reservation predicate. Under
        // READ COMMITTED two racing inserts for the same user would each
        // miss the other's uncommitted row, so the guard runs inside a
        // transaction that first takes a per-user advisory lock; the loser
        // blocks until the winner commits and then sees its row.
        let sql = r#"
INSERT INTO reservation
    (id, user_id, spot_id, status, created_at, updated_at, expires_at, check_in_at, check_out_at)
SELECT $1, $2, $3, $4, $5, $6, $7, NULL, NULL
WHERE NOT EXISTS (
    SELECT 1 FROM reservation
    WHERE user_id = $2
      AND check_out_at IS NULL
      AND expires_at > $8
      AND status NOT IN ('completed', 'canceled', 'expired')
)
"#;
        let reservation = reservation.clone();
        let lock_key = user_lock_key(reservation.user_id);
        let result = with_retry("insert_reservation", || {
            let pool = self.pool.clone();
            let r = reservation.clone();
            async move {
                let mut tx = pool.begin().await?;
                sqlx::query("SELECT pg_advisory_xact_lock($1)")
                    .bind(lock_key)
                    .execute(&mut *tx)
                    .await?;
                let result = sqlx::query(sql)
                    .bind(r.id)
                    .bind(r.user_id)
                    .bind(r.spot_id)
                    .bind(r.status.as_str())
                    .bind(r.created_at)
                    .bind(r.updated_at)
                    .bind(r.expires_at)
                    .bind(now)
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;
                Ok(result)
            }
        })
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn find_by_id(&self, id: Uuid) -> StoreResult<Option<Reservation>> {
        let sql = format!("SELECT {RESERVATION_COLUMNS} FROM reservation WHERE id = $1");
        let row = with_retry("find_reservation", || {
            let pool = self.pool.clone();
            let sql = sql.clone();
            async move { sqlx::query(&sql).bind(id).fetch_optional(&pool).await }
        })
        .await?;

        row.map(|row| row_to_reservation(&row).map_err(decode_err))
            .transpose()
    }

    async fn find_current_for_user(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Reservation>> {
        let sql = format!(
            r#"
SELECT {RESERVATION_COLUMNS} FROM reservation
WHERE user_id = $1
  AND check_out_at IS NULL
  AND expires_at > $2
  AND status NOT IN ('completed', 'canceled', 'expired')
LIMIT 1
"#
        );
        let row = with_retry("find_current_reservation", || {
            let pool = self.pool.clone();
            let sql = sql.clone();
            async move {
                sqlx::query(&sql)
                    .bind(user_id)
                    .bind(now)
                    .fetch_optional(&pool)
                    .await
            }
        })
        .await?;

        row.map(|row| row_to_reservation(&row).map_err(decode_err))
            .transpose()
    }

    async fn find_for_user(&self, user_id: Uuid) -> StoreResult<Vec<Reservation>> {
        let sql = format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservation WHERE user_id = $1 ORDER BY created_at"
        );
        let rows = with_retry("find_reservations_for_user", || {
            let pool = self.pool.clone();
            let sql = sql.clone();
            async move { sqlx::query(&sql).bind(user_id).fetch_all(&pool).await }
        })
        .await?;

        rows_to_reservations(rows)
    }

    async fn find_on_spots(&self, spot_ids: &[Uuid]) -> StoreResult<Vec<Reservation>> {
        let sql = format!(
            "SELECT {RESERVATION_COLUMNS} FROM reservation WHERE spot_id = ANY($1) ORDER BY created_at"
        );
        let spot_ids = spot_ids.to_vec();
        let rows = with_retry("find_reservations_on_spots", || {
            let pool = self.pool.clone();
            let sql = sql.clone();
            let spot_ids = spot_ids.clone();
            async move { sqlx::query(&sql).bind(spot_ids).fetch_all(&pool).await }
        })
        .await?;

        rows_to_reservations(rows)
    }

    async fn find_expired_pending(&self, now: DateTime<Utc>) -> StoreResult<Vec<Reservation>> {
        let sql = format!(
            r#"
SELECT {RESERVATION_COLUMNS} FROM reservation
WHERE status = 'pending'
  AND check_out_at IS NULL
  AND expires_at < $1
"#
        );
        let rows = with_retry("find_expired_pending", || {
            let pool = self.pool.clone();
            let sql = sql.clone();
            async move { sqlx::query(&sql).bind(now).fetch_all(&pool).await }
        })
        .await?;

        rows_to_reservations(rows)
    }

    async fn apply_transition(
        &self,
        id: Uuid,
        expected: &[ReservationStatus],
        change: TransitionChange,
    ) -> StoreResult<Option<Reservation>> {
        let sql = format!(
            r#"
UPDATE reservation
SET status = $2,
    check_in_at = COALESCE($3, check_in_at),
    check_out_at = COALESCE($4, check_out_at),
    updated_at = $5
WHERE id = $1 AND status = ANY($6)
RETURNING {RESERVATION_COLUMNS}
"#
        );
        let expected: Vec<String> = expected.iter().map(|s| s.as_str().to_string()).collect();
        let row = with_retry("apply_transition", || {
            let pool = self.pool.clone();
            let sql = sql.clone();
            let expected = expected.clone();
            let change = change.clone();
            async move {
                sqlx::query(&sql)
                    .bind(id)
                    .bind(change.status.as_str())
                    .bind(change.check_in_at)
                    .bind(change.check_out_at)
                    .bind(change.updated_at)
                    .bind(expected)
                    .fetch_optional(&pool)
                    .await
            }
        })
        .await?;

        row.map(|row| row_to_reservation(&row).map_err(decode_err))
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_key_is_stable_per_user() {
        let user_id = Uuid::from_u128(0x0123_4567_89ab_cdef_fedc_ba98_7654_3210);
        assert_eq!(user_lock_key(user_id), user_lock_key(user_id));
    }

    #[test]
    fn test_lock_key_distinguishes_users() {
        // Concurrent creates by different users must not serialize on the
        // same key, including ids differing only in the high half.
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let c = Uuid::from_u128(1 << 64);
        assert_ne!(user_lock_key(a), user_lock_key(b));
        assert_ne!(user_lock_key(a), user_lock_key(c));
    }
}
