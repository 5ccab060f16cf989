use crate::retry::{decode_err, with_retry};
use async_trait::async_trait;
use parkline_core::{GeoPoint, Lot, LotRepository, Spot, SpotRepository, StoreResult};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use uuid::Uuid;

/// Postgres-backed spot availability. The claim is a single conditional
/// UPDATE: the inner select picks the lowest-id available spot, SKIP LOCKED
/// keeps concurrent claimants from blocking on or winning the same row.
pub struct StoreSpotRepository {
    pool: PgPool,
}

impl StoreSpotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const CLAIM_SQL: &str = r#"
UPDATE spot SET is_available = FALSE
WHERE id = (
    SELECT id FROM spot
    WHERE lot_id = $1 AND is_available = TRUE
    ORDER BY id
    LIMIT 1
    FOR UPDATE SKIP LOCKED
)
RETURNING id
"#;

fn row_to_spot(row: &PgRow) -> Result<Spot, sqlx::Error> {
    Ok(Spot {
        id: row.try_get("id")?,
        lot_id: row.try_get("lot_id")?,
        is_available: row.try_get("is_available")?,
    })
}

#[async_trait]
impl SpotRepository for StoreSpotRepository {
    async fn claim_lowest_available(&self, lot_id: Uuid) -> StoreResult<Option<Uuid>> {
        let row = with_retry("claim_lowest_available", || {
            let pool = self.pool.clone();
            async move { sqlx::query(CLAIM_SQL).bind(lot_id).fetch_optional(&pool).await }
        })
        .await?;

        row.map(|row| row.try_get("id").map_err(decode_err)).transpose()
    }

    async fn release(&self, spot_id: Uuid) -> StoreResult<()> {
        // Unconditional write keeps release idempotent.
        with_retry("release_spot", || {
            let pool = self.pool.clone();
            async move {
                sqlx::query("UPDATE spot SET is_available = TRUE WHERE id = $1")
                    .bind(spot_id)
                    .execute(&pool)
                    .await
            }
        })
        .await?;
        Ok(())
    }

    async fn get_spot(&self, spot_id: Uuid) -> StoreResult<Option<Spot>> {
        let row = with_retry("get_spot", || {
            let pool = self.pool.clone();
            async move {
                sqlx::query("SELECT id, lot_id, is_available FROM spot WHERE id = $1")
                    .bind(spot_id)
                    .fetch_optional(&pool)
                    .await
            }
        })
        .await?;

        row.map(|row| row_to_spot(&row).map_err(decode_err)).transpose()
    }
}

pub struct StoreLotRepository {
    pool: PgPool,
}

impl StoreLotRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn row_to_lot(row: &PgRow) -> Result<Lot, sqlx::Error> {
    Ok(Lot {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        name: row.try_get("name")?,
        address: row.try_get("address")?,
        location: GeoPoint {
            latitude: row.try_get("latitude")?,
            longitude: row.try_get("longitude")?,
        },
    })
}

#[async_trait]
impl LotRepository for StoreLotRepository {
    async fn get_lot(&self, lot_id: Uuid) -> StoreResult<Option<Lot>> {
        let row = with_retry("get_lot", || {
            let pool = self.pool.clone();
            async move {
                sqlx::query(
                    "SELECT id, owner_id, name, address, latitude, longitude FROM lot WHERE id = $1",
                )
                .bind(lot_id)
                .fetch_optional(&pool)
                .await
            }
        })
        .await?;

        row.map(|row| row_to_lot(&row).map_err(decode_err)).transpose()
    }
}
