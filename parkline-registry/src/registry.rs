use parkline_core::{Lot, LotRepository, SpotRepository, StoreResult};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// The Spot Registry: atomic claim/release of spot availability plus the
/// lot-ownership reads the authorizer needs. Availability is only ever
/// mutated through this protocol.
pub struct SpotRegistry {
    spots: Arc<dyn SpotRepository>,
    lots: Arc<dyn LotRepository>,
}

impl SpotRegistry {
    pub fn new(spots: Arc<dyn SpotRepository>, lots: Arc<dyn LotRepository>) -> Self {
        Self { spots, lots }
    }

    /// Claims one available spot in the lot, lowest spot id first, flipping
    /// it unavailable atomically. `None` means the lot is full; callers
    /// handle that as a normal outcome.
    pub async fn claim_available_spot(&self, lot_id: Uuid) -> StoreResult<Option<Uuid>> {
        let claimed = self.spots.claim_lowest_available(lot_id).await?;
        match claimed {
            Some(spot_id) => debug!(%lot_id, %spot_id, "claimed spot"),
            None => debug!(%lot_id, "no spot available"),
        }
        Ok(claimed)
    }

    /// Marks the spot available again. Idempotent by contract: the
    /// compensation path and the sweeper may both try to release.
    pub async fn release_spot(&self, spot_id: Uuid) -> StoreResult<()> {
        self.spots.release(spot_id).await?;
        debug!(%spot_id, "released spot");
        Ok(())
    }

    pub async fn lot_owner(&self, lot_id: Uuid) -> StoreResult<Option<Uuid>> {
        Ok(self.lots.get_lot(lot_id).await?.map(|lot| lot.owner_id))
    }

    /// Resolves the lot a spot belongs to.
    pub async fn lot_of_spot(&self, spot_id: Uuid) -> StoreResult<Option<Lot>> {
        let spot = match self.spots.get_spot(spot_id).await? {
            Some(spot) => spot,
            None => return Ok(None),
        };
        self.lots.get_lot(spot.lot_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parkline_core::{GeoPoint, MemoryRegistry, Spot};
    use std::collections::HashSet;

    fn registry_with_spots(spot_count: u128) -> (SpotRegistry, Lot, Vec<Uuid>) {
        let store = Arc::new(MemoryRegistry::new());
        let lot = Lot {
            id: Uuid::new_v4(),
            owner_id: Uuid::new_v4(),
            name: "Central garage".to_string(),
            address: "12 Main St".to_string(),
            location: GeoPoint {
                latitude: 40.73,
                longitude: -73.93,
            },
        };
        store.insert_lot(lot.clone());
        let spot_ids: Vec<Uuid> = (1..=spot_count).map(Uuid::from_u128).collect();
        for id in &spot_ids {
            store.insert_spot(Spot::new(*id, lot.id));
        }
        (SpotRegistry::new(store.clone(), store), lot, spot_ids)
    }

    #[tokio::test]
    async fn test_concurrent_claims_never_share_a_spot() {
        let (registry, lot, spot_ids) = registry_with_spots(4);
        let registry = Arc::new(registry);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            let lot_id = lot.id;
            handles.push(tokio::spawn(async move {
                registry.claim_available_spot(lot_id).await.unwrap()
            }));
        }

        let mut claimed = Vec::new();
        for handle in handles {
            if let Some(spot_id) = handle.await.unwrap() {
                claimed.push(spot_id);
            }
        }

        // Exactly as many winners as spots, all distinct.
        assert_eq!(claimed.len(), spot_ids.len());
        let distinct: HashSet<Uuid> = claimed.iter().copied().collect();
        assert_eq!(distinct.len(), spot_ids.len());
    }

    #[tokio::test]
    async fn test_release_makes_spot_claimable_again() {
        let (registry, lot, spot_ids) = registry_with_spots(1);

        assert_eq!(
            registry.claim_available_spot(lot.id).await.unwrap(),
            Some(spot_ids[0])
        );
        assert_eq!(registry.claim_available_spot(lot.id).await.unwrap(), None);

        registry.release_spot(spot_ids[0]).await.unwrap();
        assert_eq!(
            registry.claim_available_spot(lot.id).await.unwrap(),
            Some(spot_ids[0])
        );
    }

    #[tokio::test]
    async fn test_ownership_reads() {
        let (registry, lot, spot_ids) = registry_with_spots(1);

        assert_eq!(registry.lot_owner(lot.id).await.unwrap(), Some(lot.owner_id));
        assert_eq!(registry.lot_owner(Uuid::new_v4()).await.unwrap(), None);

        let resolved = registry.lot_of_spot(spot_ids[0]).await.unwrap().unwrap();
        assert_eq!(resolved.id, lot.id);
        assert!(registry.lot_of_spot(Uuid::new_v4()).await.unwrap().is_none());
    }
}
