use parkline_core::StoreError;
use parkline_registry::SpotRegistry;
use tracing::error;
use uuid::Uuid;

/// The claim half of the claim-then-create workflow. Claiming and inserting
/// the reservation happen in different stores with no shared transaction,
/// so the claim is taken first and must be explicitly compensated when the
/// dependent insert fails.
pub(crate) struct ClaimedSpot<'a> {
    registry: &'a SpotRegistry,
    spot_id: Uuid,
}

impl<'a> ClaimedSpot<'a> {
    /// Step one: claim a spot in the lot. `None` means no capacity.
    pub(crate) async fn claim(
        registry: &'a SpotRegistry,
        lot_id: Uuid,
    ) -> Result<Option<ClaimedSpot<'a>>, StoreError> {
        Ok(registry
            .claim_available_spot(lot_id)
            .await?
            .map(|spot_id| Self { registry, spot_id }))
    }

    pub(crate) fn spot_id(&self) -> Uuid {
        self.spot_id
    }

    /// Step two succeeded: the claim is now owned by the inserted
    /// reservation and must not be released.
    pub(crate) fn commit(self) {}

    /// Step two failed: release the claim before the failure surfaces, so
    /// the spot is never leaked. Release is idempotent, so racing the
    /// sweeper here is harmless.
    pub(crate) async fn compensate(self) {
        if let Err(err) = self.registry.release_spot(self.spot_id).await {
            error!(spot_id = %self.spot_id, %err, "compensating release failed; spot may be leaked");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parkline_core::{GeoPoint, Lot, MemoryRegistry, Spot};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_compensate_restores_availability() {
        let store = Arc::new(MemoryRegistry::new());
        let lot_id = Uuid::new_v4();
        store.insert_lot(Lot {
            id: lot_id,
            owner_id: Uuid::new_v4(),
            name: "Garage".to_string(),
            address: "5 Dock Rd".to_string(),
            location: GeoPoint {
                latitude: 0.0,
                longitude: 0.0,
            },
        });
        store.insert_spot(Spot::new(Uuid::from_u128(1), lot_id));
        let registry = SpotRegistry::new(store.clone(), store.clone());

        let claim = ClaimedSpot::claim(&registry, lot_id).await.unwrap().unwrap();
        assert_eq!(store.available_count(lot_id), 0);

        claim.compensate().await;
        assert_eq!(store.available_count(lot_id), 1);
    }

    #[tokio::test]
    async fn test_claim_on_full_lot_yields_none() {
        let store = Arc::new(MemoryRegistry::new());
        let registry = SpotRegistry::new(store.clone(), store);

        assert!(ClaimedSpot::claim(&registry, Uuid::new_v4())
            .await
            .unwrap()
            .is_none());
    }
}
