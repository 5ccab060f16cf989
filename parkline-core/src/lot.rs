use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A parking lot, owned by the lot-management context. This core only reads
/// `owner_id` and lot→spot membership.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Lot {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub address: String,
    pub location: GeoPoint,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// A physical spot inside a lot. `is_available` is false exactly while some
/// non-terminal reservation references the spot, and is only ever flipped
/// through the claim/release protocol.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Spot {
    pub id: Uuid,
    pub lot_id: Uuid,
    pub is_available: bool,
}

impl Spot {
    pub fn new(id: Uuid, lot_id: Uuid) -> Self {
        Self {
            id,
            lot_id,
            is_available: true,
        }
    }
}
