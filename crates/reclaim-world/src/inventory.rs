//! Per-owner tile accounting.
//!
//! A root piece of a multi-part structure counts one building tile per
//! attached piece, weighted by [`TileWeights::building`]. Every other object
//! is a placeable worth [`TileWeights::placeable`]. The index is a read-only
//! snapshot; rebuild it after any phase that removes objects.

use std::collections::BTreeMap;

use reclaim_types::OwnerId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::state::WorldState;

/// Multipliers applied to the two tile categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileWeights {
    /// Weight of one building piece.
    pub building: Decimal,
    /// Weight of one placeable.
    pub placeable: Decimal,
}

impl Default for TileWeights {
    fn default() -> Self {
        Self {
            building: Decimal::ONE,
            placeable: Decimal::new(6, 1),
        }
    }
}

/// Tile totals of one owner.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OwnerTiles {
    /// Number of owned objects, root pieces and placeables alike.
    pub objects: usize,
    /// Weighted building-piece count.
    pub building: Decimal,
    /// Weighted placeable count.
    pub placeable: Decimal,
}

impl OwnerTiles {
    /// Sum of both weighted categories.
    pub fn total(&self) -> Decimal {
        self.building.saturating_add(self.placeable)
    }

    /// [`Self::total`] rounded to a whole tile count, ties to even.
    pub fn rounded_total(&self) -> Decimal {
        self.total().round_dp(0)
    }
}

/// Owner id to tile totals, built from one view of the world.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InventoryIndex {
    owners: BTreeMap<OwnerId, OwnerTiles>,
}

impl InventoryIndex {
    /// Aggregate every object of `state` by owner.
    pub fn build(state: &WorldState, weights: TileWeights) -> Self {
        let mut owners: BTreeMap<OwnerId, OwnerTiles> = BTreeMap::new();
        for object in state.objects.values() {
            let entry = owners.entry(object.owner_id).or_default();
            entry.objects = entry.objects.saturating_add(1);
            if object.is_root_piece() {
                let pieces = Decimal::from(object.instance_count);
                entry.building = entry
                    .building
                    .saturating_add(pieces.saturating_mul(weights.building));
            } else {
                entry.placeable = entry.placeable.saturating_add(weights.placeable);
            }
        }
        Self { owners }
    }

    /// Whether `owner` holds at least one object.
    pub fn has_tiles(&self, owner: OwnerId) -> bool {
        self.owners.get(&owner).is_some_and(|t| t.objects > 0)
    }

    /// Totals of `owner`; zero when it holds nothing.
    pub fn tiles(&self, owner: OwnerId) -> OwnerTiles {
        self.owners.get(&owner).copied().unwrap_or_default()
    }
}
