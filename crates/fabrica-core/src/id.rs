use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a factory node (one per distinct item in the plan).
    pub struct NodeId;

    /// Identifies a single-item storage container.
    pub struct ContainerId;

    /// Identifies a multi-item transfer container.
    pub struct TransferContainerId;

    /// Identifies an industry (production flow entity).
    pub struct IndustryId;

    /// Identifies a transfer unit (item mover).
    pub struct TransferUnitId;
}

/// Identifies an item type in the catalog. Cheap to copy and compare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemId(pub u32);

/// Identifies a recipe in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecipeId(pub u32);
