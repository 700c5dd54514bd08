//! Storage entities: single-item [`Container`]s and multi-item
//! [`TransferContainer`]s.
//!
//! Link-count arithmetic that depends on other arenas (transfer-unit
//! multiplicities) lives on [`crate::graph::FactoryGraph`]; this module holds
//! the entity state and the intrinsic reservation rules.

use crate::catalog::Recipe;
use crate::id::{IndustryId, ItemId, TransferUnitId};
use serde::{Deserialize, Serialize};

/// Hard cap on links per side for containers and transfer containers.
pub const MAX_CONTAINER_LINKS: u32 = 10;

/// Links reserved on each side of a catalyst container for the balancer
/// chain that closes the consumption/regeneration loop.
pub const CATALYST_LINK_RESERVE: u32 = 2;

/// Whether a container receives from industries (dump) or feeds them (relay).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerRole {
    Relay,
    Dump,
}

/// A producer or consumer attached to a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowRef {
    Industry(IndustryId),
    Transfer(TransferUnitId),
}

/// A single-item storage buffer.
#[derive(Debug, Clone)]
pub struct Container {
    /// Display label, e.g. `R3` or `D1`, sequential per item per role.
    pub label: String,
    pub item: ItemId,
    pub role: ContainerRole,
    /// The scaled recipe producing this item, if craftable. Used for the
    /// byproduct link reservation and maintain-quantity computation.
    pub recipe: Option<Recipe>,
    /// Flow entities depositing into this container.
    pub producers: Vec<FlowRef>,
    /// Flow entities drawing from this container.
    pub consumers: Vec<FlowRef>,
    /// Direct deliverable rate, nonzero only for final output containers.
    pub output_rate: f64,
    /// Buffer stock this container is sized to hold.
    pub maintain: f64,
    /// Dirty flag for diffing against a previously loaded plan.
    pub changed: bool,
    /// Logically absorbed by a merge; kept for stable indices.
    pub merged: bool,
}

impl Container {
    /// Links reserved on the incoming side before real producers count.
    pub fn incoming_reservation(&self, is_catalyst: bool, balancer_links: u32) -> u32 {
        if is_catalyst {
            CATALYST_LINK_RESERVE.saturating_sub(balancer_links)
        } else {
            0
        }
    }

    /// Links reserved on the outgoing side: the catalyst balancer reserve
    /// plus, for dump containers with a recipe, one slot per byproduct
    /// still awaiting its drain transfer unit.
    pub fn outgoing_reservation(
        &self,
        is_catalyst: bool,
        balancer_links: u32,
        byproduct_drains: u32,
    ) -> u32 {
        let catalyst = if is_catalyst {
            CATALYST_LINK_RESERVE.saturating_sub(balancer_links)
        } else {
            0
        };
        let byproducts = if self.role == ContainerRole::Dump {
            self.recipe
                .as_ref()
                .map(|r| (r.byproducts.len() as u32).saturating_sub(byproduct_drains))
                .unwrap_or(0)
        } else {
            0
        };
        catalyst + byproducts
    }
}

/// A multi-item buffer holding exactly the item set it was created with.
/// Used to keep an industry's direct input-link count within its cap.
#[derive(Debug, Clone)]
pub struct TransferContainer {
    /// Display label, e.g. `TC2`, sequential across the plan.
    pub label: String,
    /// Fixed item set, sorted by id. No additions after creation.
    pub items: Vec<ItemId>,
    /// Transfer units depositing into this container.
    pub producers: Vec<TransferUnitId>,
    /// Industries drawing from this container.
    pub consumers: Vec<IndustryId>,
    pub changed: bool,
}

impl TransferContainer {
    pub fn holds(&self, item: ItemId) -> bool {
        self.items.binary_search(&item).is_ok()
    }

    /// True if the fixed item set is exactly `items` (which must be sorted).
    pub fn holds_exactly(&self, items: &[ItemId]) -> bool {
        self.items == items
    }
}
