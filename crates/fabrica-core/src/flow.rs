//! Flow entities: [`Industry`] (consumes ingredients, produces one item plus
//! byproducts) and [`TransferUnit`] (moves one item type between storages).

use crate::catalog::Recipe;
use crate::id::{ContainerId, ItemId, TransferContainerId};
use serde::{Deserialize, Serialize};

/// Cap on direct inputs per industry. Enforced by the overflow
/// consolidation pass, not by rejection at link time.
pub const MAX_INDUSTRY_LINKS: usize = 7;

/// A storage an industry or transfer unit can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreRef {
    Container(ContainerId),
    Transfer(TransferContainerId),
}

/// A production unit running one scaled recipe into one output container.
#[derive(Debug, Clone)]
pub struct Industry {
    /// Display label, e.g. `I4`, sequential per item.
    pub label: String,
    pub item: ItemId,
    pub recipe: Recipe,
    pub output: ContainerId,
    /// Direct input links. May transiently exceed [`MAX_INDUSTRY_LINKS`]
    /// until the overflow pass consolidates.
    pub inputs: Vec<StoreRef>,
    pub changed: bool,
}

impl Industry {
    pub fn has_input(&self, store: StoreRef) -> bool {
        self.inputs.contains(&store)
    }
}

/// Why a transfer unit exists. Byproduct drains and catalyst balancers are
/// excluded from egress bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferKind {
    /// Feeds a relay container (or transfer container) on the main route.
    Route,
    /// Drains a byproduct out of a dump container.
    Byproduct,
    /// Closes a catalyst consumption/regeneration loop.
    Balancer,
}

/// One source link of a transfer unit and the rate drawn through it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransferSource {
    pub container: ContainerId,
    pub rate: f64,
}

/// A logical conveyor moving one item type from source containers into a
/// single destination.
#[derive(Debug, Clone)]
pub struct TransferUnit {
    /// Display label, e.g. `T2`, sequential per item.
    pub label: String,
    pub item: ItemId,
    pub kind: TransferKind,
    pub output: StoreRef,
    /// Source containers with their contributed rates, in attachment order.
    pub sources: Vec<TransferSource>,
    /// The rate the router is obligated to satisfy across all sources.
    pub required_rate: f64,
    /// Physical constants of the moved item, copied at creation.
    pub batch_size: f64,
    pub transfer_time: f64,
    pub changed: bool,
    pub merged: bool,
}

impl TransferUnit {
    /// Sum of per-source rates (the supplied rate).
    pub fn total_rate(&self) -> f64 {
        self.sources.iter().map(|s| s.rate).sum()
    }

    pub fn rate_from(&self, container: ContainerId) -> f64 {
        self.sources
            .iter()
            .find(|s| s.container == container)
            .map(|s| s.rate)
            .unwrap_or(0.0)
    }

    pub fn draws_from(&self, container: ContainerId) -> bool {
        self.sources.iter().any(|s| s.container == container)
    }

    /// The count of physical units needed to sustain the required rate.
    /// Both a display value and the link multiplicity this unit occupies.
    pub fn unit_count(&self) -> u32 {
        let per_unit = self.batch_size / self.transfer_time;
        let demand = self.required_rate.max(self.total_rate());
        (demand / per_unit).ceil().max(1.0) as u32
    }
}
