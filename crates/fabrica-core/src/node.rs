//! Factory nodes: one per distinct item participating in the plan, plus the
//! relay/dump route records the router computes for them.

use crate::catalog::Recipe;
use crate::id::{ContainerId, IndustryId, ItemId, NodeId, TransferUnitId};

/// A (relay container, transfer unit) pair: the unit pulls this node's item
/// out of dump containers and deposits it into the relay that feeds
/// consuming industries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelayRoute {
    pub container: ContainerId,
    pub transfer_unit: TransferUnitId,
}

/// A dump container, the industries producing into it, and the relay routes
/// it feeds.
#[derive(Debug, Clone)]
pub struct DumpRoute {
    pub container: ContainerId,
    pub relays: Vec<RelayRoute>,
    pub industries: Vec<IndustryId>,
}

impl DumpRoute {
    pub fn feeds(&self, relay: &RelayRoute) -> bool {
        self.relays.contains(relay)
    }
}

/// Node variant: ores are leaves, production nodes carry a talent-scaled
/// recipe and their dump routes.
#[derive(Debug, Clone)]
pub enum NodeKind {
    Ore,
    Production {
        recipe: Recipe,
        dump_routes: Vec<DumpRoute>,
        dump_routed: bool,
    },
}

/// One node per distinct item in the plan. Owned by the registry; never
/// destroyed within a planning session, only grown.
#[derive(Debug, Clone)]
pub struct FactoryNode {
    pub item: ItemId,
    /// Nodes whose recipe lists this item as an ingredient.
    pub consumers: Vec<NodeId>,
    /// Requested direct deliverable rate, units per second.
    pub output_rate: f64,
    /// Requested maintained buffer quantity for the deliverable.
    pub maintain: f64,
    /// Relay routes, cached after first computation.
    pub relay_routes: Vec<RelayRoute>,
    /// Guards against recomputation within a session.
    pub routed: bool,
    pub kind: NodeKind,
}

impl FactoryNode {
    pub fn new(item: ItemId, kind: NodeKind) -> Self {
        Self {
            item,
            consumers: Vec::new(),
            output_rate: 0.0,
            maintain: 0.0,
            relay_routes: Vec::new(),
            routed: false,
            kind,
        }
    }

    pub fn is_ore(&self) -> bool {
        matches!(self.kind, NodeKind::Ore)
    }

    pub fn recipe(&self) -> Option<&Recipe> {
        match &self.kind {
            NodeKind::Ore => None,
            NodeKind::Production { recipe, .. } => Some(recipe),
        }
    }

    pub fn dump_routes(&self) -> &[DumpRoute] {
        match &self.kind {
            NodeKind::Ore => &[],
            NodeKind::Production { dump_routes, .. } => dump_routes,
        }
    }

    pub fn dump_routes_mut(&mut self) -> Option<&mut Vec<DumpRoute>> {
        match &mut self.kind {
            NodeKind::Ore => None,
            NodeKind::Production { dump_routes, .. } => Some(dump_routes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ore_node_has_no_recipe_or_dumps() {
        let node = FactoryNode::new(ItemId(0), NodeKind::Ore);
        assert!(node.is_ore());
        assert!(node.recipe().is_none());
        assert!(node.dump_routes().is_empty());
    }

    #[test]
    fn production_node_exposes_recipe() {
        let recipe = Recipe {
            product: ItemId(1),
            quantity: 10.0,
            time: 5.0,
            industry: "assembler".to_string(),
            ingredients: vec![(ItemId(0), 2.0)],
            byproducts: vec![],
        };
        let node = FactoryNode::new(
            ItemId(1),
            NodeKind::Production {
                recipe: recipe.clone(),
                dump_routes: Vec::new(),
                dump_routed: false,
            },
        );
        assert!(!node.is_ore());
        assert_eq!(node.recipe().unwrap().product, ItemId(1));
    }
}
