//! Gas rebalancing.
//!
//! When one pool of gas dumps serves several consuming relays, the routed
//! source rates can starve a late relay. This pass redistributes each
//! dump's supply across the relays drawing from it, proportionally to each
//! relay's share of the node's total egress and capped at the relay's own
//! egress.

use crate::catalog::Catalog;
use crate::graph::FactoryGraph;
use crate::id::NodeId;
use crate::EPSILON;

pub fn rebalance_gas(graph: &mut FactoryGraph, catalog: &Catalog, node_id: NodeId) {
    let item = graph.node(node_id).item;
    if !catalog.item(item).is_some_and(|d| d.is_gas()) {
        return;
    }
    let relays = graph.node(node_id).relay_routes.clone();
    let egresses: Vec<f64> = relays
        .iter()
        .map(|r| graph.egress(r.container, item))
        .collect();
    let total: f64 = egresses.iter().sum();
    if total <= EPSILON {
        return;
    }

    let dumps: Vec<_> = graph
        .node(node_id)
        .dump_routes()
        .iter()
        .map(|d| d.container)
        .collect();
    for dump in dumps {
        let supply = graph.ingress(dump, item);
        for (relay, egress) in relays.iter().zip(&egresses) {
            if !graph.transfer_unit(relay.transfer_unit).draws_from(dump) {
                continue;
            }
            let share = supply * egress / total;
            let rate = share.min(*egress);
            graph.set_transfer_source_rate(relay.transfer_unit, dump, rate);
        }
    }
}
