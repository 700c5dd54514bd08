//! Merge and unmerge.
//!
//! A dump/relay pair that is strictly 1:1 wastes a container and a
//! transfer unit: every producer could deposit straight into the relay.
//! [`merge_factory`] collapses such pairs (and drops the pointless
//! intermediary unit on ore relays); [`unmerge_factory`] reverses the
//! collapse exactly, which must happen before any incremental re-routing
//! because the router's capacity arithmetic assumes the unmerged topology.
//!
//! Merged entities keep their own link lists untouched so the reversal
//! can replay them, and neither operation raises `changed` flags.

use crate::container::FlowRef;
use crate::flow::StoreRef;
use crate::graph::FactoryGraph;
use crate::id::{ContainerId, NodeId};
use crate::node::RelayRoute;

/// Collapse every eligible dump/relay pair in the graph.
pub fn merge_factory(graph: &mut FactoryGraph) {
    let node_ids: Vec<NodeId> = graph.nodes().map(|(id, _)| id).collect();
    graph.suppress_changes(|g| {
        for node_id in node_ids {
            if g.node(node_id).is_ore() {
                merge_ore(g, node_id);
            } else {
                merge_production(g, node_id);
            }
        }
    });
}

/// Restore every merged dump/relay pair in the graph.
pub fn unmerge_factory(graph: &mut FactoryGraph) {
    let node_ids: Vec<NodeId> = graph.nodes().map(|(id, _)| id).collect();
    graph.suppress_changes(|g| {
        for node_id in node_ids {
            if g.node(node_id).is_ore() {
                unmerge_ore(g, node_id);
            } else {
                unmerge_production(g, node_id);
            }
        }
    });
}

/// Ore relays need no intermediary unit at all: the unit has no sources,
/// so detaching it leaves the relay fed directly from the world.
fn merge_ore(g: &mut FactoryGraph, node_id: NodeId) {
    let routes = g.node(node_id).relay_routes.clone();
    for route in routes {
        if g.transfer_unit(route.transfer_unit).merged {
            continue;
        }
        g.containers[route.container]
            .producers
            .retain(|f| *f != FlowRef::Transfer(route.transfer_unit));
        g.transfer_units[route.transfer_unit].merged = true;
    }
}

fn unmerge_ore(g: &mut FactoryGraph, node_id: NodeId) {
    let routes = g.node(node_id).relay_routes.clone();
    for route in routes {
        if !g.transfer_unit(route.transfer_unit).merged {
            continue;
        }
        g.transfer_units[route.transfer_unit].merged = false;
        g.containers[route.container]
            .producers
            .push(FlowRef::Transfer(route.transfer_unit));
    }
}

fn merge_production(g: &mut FactoryGraph, node_id: NodeId) {
    let routes = g.node(node_id).relay_routes.clone();
    for relay in routes {
        if g.transfer_unit(relay.transfer_unit).merged {
            continue;
        }
        let dump = {
            let unit = g.transfer_unit(relay.transfer_unit);
            if unit.sources.len() != 1 {
                continue;
            }
            let source = unit.sources[0].container;
            let one_to_one = g.node(node_id).dump_routes().iter().any(|d| {
                d.container == source && d.relays.len() == 1 && d.relays[0] == relay
            });
            if !one_to_one || g.container(source).merged {
                continue;
            }
            source
        };
        collapse(g, relay, dump);
    }
}

/// Fold a 1:1 dump into its relay: detach the connecting unit, repoint
/// all of the dump's producers and remaining consumers onto the relay,
/// and flag both the dump and the unit as merged. The dump's own lists
/// and the unit's source record are left intact for the reversal.
fn collapse(g: &mut FactoryGraph, relay: RelayRoute, dump: ContainerId) {
    let target = relay.container;
    let unit = relay.transfer_unit;

    g.containers[target]
        .producers
        .retain(|f| *f != FlowRef::Transfer(unit));
    g.transfer_units[unit].merged = true;

    let producers = g.containers[dump].producers.clone();
    for p in producers {
        match p {
            FlowRef::Industry(i) => g.industries[i].output = target,
            FlowRef::Transfer(t) => g.transfer_units[t].output = StoreRef::Container(target),
        }
        g.containers[target].producers.push(p);
    }

    let consumers = g.containers[dump].consumers.clone();
    for c in consumers {
        if c == FlowRef::Transfer(unit) {
            continue;
        }
        match c {
            FlowRef::Industry(i) => {
                for s in g.industries[i].inputs.iter_mut() {
                    if *s == StoreRef::Container(dump) {
                        *s = StoreRef::Container(target);
                    }
                }
            }
            FlowRef::Transfer(t) => {
                for s in g.transfer_units[t].sources.iter_mut() {
                    if s.container == dump {
                        s.container = target;
                    }
                }
            }
        }
        g.containers[target].consumers.push(c);
    }

    g.containers[dump].merged = true;
}

fn unmerge_production(g: &mut FactoryGraph, node_id: NodeId) {
    let routes = g.node(node_id).relay_routes.clone();
    for relay in routes {
        if !g.transfer_unit(relay.transfer_unit).merged {
            continue;
        }
        let unit = g.transfer_unit(relay.transfer_unit);
        if unit.sources.len() != 1 {
            continue;
        }
        let dump = unit.sources[0].container;
        if !g.container(dump).merged {
            continue;
        }
        restore(g, relay, dump);
    }
}

/// Exact inverse of [`collapse`], replayed from the dump's preserved
/// lists.
fn restore(g: &mut FactoryGraph, relay: RelayRoute, dump: ContainerId) {
    let target = relay.container;
    let unit = relay.transfer_unit;

    let producers = g.containers[dump].producers.clone();
    for p in producers {
        match p {
            FlowRef::Industry(i) => g.industries[i].output = dump,
            FlowRef::Transfer(t) => g.transfer_units[t].output = StoreRef::Container(dump),
        }
        if let Some(pos) = g.containers[target].producers.iter().position(|f| *f == p) {
            g.containers[target].producers.remove(pos);
        }
    }

    let consumers = g.containers[dump].consumers.clone();
    for c in consumers {
        if c == FlowRef::Transfer(unit) {
            continue;
        }
        match c {
            FlowRef::Industry(i) => {
                for s in g.industries[i].inputs.iter_mut() {
                    if *s == StoreRef::Container(target) {
                        *s = StoreRef::Container(dump);
                    }
                }
            }
            FlowRef::Transfer(t) => {
                for s in g.transfer_units[t].sources.iter_mut() {
                    if s.container == target {
                        s.container = dump;
                    }
                }
            }
        }
        if let Some(pos) = g.containers[target].consumers.iter().position(|f| *f == c) {
            g.containers[target].consumers.remove(pos);
        }
    }

    g.containers[dump].merged = false;
    g.transfer_units[unit].merged = false;
    g.containers[target].producers.push(FlowRef::Transfer(unit));
}
