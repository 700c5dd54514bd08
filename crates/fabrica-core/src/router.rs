//! The routing engine.
//!
//! For each node, [`route_relays`] wires consuming industries to relay
//! containers through transfer units (two-phase greedy matching, reuse
//! before growth), then [`route_dumps`] backs every relay's unmet demand
//! with dump containers and producing industries. Both growth loops carry
//! a no-progress check that aborts the build when a capacity configuration
//! can never converge.

use crate::catalog::{Catalog, ItemDef, Recipe};
use crate::container::MAX_CONTAINER_LINKS;
use crate::flow::{StoreRef, TransferKind};
use crate::graph::FactoryGraph;
use crate::id::{IndustryId, ItemId, NodeId};
use crate::node::{DumpRoute, NodeKind, RelayRoute};
use crate::EPSILON;
use std::collections::VecDeque;
use thiserror::Error;

/// Hard ceiling on route-growth iterations. The no-progress check is the
/// real convergence guard; this bounds runaway loops on pathological
/// floating-point inputs.
pub const MAX_ROUTE_ITERATIONS: u32 = 10_000;

#[derive(Debug, Error)]
pub enum RouteError {
    #[error("relay routing stalled for item {item:?} with {unmatched} unsupplied industries")]
    RelayStalled { item: ItemId, unmatched: usize },

    #[error("output routing stalled for item {item:?} with {remaining} units/s unplaced")]
    OutputStalled { item: ItemId, remaining: f64 },

    #[error("dump routing stalled for item {item:?} with {unmet} units/s unmet")]
    DumpStalled { item: ItemId, unmet: f64 },

    #[error("route growth exceeded {max} iterations for item {item:?}")]
    IterationCeiling { item: ItemId, max: u32 },

    #[error("item {item:?} is not registered in the catalog")]
    UnknownItem { item: ItemId },
}

fn item_def<'a>(catalog: &'a Catalog, item: ItemId) -> Result<&'a ItemDef, RouteError> {
    catalog.item(item).ok_or(RouteError::UnknownItem { item })
}

/// Most transfer units a single relay container can host on its incoming
/// side, after the catalyst reservation.
fn max_units_per_relay(def: &ItemDef) -> u32 {
    let reserve = if def.is_catalyst() {
        crate::container::CATALYST_LINK_RESERVE
    } else {
        0
    };
    MAX_CONTAINER_LINKS - reserve
}

// ---------------------------------------------------------------------------
// Relay routes
// ---------------------------------------------------------------------------

/// Compute relay routes for a node: match every consuming industry that
/// still lacks this item to a relay container, reusing existing routes
/// before growing new ones, then place any direct deliverable demand onto
/// output relays.
pub fn route_relays(
    graph: &mut FactoryGraph,
    catalog: &Catalog,
    node_id: NodeId,
) -> Result<(), RouteError> {
    if graph.node(node_id).routed {
        return Ok(());
    }
    let item = graph.node(node_id).item;
    let def = item_def(catalog, item)?;
    let batch = def.transfer_batch_size;
    let time = def.transfer_time;
    let max_units = max_units_per_relay(def);

    let consumers = graph.node(node_id).consumers.clone();
    let mut pending: VecDeque<IndustryId> = consumers
        .iter()
        .flat_map(|&c| graph.industries_needing(c, item))
        .collect();

    // Reuse phase: top up existing non-output relays.
    let routes = graph.node(node_id).relay_routes.clone();
    for route in &routes {
        if pending.is_empty() {
            break;
        }
        if graph.container(route.container).output_rate > 0.0 {
            continue;
        }
        fill_relay(graph, catalog, route, &mut pending, max_units);
    }

    // Growth phase: one new relay per iteration until all matched.
    let recipe = graph.node(node_id).recipe().cloned();
    let mut iterations = 0u32;
    while !pending.is_empty() {
        iterations += 1;
        if iterations > MAX_ROUTE_ITERATIONS {
            return Err(RouteError::IterationCeiling {
                item,
                max: MAX_ROUTE_ITERATIONS,
            });
        }
        let before = pending.len();
        let container = graph.create_relay_container(item, recipe.clone(), None);
        let transfer_unit = graph.create_transfer_unit(
            item,
            batch,
            time,
            StoreRef::Container(container),
            TransferKind::Route,
            None,
        );
        let route = RelayRoute {
            container,
            transfer_unit,
        };
        fill_relay(graph, catalog, &route, &mut pending, max_units);
        graph.node_mut(node_id).relay_routes.push(route);
        if pending.len() == before {
            return Err(RouteError::RelayStalled {
                item,
                unmatched: pending.len(),
            });
        }
    }

    route_output(graph, catalog, node_id, recipe, max_units, batch, time)?;
    graph.node_mut(node_id).routed = true;
    Ok(())
}

/// Assign pending industries to one relay until its link budget runs out.
/// An assignment that overflows the incoming side or the unit ceiling is
/// rolled back and the route is considered full.
fn fill_relay(
    graph: &mut FactoryGraph,
    catalog: &Catalog,
    route: &RelayRoute,
    pending: &mut VecDeque<IndustryId>,
    max_units: u32,
) {
    let item = graph.container(route.container).item;
    loop {
        if graph.container_outgoing_links_free(route.container, catalog) < 1 {
            break;
        }
        let Some(&industry) = pending.front() else {
            break;
        };
        let rate = graph.industry(industry).recipe.consumption_rate(item);
        graph.add_industry_input(industry, StoreRef::Container(route.container));
        graph.add_required_rate(route.transfer_unit, rate);
        let within_limits = graph.container_incoming_links_free(route.container, catalog) >= 0
            && graph.transfer_unit(route.transfer_unit).unit_count() <= max_units;
        if within_limits {
            pending.pop_front();
        } else {
            graph.remove_industry_input(industry, StoreRef::Container(route.container));
            graph.add_required_rate(route.transfer_unit, -rate);
            break;
        }
    }
}

/// Place direct deliverable demand on output relay containers: widen
/// existing output relays up to their sustained transfer capacity, then
/// create new ones for the remainder. The maintained buffer is split
/// proportionally to the rate each route takes.
fn route_output(
    graph: &mut FactoryGraph,
    catalog: &Catalog,
    node_id: NodeId,
    recipe: Option<Recipe>,
    max_units: u32,
    batch: f64,
    time: f64,
) -> Result<(), RouteError> {
    let item = graph.node(node_id).item;
    let requested_rate = graph.node(node_id).output_rate;
    if requested_rate <= 0.0 {
        return Ok(());
    }
    let unit_rate = batch / time;
    let routes = graph.node(node_id).relay_routes.clone();

    let covered_rate: f64 = routes
        .iter()
        .map(|r| graph.container(r.container).output_rate)
        .sum();
    let covered_maintain: f64 = routes
        .iter()
        .map(|r| graph.container(r.container).maintain)
        .sum();
    let mut remaining = requested_rate - covered_rate;
    if remaining <= EPSILON {
        return Ok(());
    }
    let added_total = remaining;
    let added_maintain = (graph.node(node_id).maintain - covered_maintain).max(0.0);

    // Widen existing output relays first.
    for route in &routes {
        if remaining <= EPSILON {
            break;
        }
        if graph.container(route.container).output_rate <= 0.0 {
            continue;
        }
        let units_now = graph.transfer_unit(route.transfer_unit).unit_count() as i64;
        let links_free = graph.container_incoming_links_free(route.container, catalog);
        let capacity = (units_now + links_free).max(0) as f64 * unit_rate;
        let current = graph.transfer_unit(route.transfer_unit).required_rate;
        let take = (capacity - current).min(remaining);
        if take > EPSILON {
            graph.add_required_rate(route.transfer_unit, take);
            graph.add_output_rate(route.container, take, added_maintain * take / added_total);
            remaining -= take;
        }
    }

    // New output relays for the rest.
    let mut iterations = 0u32;
    while remaining > EPSILON {
        iterations += 1;
        if iterations > MAX_ROUTE_ITERATIONS {
            return Err(RouteError::IterationCeiling {
                item,
                max: MAX_ROUTE_ITERATIONS,
            });
        }
        let capacity = max_units as f64 * unit_rate;
        let take = capacity.min(remaining);
        if take <= EPSILON {
            return Err(RouteError::OutputStalled { item, remaining });
        }
        let container = graph.create_relay_container(item, recipe.clone(), None);
        let transfer_unit = graph.create_transfer_unit(
            item,
            batch,
            time,
            StoreRef::Container(container),
            TransferKind::Route,
            None,
        );
        graph.add_required_rate(transfer_unit, take);
        graph.add_output_rate(container, take, added_maintain * take / added_total);
        graph.node_mut(node_id).relay_routes.push(RelayRoute {
            container,
            transfer_unit,
        });
        remaining -= take;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Dump routes
// ---------------------------------------------------------------------------

/// Back every relay route of a production node with dump containers and
/// producing industries until its unmet demand drops below epsilon.
///
/// Catalysts, and gases when `single_industry_gas` is set, spread over
/// single-industry dumps shared round-robin across relays; everything else
/// uses the enlarge/attach/create ladder.
pub fn route_dumps(
    graph: &mut FactoryGraph,
    catalog: &Catalog,
    node_id: NodeId,
    single_industry_gas: bool,
) -> Result<(), RouteError> {
    let (recipe, already_routed) = match &graph.node(node_id).kind {
        NodeKind::Ore => return Ok(()),
        NodeKind::Production {
            recipe,
            dump_routed,
            ..
        } => (recipe.clone(), *dump_routed),
    };
    if already_routed {
        return Ok(());
    }
    let item = graph.node(node_id).item;
    let def = item_def(catalog, item)?;
    let single_industry = def.is_catalyst() || (def.is_gas() && single_industry_gas);

    let routes = graph.node(node_id).relay_routes.clone();
    for relay in routes {
        let demand = graph.egress(relay.container, item) - graph.ingress(relay.container, item);
        if demand <= EPSILON {
            continue;
        }
        if single_industry {
            satisfy_single_industry(graph, catalog, node_id, &recipe, relay, demand)?;
        } else {
            satisfy_bulk(graph, catalog, node_id, &recipe, relay, demand)?;
        }
    }

    if let NodeKind::Production { dump_routed, .. } = &mut graph.node_mut(node_id).kind {
        *dump_routed = true;
    }
    Ok(())
}

/// Pull `take` units/s from a dump container into the relay's transfer
/// unit, attaching the source link if absent. Returns the rate actually
/// taken (zero when the dump's outgoing side cannot host the unit).
fn supply_relay(
    graph: &mut FactoryGraph,
    catalog: &Catalog,
    node_id: NodeId,
    dump_idx: usize,
    relay: RelayRoute,
    take: f64,
) -> f64 {
    let dump = graph.node(node_id).dump_routes()[dump_idx].container;
    let unit = relay.transfer_unit;
    if graph.transfer_unit(unit).draws_from(dump) {
        graph.add_transfer_source_rate(unit, dump, take);
        return take;
    }
    let units = graph.transfer_unit(unit).unit_count();
    if !graph.can_add_outgoing_links(dump, catalog, units) {
        return 0.0;
    }
    graph.add_transfer_source(unit, dump, take);
    if let Some(routes) = graph.node_mut(node_id).dump_routes_mut() {
        if !routes[dump_idx].feeds(&relay) {
            routes[dump_idx].relays.push(relay);
        }
    }
    take
}

/// Enlarge/attach/create ladder for ordinary items.
fn satisfy_bulk(
    graph: &mut FactoryGraph,
    catalog: &Catalog,
    node_id: NodeId,
    recipe: &Recipe,
    relay: RelayRoute,
    mut demand: f64,
) -> Result<(), RouteError> {
    let item = recipe.product;
    let mut iterations = 0u32;
    while demand > EPSILON {
        iterations += 1;
        if iterations > MAX_ROUTE_ITERATIONS {
            return Err(RouteError::IterationCeiling {
                item,
                max: MAX_ROUTE_ITERATIONS,
            });
        }
        let before = demand;

        // Enlarge dumps already feeding this relay.
        let feeding: Vec<usize> = (0..graph.node(node_id).dump_routes().len())
            .filter(|&i| {
                let d = &graph.node(node_id).dump_routes()[i];
                d.feeds(&relay) || graph.transfer_unit(relay.transfer_unit).draws_from(d.container)
            })
            .collect();
        for idx in feeding {
            if demand <= EPSILON {
                break;
            }
            demand = enlarge_dump(graph, catalog, node_id, idx, recipe, relay, demand);
        }

        // Attach one unrelated dump, but never split a relay across dumps.
        if demand > EPSILON && graph.transfer_unit(relay.transfer_unit).sources.is_empty() {
            let count = graph.node(node_id).dump_routes().len();
            for idx in 0..count {
                let dump = graph.node(node_id).dump_routes()[idx].container;
                let surplus = graph.ingress(dump, item) - graph.egress(dump, item);
                if surplus <= EPSILON {
                    continue;
                }
                let take = surplus.min(demand);
                let taken = supply_relay(graph, catalog, node_id, idx, relay, take);
                if taken > 0.0 {
                    demand -= taken;
                    break;
                }
            }
        }

        // Create a new dump route for what remains.
        if demand > EPSILON {
            demand = create_dump_route(graph, catalog, node_id, recipe, relay, demand, None);
        }

        if before - demand <= EPSILON {
            return Err(RouteError::DumpStalled { item, unmet: demand });
        }
    }
    Ok(())
}

/// Take a dump route's surplus, then add industries up to its free
/// incoming links, feeding the gained supply to the relay.
fn enlarge_dump(
    graph: &mut FactoryGraph,
    catalog: &Catalog,
    node_id: NodeId,
    dump_idx: usize,
    recipe: &Recipe,
    relay: RelayRoute,
    mut demand: f64,
) -> f64 {
    let item = recipe.product;
    let per_industry = recipe.production_rate();
    let dump = graph.node(node_id).dump_routes()[dump_idx].container;

    let surplus = graph.ingress(dump, item) - graph.egress(dump, item);
    if surplus > EPSILON {
        let take = surplus.min(demand);
        demand -= supply_relay(graph, catalog, node_id, dump_idx, relay, take);
    }
    if demand <= EPSILON {
        return demand;
    }

    // The relay's unit must be attachable before any industry is added.
    let unit = relay.transfer_unit;
    if !graph.transfer_unit(unit).draws_from(dump) {
        let units = graph.transfer_unit(unit).unit_count();
        if !graph.can_add_outgoing_links(dump, catalog, units) {
            return demand;
        }
    }

    let free_in = graph.container_incoming_links_free(dump, catalog).max(0) as u32;
    let needed = (demand / per_industry).ceil() as u32;
    let n = free_in.min(needed);
    if n == 0 {
        return demand;
    }
    for _ in 0..n {
        let industry = graph.create_industry(item, recipe.clone(), dump, None);
        if let Some(routes) = graph.node_mut(node_id).dump_routes_mut() {
            routes[dump_idx].industries.push(industry);
        }
    }
    let take = (n as f64 * per_industry).min(demand);
    demand - supply_relay(graph, catalog, node_id, dump_idx, relay, take)
}

/// Create a fresh dump container with enough industries to cover the
/// remaining demand, capped by its free incoming links. `industry_cap`
/// limits the industry count (one for catalyst/gas dumps).
fn create_dump_route(
    graph: &mut FactoryGraph,
    catalog: &Catalog,
    node_id: NodeId,
    recipe: &Recipe,
    relay: RelayRoute,
    demand: f64,
    industry_cap: Option<u32>,
) -> f64 {
    let item = recipe.product;
    let per_industry = recipe.production_rate();
    let container = graph.create_dump_container(item, Some(recipe.clone()), None);
    let free_in = graph.container_incoming_links_free(container, catalog).max(0) as u32;
    let needed = (demand / per_industry).ceil() as u32;
    let mut n = free_in.min(needed);
    if let Some(cap) = industry_cap {
        n = n.min(cap);
    }
    let mut industries = Vec::with_capacity(n as usize);
    for _ in 0..n {
        industries.push(graph.create_industry(item, recipe.clone(), container, None));
    }
    let dump_idx = graph.node(node_id).dump_routes().len();
    if let Some(routes) = graph.node_mut(node_id).dump_routes_mut() {
        routes.push(DumpRoute {
            container,
            relays: Vec::new(),
            industries,
        });
    }
    if n == 0 {
        return demand;
    }
    let take = (n as f64 * per_industry).min(demand);
    demand - supply_relay(graph, catalog, node_id, dump_idx, relay, take)
}

/// Catalyst/gas path: share existing single-industry dumps round-robin
/// before creating new ones, one industry per dump.
fn satisfy_single_industry(
    graph: &mut FactoryGraph,
    catalog: &Catalog,
    node_id: NodeId,
    recipe: &Recipe,
    relay: RelayRoute,
    mut demand: f64,
) -> Result<(), RouteError> {
    let item = recipe.product;
    let mut iterations = 0u32;
    while demand > EPSILON {
        iterations += 1;
        if iterations > MAX_ROUTE_ITERATIONS {
            return Err(RouteError::IterationCeiling {
                item,
                max: MAX_ROUTE_ITERATIONS,
            });
        }
        let before = demand;

        let count = graph.node(node_id).dump_routes().len();
        for idx in 0..count {
            if demand <= EPSILON {
                break;
            }
            let dump = graph.node(node_id).dump_routes()[idx].container;
            let surplus = graph.ingress(dump, item) - graph.egress(dump, item);
            if surplus <= EPSILON {
                continue;
            }
            let take = surplus.min(demand);
            demand -= supply_relay(graph, catalog, node_id, idx, relay, take);
        }

        if demand > EPSILON {
            demand = create_dump_route(graph, catalog, node_id, recipe, relay, demand, Some(1));
        }

        if before - demand <= EPSILON {
            return Err(RouteError::DumpStalled { item, unmet: demand });
        }
    }
    Ok(())
}
