//! Byproduct drains and catalyst chaining.
//!
//! Every dump container whose recipe emits byproducts gets a drain transfer
//! unit per byproduct item, reusing existing drains and least-loaded
//! destination dumps before creating new ones. Catalyst items additionally
//! get their dump containers chained pairwise in both directions, closing
//! the consumption/regeneration loop.

use crate::catalog::Catalog;
use crate::container::{ContainerRole, FlowRef};
use crate::flow::{StoreRef, TransferKind};
use crate::graph::FactoryGraph;
use crate::id::{ContainerId, ItemId, TransferUnitId};
use crate::node::DumpRoute;
use crate::EPSILON;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ByproductError {
    #[error("byproduct item {item:?} is not registered in the catalog")]
    UnknownItem { item: ItemId },

    #[error("no dump container for byproduct {item:?} can accept another drain")]
    DrainCapacity { item: ItemId },
}

/// Attach or refresh drain transfer units for every byproduct emitted by
/// every unmerged dump container, then chain catalyst dumps.
pub fn route_byproducts(graph: &mut FactoryGraph, catalog: &Catalog) -> Result<(), ByproductError> {
    let dumps: Vec<ContainerId> = graph
        .containers()
        .filter(|(_, c)| c.role == ContainerRole::Dump && !c.merged)
        .filter(|(_, c)| c.recipe.as_ref().is_some_and(|r| !r.byproducts.is_empty()))
        .map(|(id, _)| id)
        .collect();

    for dump in dumps {
        let byproducts: Vec<ItemId> = graph
            .container(dump)
            .recipe
            .as_ref()
            .map(|r| r.byproducts.iter().map(|(i, _)| *i).collect())
            .unwrap_or_default();
        for item in byproducts {
            drain_byproduct(graph, catalog, dump, item)?;
        }
    }

    chain_catalysts(graph, catalog)?;
    Ok(())
}

/// Byproduct-kind transfer unit already draining `item` out of `source`.
fn existing_drain(graph: &FactoryGraph, source: ContainerId, item: ItemId) -> Option<TransferUnitId> {
    graph.container(source).consumers.iter().find_map(|r| match r {
        FlowRef::Transfer(tu) => {
            let unit = graph.transfer_unit(*tu);
            (unit.kind == TransferKind::Byproduct && unit.item == item).then_some(*tu)
        }
        _ => None,
    })
}

fn drain_byproduct(
    graph: &mut FactoryGraph,
    catalog: &Catalog,
    source: ContainerId,
    item: ItemId,
) -> Result<(), ByproductError> {
    let rate = graph.ingress(source, item);
    if rate <= EPSILON {
        return Ok(());
    }

    // An existing drain on this container only needs its rate refreshed.
    if let Some(unit) = existing_drain(graph, source, item) {
        let old = graph.transfer_unit(unit).rate_from(source);
        graph.add_transfer_source_rate(unit, source, rate - old);
        graph.add_required_rate(unit, rate - old);
        return Ok(());
    }

    // Reuse another drain for the same item whose destination still has
    // incoming headroom for the grown unit count.
    let candidate = graph.transfer_units().find_map(|(id, tu)| {
        (tu.kind == TransferKind::Byproduct && tu.item == item && !tu.merged).then_some(id)
    });
    if let Some(unit) = candidate {
        let grown = {
            let tu = graph.transfer_unit(unit);
            let per_unit = tu.batch_size / tu.transfer_time;
            (((tu.required_rate + rate) / per_unit).ceil().max(1.0)) as u32
        };
        let current = graph.transfer_unit(unit).unit_count();
        let added = grown.saturating_sub(current);
        let dest_ok = match graph.transfer_unit(unit).output {
            StoreRef::Container(c) => graph.can_add_incoming_links(c, catalog, added),
            StoreRef::Transfer(tc) => graph.transfer_container_incoming_links_free(tc) >= added as i64,
        };
        if dest_ok && graph.can_add_outgoing_links(source, catalog, grown) {
            graph.add_transfer_source(unit, source, rate);
            graph.add_required_rate(unit, rate);
            return Ok(());
        }
    }

    // Fresh drain into the destination dump with the fewest drains feeding
    // it, creating a destination if none exists.
    let def = catalog
        .item(item)
        .ok_or(ByproductError::UnknownItem { item })?;
    let batch = def.transfer_batch_size;
    let time = def.transfer_time;
    let units = ((rate / (batch / time)).ceil().max(1.0)) as u32;

    let dest = graph
        .dump_containers_for(item)
        .into_iter()
        .filter(|&c| c != source && graph.can_add_incoming_links(c, catalog, units))
        .min_by_key(|&c| {
            graph
                .container(c)
                .producers
                .iter()
                .filter(|r| {
                    matches!(r, FlowRef::Transfer(tu)
                        if graph.transfer_unit(*tu).kind == TransferKind::Byproduct)
                })
                .count()
        });
    let dest = match dest {
        Some(c) => c,
        None => {
            let recipe = graph
                .node_for_item(item)
                .and_then(|n| graph.node(n).recipe().cloned());
            let container = graph.create_dump_container(item, recipe, None);
            if let Some(node) = graph.node_for_item(item) {
                if let Some(routes) = graph.node_mut(node).dump_routes_mut() {
                    routes.push(DumpRoute {
                        container,
                        relays: Vec::new(),
                        industries: Vec::new(),
                    });
                }
            }
            container
        }
    };
    if !graph.can_add_outgoing_links(source, catalog, units) {
        return Err(ByproductError::DrainCapacity { item });
    }
    let unit = graph.create_transfer_unit(
        item,
        batch,
        time,
        StoreRef::Container(dest),
        TransferKind::Byproduct,
        None,
    );
    graph.add_transfer_source(unit, source, rate);
    graph.add_required_rate(unit, rate);
    Ok(())
}

/// Balancer-kind unit moving `item` from `from` into `to`.
fn existing_balancer(
    graph: &FactoryGraph,
    from: ContainerId,
    to: ContainerId,
    item: ItemId,
) -> bool {
    graph.container(from).consumers.iter().any(|r| match r {
        FlowRef::Transfer(tu) => {
            let unit = graph.transfer_unit(*tu);
            unit.kind == TransferKind::Balancer
                && unit.item == item
                && unit.output == StoreRef::Container(to)
        }
        _ => false,
    })
}

/// Link every adjacent pair of catalyst dump containers in both
/// directions, padding odd chains with a companion dump so the loop can
/// circulate.
fn chain_catalysts(graph: &mut FactoryGraph, catalog: &Catalog) -> Result<(), ByproductError> {
    let catalysts: Vec<ItemId> = (0..catalog.item_count() as u32)
        .map(ItemId)
        .filter(|&i| catalog.item(i).is_some_and(|d| d.is_catalyst()))
        .collect();

    for item in catalysts {
        let mut dumps = graph.dump_containers_for(item);
        if dumps.is_empty() {
            continue;
        }
        if dumps.len() % 2 == 1 {
            let recipe = graph
                .node_for_item(item)
                .and_then(|n| graph.node(n).recipe().cloned());
            let companion = graph.create_dump_container(item, recipe, None);
            if let Some(node) = graph.node_for_item(item) {
                if let Some(routes) = graph.node_mut(node).dump_routes_mut() {
                    routes.push(DumpRoute {
                        container: companion,
                        relays: Vec::new(),
                        industries: Vec::new(),
                    });
                }
            }
            dumps.push(companion);
        }
        let def = catalog
            .item(item)
            .ok_or(ByproductError::UnknownItem { item })?;
        for pair in dumps.windows(2) {
            for (from, to) in [(pair[0], pair[1]), (pair[1], pair[0])] {
                if existing_balancer(graph, from, to, item) {
                    continue;
                }
                let unit = graph.create_transfer_unit(
                    item,
                    def.transfer_batch_size,
                    def.transfer_time,
                    StoreRef::Container(to),
                    TransferKind::Balancer,
                    None,
                );
                graph.add_transfer_source(unit, from, 0.0);
            }
        }
    }
    Ok(())
}
