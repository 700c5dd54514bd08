//! Link-overflow consolidation.
//!
//! An industry may not keep more than [`MAX_INDUSTRY_LINKS`] direct inputs.
//! When routing leaves one over the cap, the smallest-quantity ingredients
//! are moved behind a shared transfer container: one transfer unit per
//! item keeps the supply flowing, and the industry ends up with a single
//! link to the transfer container instead.

use crate::catalog::Catalog;
use crate::flow::{StoreRef, TransferKind, MAX_INDUSTRY_LINKS};
use crate::graph::FactoryGraph;
use crate::id::{ContainerId, IndustryId, ItemId, TransferContainerId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OverflowError {
    #[error("item {item:?} is not registered in the catalog")]
    UnknownItem { item: ItemId },

    #[error("industry {label} needs {needed} relocatable inputs but only {available} are direct container links")]
    NotEnoughRelocatable {
        label: String,
        needed: usize,
        available: usize,
    },

    #[error("industry {label} lost its direct input for item {item:?} during consolidation")]
    RelocationFailed { label: String, item: ItemId },
}

/// Bring every over-linked industry back under the input cap.
pub fn consolidate_overflow(graph: &mut FactoryGraph, catalog: &Catalog) -> Result<(), OverflowError> {
    let over: Vec<IndustryId> = graph
        .industries()
        .filter(|(_, i)| i.inputs.len() > MAX_INDUSTRY_LINKS)
        .map(|(id, _)| id)
        .collect();
    for industry in over {
        consolidate_industry(graph, catalog, industry)?;
    }
    Ok(())
}

fn consolidate_industry(
    graph: &mut FactoryGraph,
    catalog: &Catalog,
    industry: IndustryId,
) -> Result<(), OverflowError> {
    let label = graph.industry(industry).label.clone();
    let exceeding = graph.industry(industry).inputs.len() - MAX_INDUSTRY_LINKS;
    let needed = exceeding + 1;

    // Smallest-quantity ingredients still supplied by a direct container
    // link. Relocating the minimal prefix frees `exceeding + 1` links and
    // the transfer container takes one back.
    let mut candidates: Vec<(ItemId, f64)> = graph
        .industry(industry)
        .recipe
        .ingredients
        .iter()
        .filter(|(i, _)| graph.industry_input_container_for(industry, *i).is_some())
        .copied()
        .collect();
    candidates.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
    if candidates.len() < needed {
        return Err(OverflowError::NotEnoughRelocatable {
            label,
            needed,
            available: candidates.len(),
        });
    }
    let mut items: Vec<ItemId> = candidates[..needed].iter().map(|(i, _)| *i).collect();
    items.sort();

    let moves: Vec<(ItemId, ContainerId, f64)> = items
        .iter()
        .map(|&item| {
            let container = graph
                .industry_input_container_for(industry, item)
                .ok_or_else(|| OverflowError::RelocationFailed {
                    label: label.clone(),
                    item,
                })?;
            let rate = graph.industry(industry).recipe.consumption_rate(item);
            Ok((item, container, rate))
        })
        .collect::<Result<_, OverflowError>>()?;

    let tc = match find_reusable(graph, industry, &items) {
        Some(tc) => {
            for &(item, container, rate) in &moves {
                let unit = graph
                    .transfer_container(tc)
                    .producers
                    .iter()
                    .copied()
                    .find(|&t| graph.transfer_unit(t).item == item)
                    .ok_or_else(|| OverflowError::RelocationFailed {
                        label: label.clone(),
                        item,
                    })?;
                if graph.transfer_unit(unit).draws_from(container) {
                    graph.add_transfer_source_rate(unit, container, rate);
                } else {
                    graph.add_transfer_source(unit, container, rate);
                }
                graph.add_required_rate(unit, rate);
            }
            tc
        }
        None => {
            let tc = graph.create_transfer_container(items.clone(), None);
            for &(item, container, rate) in &moves {
                let def = catalog
                    .item(item)
                    .ok_or(OverflowError::UnknownItem { item })?;
                let unit = graph.create_transfer_unit(
                    item,
                    def.transfer_batch_size,
                    def.transfer_time,
                    StoreRef::Transfer(tc),
                    TransferKind::Route,
                    None,
                );
                graph.add_transfer_source(unit, container, rate);
                graph.add_required_rate(unit, rate);
            }
            tc
        }
    };

    for &(item, container, _) in &moves {
        if !graph.remove_industry_input(industry, StoreRef::Container(container)) {
            return Err(OverflowError::RelocationFailed { label, item });
        }
    }
    graph.add_industry_input(industry, StoreRef::Transfer(tc));
    Ok(())
}

/// A transfer container holding exactly `items`, with outgoing headroom,
/// whose supplying units draw only from containers already feeding this
/// industry. Reusing one never reroutes a supply chain.
fn find_reusable(
    graph: &FactoryGraph,
    industry: IndustryId,
    items: &[ItemId],
) -> Option<TransferContainerId> {
    let direct: Vec<ContainerId> = graph
        .industry(industry)
        .inputs
        .iter()
        .filter_map(|s| match s {
            StoreRef::Container(c) => Some(*c),
            StoreRef::Transfer(_) => None,
        })
        .collect();
    graph.transfer_containers().find_map(|(id, tc)| {
        let fits = tc.holds_exactly(items)
            && graph.transfer_container_outgoing_links_free(id) >= 1
            && tc.producers.iter().all(|&tu| {
                graph
                    .transfer_unit(tu)
                    .sources
                    .iter()
                    .all(|s| direct.contains(&s.container))
            });
        fits.then_some(id)
    })
}
