//! Plan snapshots.
//!
//! The live graph is full of reference cycles, so the export flattens each
//! arena to an array and rewrites every cross-reference as an index into
//! the corresponding array. Items are recorded by name and recipes are not
//! stored at all: the importer re-derives them from its own catalog at the
//! recorded talent levels, after checking that its talents dominate the
//! levels the plan was built with.

use crate::catalog::{Catalog, TalentLevels};
use crate::container::{ContainerRole, FlowRef};
use crate::flow::{StoreRef, TransferKind, TransferSource};
use crate::graph::FactoryGraph;
use crate::id::{ContainerId, IndustryId, ItemId, NodeId, TransferContainerId, TransferUnitId};
use crate::node::{DumpRoute, NodeKind, RelayRoute};
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;
use std::collections::BTreeMap;
use thiserror::Error;

/// Marker distinguishing plan documents from arbitrary JSON.
pub const PLAN_FORMAT: &str = "fabrica-plan";
/// Bumped on any change to the document layout. Import requires an exact
/// match.
pub const PLAN_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("document format is {found:?}, expected {PLAN_FORMAT:?}")]
    BadFormat { found: String },

    #[error("document version {found} does not match supported version {expected}")]
    VersionMismatch { found: u32, expected: u32 },

    #[error("plan was built with talent {talent} at level {recorded}, importer has level {available}")]
    TalentExceeded {
        talent: String,
        recorded: u8,
        available: u8,
    },

    #[error("item {name:?} is not in the catalog")]
    UnknownItem { name: String },

    #[error("no recipe for item {name:?} at the recorded talent levels")]
    MissingRecipe { name: String },

    #[error("{what} index {index} is out of range")]
    BadIndex { what: &'static str, index: usize },

    #[error("entity reference points outside the graph")]
    DanglingRef,

    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Document records
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowIndex {
    Industry(usize),
    Transfer(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreIndex {
    Container(usize),
    Transfer(usize),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerRecord {
    pub label: String,
    pub item: usize,
    pub role: ContainerRole,
    pub output_rate: f64,
    pub maintain: f64,
    pub merged: bool,
    pub producers: Vec<FlowIndex>,
    pub consumers: Vec<FlowIndex>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferContainerRecord {
    pub label: String,
    pub items: Vec<usize>,
    pub producers: Vec<usize>,
    pub consumers: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndustryRecord {
    pub label: String,
    pub item: usize,
    pub output: usize,
    pub inputs: Vec<StoreIndex>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferUnitRecord {
    pub label: String,
    pub item: usize,
    pub kind: TransferKind,
    pub output: StoreIndex,
    pub sources: Vec<(usize, f64)>,
    pub required_rate: f64,
    pub merged: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayRouteRecord {
    pub container: usize,
    pub transfer_unit: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DumpRouteRecord {
    pub container: usize,
    pub relays: Vec<RelayRouteRecord>,
    pub industries: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductionRecord {
    pub dump_routed: bool,
    pub dump_routes: Vec<DumpRouteRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub item: usize,
    pub consumers: Vec<usize>,
    pub output_rate: f64,
    pub maintain: f64,
    pub routed: bool,
    pub relay_routes: Vec<RelayRouteRecord>,
    pub production: Option<ProductionRecord>,
}

/// The flat, index-addressed form of a planning session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanDocument {
    pub format: String,
    pub version: u32,
    pub talents: TalentLevels,
    pub items: Vec<String>,
    pub containers: Vec<ContainerRecord>,
    pub transfer_containers: Vec<TransferContainerRecord>,
    pub industries: Vec<IndustryRecord>,
    pub transfer_units: Vec<TransferUnitRecord>,
    pub nodes: Vec<NodeRecord>,
}

impl PlanDocument {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

struct Indexer {
    containers: SecondaryMap<ContainerId, usize>,
    transfer_containers: SecondaryMap<TransferContainerId, usize>,
    industries: SecondaryMap<IndustryId, usize>,
    transfer_units: SecondaryMap<TransferUnitId, usize>,
    nodes: SecondaryMap<NodeId, usize>,
    item_indices: BTreeMap<ItemId, usize>,
    item_names: Vec<String>,
}

impl Indexer {
    fn build(graph: &FactoryGraph, catalog: &Catalog) -> Result<Self, SnapshotError> {
        let mut ix = Indexer {
            containers: SecondaryMap::new(),
            transfer_containers: SecondaryMap::new(),
            industries: SecondaryMap::new(),
            transfer_units: SecondaryMap::new(),
            nodes: SecondaryMap::new(),
            item_indices: BTreeMap::new(),
            item_names: Vec::new(),
        };
        for (i, (id, c)) in graph.containers().enumerate() {
            ix.containers.insert(id, i);
            ix.intern(catalog, c.item)?;
        }
        for (i, (id, tc)) in graph.transfer_containers().enumerate() {
            ix.transfer_containers.insert(id, i);
            for &item in &tc.items {
                ix.intern(catalog, item)?;
            }
        }
        for (i, (id, ind)) in graph.industries().enumerate() {
            ix.industries.insert(id, i);
            ix.intern(catalog, ind.item)?;
        }
        for (i, (id, tu)) in graph.transfer_units().enumerate() {
            ix.transfer_units.insert(id, i);
            ix.intern(catalog, tu.item)?;
        }
        for (i, (id, node)) in graph.nodes().enumerate() {
            ix.nodes.insert(id, i);
            ix.intern(catalog, node.item)?;
        }
        Ok(ix)
    }

    fn intern(&mut self, catalog: &Catalog, item: ItemId) -> Result<usize, SnapshotError> {
        if let Some(&i) = self.item_indices.get(&item) {
            return Ok(i);
        }
        let name = catalog
            .item(item)
            .map(|d| d.name.clone())
            .ok_or(SnapshotError::DanglingRef)?;
        let i = self.item_names.len();
        self.item_names.push(name);
        self.item_indices.insert(item, i);
        Ok(i)
    }

    fn item(&self, item: ItemId) -> Result<usize, SnapshotError> {
        self.item_indices
            .get(&item)
            .copied()
            .ok_or(SnapshotError::DanglingRef)
    }

    fn container(&self, id: ContainerId) -> Result<usize, SnapshotError> {
        self.containers.get(id).copied().ok_or(SnapshotError::DanglingRef)
    }

    fn industry(&self, id: IndustryId) -> Result<usize, SnapshotError> {
        self.industries.get(id).copied().ok_or(SnapshotError::DanglingRef)
    }

    fn transfer_unit(&self, id: TransferUnitId) -> Result<usize, SnapshotError> {
        self.transfer_units
            .get(id)
            .copied()
            .ok_or(SnapshotError::DanglingRef)
    }

    fn node(&self, id: NodeId) -> Result<usize, SnapshotError> {
        self.nodes.get(id).copied().ok_or(SnapshotError::DanglingRef)
    }

    fn flow(&self, r: FlowRef) -> Result<FlowIndex, SnapshotError> {
        Ok(match r {
            FlowRef::Industry(i) => FlowIndex::Industry(self.industry(i)?),
            FlowRef::Transfer(t) => FlowIndex::Transfer(self.transfer_unit(t)?),
        })
    }

    fn store(&self, s: StoreRef) -> Result<StoreIndex, SnapshotError> {
        Ok(match s {
            StoreRef::Container(c) => StoreIndex::Container(self.container(c)?),
            StoreRef::Transfer(tc) => StoreIndex::Transfer(
                self.transfer_containers
                    .get(tc)
                    .copied()
                    .ok_or(SnapshotError::DanglingRef)?,
            ),
        })
    }

    fn relay(&self, r: &RelayRoute) -> Result<RelayRouteRecord, SnapshotError> {
        Ok(RelayRouteRecord {
            container: self.container(r.container)?,
            transfer_unit: self.transfer_unit(r.transfer_unit)?,
        })
    }
}

/// Flatten the graph into an index-addressed document.
pub fn export_plan(
    graph: &FactoryGraph,
    catalog: &Catalog,
    talents: &TalentLevels,
) -> Result<PlanDocument, SnapshotError> {
    let ix = Indexer::build(graph, catalog)?;

    let containers = graph
        .containers()
        .map(|(_, c)| {
            Ok(ContainerRecord {
                label: c.label.clone(),
                item: ix.item(c.item)?,
                role: c.role,
                output_rate: c.output_rate,
                maintain: c.maintain,
                merged: c.merged,
                producers: c.producers.iter().map(|&r| ix.flow(r)).collect::<Result<_, _>>()?,
                consumers: c.consumers.iter().map(|&r| ix.flow(r)).collect::<Result<_, _>>()?,
            })
        })
        .collect::<Result<_, SnapshotError>>()?;

    let transfer_containers = graph
        .transfer_containers()
        .map(|(_, tc)| {
            Ok(TransferContainerRecord {
                label: tc.label.clone(),
                items: tc.items.iter().map(|&i| ix.item(i)).collect::<Result<_, _>>()?,
                producers: tc
                    .producers
                    .iter()
                    .map(|&t| ix.transfer_unit(t))
                    .collect::<Result<_, _>>()?,
                consumers: tc
                    .consumers
                    .iter()
                    .map(|&i| ix.industry(i))
                    .collect::<Result<_, _>>()?,
            })
        })
        .collect::<Result<_, SnapshotError>>()?;

    let industries = graph
        .industries()
        .map(|(_, ind)| {
            Ok(IndustryRecord {
                label: ind.label.clone(),
                item: ix.item(ind.item)?,
                output: ix.container(ind.output)?,
                inputs: ind.inputs.iter().map(|&s| ix.store(s)).collect::<Result<_, _>>()?,
            })
        })
        .collect::<Result<_, SnapshotError>>()?;

    let transfer_units = graph
        .transfer_units()
        .map(|(_, tu)| {
            Ok(TransferUnitRecord {
                label: tu.label.clone(),
                item: ix.item(tu.item)?,
                kind: tu.kind,
                output: ix.store(tu.output)?,
                sources: tu
                    .sources
                    .iter()
                    .map(|s| Ok((ix.container(s.container)?, s.rate)))
                    .collect::<Result<_, SnapshotError>>()?,
                required_rate: tu.required_rate,
                merged: tu.merged,
            })
        })
        .collect::<Result<_, SnapshotError>>()?;

    let nodes = graph
        .nodes()
        .map(|(_, node)| {
            let production = match &node.kind {
                NodeKind::Ore => None,
                NodeKind::Production {
                    dump_routes,
                    dump_routed,
                    ..
                } => Some(ProductionRecord {
                    dump_routed: *dump_routed,
                    dump_routes: dump_routes
                        .iter()
                        .map(|d| {
                            Ok(DumpRouteRecord {
                                container: ix.container(d.container)?,
                                relays: d
                                    .relays
                                    .iter()
                                    .map(|r| ix.relay(r))
                                    .collect::<Result<_, _>>()?,
                                industries: d
                                    .industries
                                    .iter()
                                    .map(|&i| ix.industry(i))
                                    .collect::<Result<_, _>>()?,
                            })
                        })
                        .collect::<Result<_, SnapshotError>>()?,
                }),
            };
            Ok(NodeRecord {
                item: ix.item(node.item)?,
                consumers: node.consumers.iter().map(|&n| ix.node(n)).collect::<Result<_, _>>()?,
                output_rate: node.output_rate,
                maintain: node.maintain,
                routed: node.routed,
                relay_routes: node
                    .relay_routes
                    .iter()
                    .map(|r| ix.relay(r))
                    .collect::<Result<_, _>>()?,
                production,
            })
        })
        .collect::<Result<_, SnapshotError>>()?;

    Ok(PlanDocument {
        format: PLAN_FORMAT.to_string(),
        version: PLAN_FORMAT_VERSION,
        talents: talents.clone(),
        items: ix.item_names,
        containers,
        transfer_containers,
        industries,
        transfer_units,
        nodes,
    })
}

// ---------------------------------------------------------------------------
// Import
// ---------------------------------------------------------------------------

fn check_compatibility(
    doc: &PlanDocument,
    user_talents: &TalentLevels,
) -> Result<(), SnapshotError> {
    if doc.format != PLAN_FORMAT {
        return Err(SnapshotError::BadFormat {
            found: doc.format.clone(),
        });
    }
    if doc.version != PLAN_FORMAT_VERSION {
        return Err(SnapshotError::VersionMismatch {
            found: doc.version,
            expected: PLAN_FORMAT_VERSION,
        });
    }
    for (talent, recorded) in doc.talents.iter() {
        let available = user_talents.level(talent);
        if recorded > available {
            return Err(SnapshotError::TalentExceeded {
                talent: talent.to_string(),
                recorded,
                available,
            });
        }
    }
    Ok(())
}

fn lookup<T: Copy>(slice: &[T], index: usize, what: &'static str) -> Result<T, SnapshotError> {
    slice
        .get(index)
        .copied()
        .ok_or(SnapshotError::BadIndex { what, index })
}

/// Rebuild a graph from a document. Validation happens before any entity
/// is created, so a rejected import leaves no partial state behind.
pub fn import_plan(
    catalog: &Catalog,
    doc: &PlanDocument,
    user_talents: &TalentLevels,
) -> Result<FactoryGraph, SnapshotError> {
    check_compatibility(doc, user_talents)?;

    let items: Vec<ItemId> = doc
        .items
        .iter()
        .map(|name| {
            catalog
                .item_id(name)
                .ok_or_else(|| SnapshotError::UnknownItem { name: name.clone() })
        })
        .collect::<Result<_, _>>()?;
    let item_at = |index: usize| lookup(&items, index, "item");
    let item_name = |index: usize| {
        doc.items
            .get(index)
            .cloned()
            .unwrap_or_default()
    };

    let mut g = FactoryGraph::new();

    // Stage 1: containers, in export order so labels and indices line up.
    let container_ids: Vec<ContainerId> = doc
        .containers
        .iter()
        .map(|r| {
            let item = item_at(r.item)?;
            let recipe = catalog.scaled_recipe(item, &doc.talents);
            let id = match r.role {
                ContainerRole::Relay => {
                    g.create_relay_container(item, recipe, Some(r.label.clone()))
                }
                ContainerRole::Dump => {
                    g.create_dump_container(item, recipe, Some(r.label.clone()))
                }
            };
            let c = &mut g.containers[id];
            c.output_rate = r.output_rate;
            c.maintain = r.maintain;
            c.merged = r.merged;
            Ok(id)
        })
        .collect::<Result<_, SnapshotError>>()?;

    // Stage 2: transfer containers.
    let tc_ids: Vec<TransferContainerId> = doc
        .transfer_containers
        .iter()
        .map(|r| {
            let items = r
                .items
                .iter()
                .map(|&i| item_at(i))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(g.create_transfer_container(items, Some(r.label.clone())))
        })
        .collect::<Result<_, SnapshotError>>()?;

    // Stage 3: industries. Recipes come from the importer's catalog at the
    // recorded talent levels.
    let industry_ids: Vec<IndustryId> = doc
        .industries
        .iter()
        .map(|r| {
            let item = item_at(r.item)?;
            let recipe = catalog
                .scaled_recipe(item, &doc.talents)
                .ok_or_else(|| SnapshotError::MissingRecipe {
                    name: item_name(r.item),
                })?;
            let output = lookup(&container_ids, r.output, "container")?;
            Ok(g.create_industry(item, recipe, output, Some(r.label.clone())))
        })
        .collect::<Result<_, SnapshotError>>()?;

    // Stage 4: transfer units.
    let store_at = |s: StoreIndex| -> Result<StoreRef, SnapshotError> {
        Ok(match s {
            StoreIndex::Container(i) => StoreRef::Container(lookup(&container_ids, i, "container")?),
            StoreIndex::Transfer(i) => {
                StoreRef::Transfer(lookup(&tc_ids, i, "transfer container")?)
            }
        })
    };
    let tu_ids: Vec<TransferUnitId> = doc
        .transfer_units
        .iter()
        .map(|r| {
            let item = item_at(r.item)?;
            let def = catalog.item(item).ok_or_else(|| SnapshotError::UnknownItem {
                name: item_name(r.item),
            })?;
            let output = store_at(r.output)?;
            let id = g.create_transfer_unit(
                item,
                def.transfer_batch_size,
                def.transfer_time,
                output,
                r.kind,
                Some(r.label.clone()),
            );
            let tu = &mut g.transfer_units[id];
            tu.required_rate = r.required_rate;
            tu.merged = r.merged;
            Ok(id)
        })
        .collect::<Result<_, SnapshotError>>()?;

    // Stage 5: nodes.
    let node_ids: Vec<NodeId> = doc
        .nodes
        .iter()
        .map(|r| {
            let item = item_at(r.item)?;
            let id = if r.production.is_some() {
                let recipe = catalog
                    .scaled_recipe(item, &doc.talents)
                    .ok_or_else(|| SnapshotError::MissingRecipe {
                        name: item_name(r.item),
                    })?;
                g.create_production_node(item, recipe)
            } else {
                g.create_ore_node(item)
            };
            let node = g.node_mut(id);
            node.output_rate = r.output_rate;
            node.maintain = r.maintain;
            node.routed = r.routed;
            Ok(id)
        })
        .collect::<Result<_, SnapshotError>>()?;

    // Link stage: overwrite every relationship list from the records. The
    // factory methods above registered provisional back-references; these
    // assignments replace them wholesale.
    let flow_at = |f: FlowIndex| -> Result<FlowRef, SnapshotError> {
        Ok(match f {
            FlowIndex::Industry(i) => FlowRef::Industry(lookup(&industry_ids, i, "industry")?),
            FlowIndex::Transfer(i) => FlowRef::Transfer(lookup(&tu_ids, i, "transfer unit")?),
        })
    };
    let relay_at = |r: &RelayRouteRecord| -> Result<RelayRoute, SnapshotError> {
        Ok(RelayRoute {
            container: lookup(&container_ids, r.container, "container")?,
            transfer_unit: lookup(&tu_ids, r.transfer_unit, "transfer unit")?,
        })
    };

    for (record, &id) in doc.containers.iter().zip(&container_ids) {
        let producers = record
            .producers
            .iter()
            .map(|&f| flow_at(f))
            .collect::<Result<_, _>>()?;
        let consumers = record
            .consumers
            .iter()
            .map(|&f| flow_at(f))
            .collect::<Result<_, _>>()?;
        let c = &mut g.containers[id];
        c.producers = producers;
        c.consumers = consumers;
    }
    for (record, &id) in doc.transfer_containers.iter().zip(&tc_ids) {
        let producers = record
            .producers
            .iter()
            .map(|&i| lookup(&tu_ids, i, "transfer unit"))
            .collect::<Result<_, _>>()?;
        let consumers = record
            .consumers
            .iter()
            .map(|&i| lookup(&industry_ids, i, "industry"))
            .collect::<Result<_, _>>()?;
        let tc = &mut g.transfer_containers[id];
        tc.producers = producers;
        tc.consumers = consumers;
    }
    for (record, &id) in doc.industries.iter().zip(&industry_ids) {
        let inputs = record
            .inputs
            .iter()
            .map(|&s| store_at(s))
            .collect::<Result<_, _>>()?;
        g.industries[id].inputs = inputs;
    }
    for (record, &id) in doc.transfer_units.iter().zip(&tu_ids) {
        let sources = record
            .sources
            .iter()
            .map(|&(i, rate)| {
                Ok(TransferSource {
                    container: lookup(&container_ids, i, "container")?,
                    rate,
                })
            })
            .collect::<Result<_, SnapshotError>>()?;
        g.transfer_units[id].sources = sources;
    }
    for (record, &id) in doc.nodes.iter().zip(&node_ids) {
        let consumers = record
            .consumers
            .iter()
            .map(|&i| lookup(&node_ids, i, "node"))
            .collect::<Result<_, _>>()?;
        let relay_routes = record
            .relay_routes
            .iter()
            .map(relay_at)
            .collect::<Result<_, _>>()?;
        let node = g.node_mut(id);
        node.consumers = consumers;
        node.relay_routes = relay_routes;
        if let Some(production) = &record.production {
            let dump_routes = production
                .dump_routes
                .iter()
                .map(|d| {
                    Ok(DumpRoute {
                        container: lookup(&container_ids, d.container, "container")?,
                        relays: d.relays.iter().map(relay_at).collect::<Result<_, _>>()?,
                        industries: d
                            .industries
                            .iter()
                            .map(|&i| lookup(&industry_ids, i, "industry"))
                            .collect::<Result<_, _>>()?,
                    })
                })
                .collect::<Result<_, SnapshotError>>()?;
            if let NodeKind::Production {
                dump_routes: routes,
                dump_routed,
                ..
            } = &mut g.node_mut(id).kind
            {
                *routes = dump_routes;
                *dump_routed = production.dump_routed;
            }
        }
    }

    g.clear_changed_flags();
    Ok(g)
}
