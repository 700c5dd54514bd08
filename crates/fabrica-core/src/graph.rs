//! The node registry: [`FactoryGraph`] owns every live entity in per-kind
//! slotmap arenas and keeps all bidirectional links consistent.
//!
//! Entities are created only through the factory methods here (which assign
//! display labels and register back-references atomically) and are never
//! deleted, only flagged `merged`. Slot iteration order is therefore
//! insertion order, which keeps reuse scans, diffing, and serialization
//! deterministic across repeated builds.

use crate::catalog::{Catalog, Recipe};
use crate::container::{Container, ContainerRole, FlowRef, TransferContainer, MAX_CONTAINER_LINKS};
use crate::flow::{Industry, StoreRef, TransferKind, TransferSource, TransferUnit};
use crate::id::*;
use crate::node::{FactoryNode, NodeKind};
use slotmap::SlotMap;
use std::collections::BTreeMap;

// ---------------------------------------------------------------------------
// Label generation
// ---------------------------------------------------------------------------

/// Per-item label namespaces. Containers are additionally scoped by role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum LabelClass {
    RelayContainer,
    DumpContainer,
    Industry,
    TransferUnit,
}

impl LabelClass {
    fn prefix(self) -> &'static str {
        match self {
            LabelClass::RelayContainer => "R",
            LabelClass::DumpContainer => "D",
            LabelClass::Industry => "I",
            LabelClass::TransferUnit => "T",
        }
    }
}

/// Numeric suffix of a display label, e.g. 12 for "R12".
fn label_ordinal(label: &str) -> u32 {
    let digits: String = label.chars().filter(|c| c.is_ascii_digit()).collect();
    digits.parse().unwrap_or(0)
}

// ---------------------------------------------------------------------------
// FactoryGraph
// ---------------------------------------------------------------------------

/// The registry owning all live entities of a planning session.
#[derive(Debug, Default)]
pub struct FactoryGraph {
    pub(crate) nodes: SlotMap<NodeId, FactoryNode>,
    pub(crate) containers: SlotMap<ContainerId, Container>,
    pub(crate) transfer_containers: SlotMap<TransferContainerId, TransferContainer>,
    pub(crate) industries: SlotMap<IndustryId, Industry>,
    pub(crate) transfer_units: SlotMap<TransferUnitId, TransferUnit>,

    node_by_item: BTreeMap<ItemId, NodeId>,
    label_counters: BTreeMap<(ItemId, LabelClass), u32>,
    transfer_container_counter: u32,

    /// When false, mutations do not raise `changed` flags. Toggled by
    /// [`FactoryGraph::suppress_changes`] so merge/unmerge stay invisible
    /// to the diff display.
    track_changes: bool,
}

impl FactoryGraph {
    pub fn new() -> Self {
        Self {
            track_changes: true,
            ..Default::default()
        }
    }

    /// Run `f` with change tracking disabled, restoring the previous
    /// tracking state afterwards.
    pub fn suppress_changes<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let prev = self.track_changes;
        self.track_changes = false;
        let result = f(self);
        self.track_changes = prev;
        result
    }

    fn next_label(&mut self, item: ItemId, class: LabelClass) -> String {
        let counter = self.label_counters.entry((item, class)).or_insert(0);
        *counter += 1;
        format!("{}{}", class.prefix(), counter)
    }

    /// Record an externally supplied label so future auto-assignment never
    /// collides with it.
    fn absorb_label(&mut self, item: ItemId, class: LabelClass, label: &str) {
        let n = label_ordinal(label);
        let counter = self.label_counters.entry((item, class)).or_insert(0);
        *counter = (*counter).max(n);
    }

    // -----------------------------------------------------------------------
    // Node factory methods (idempotent per item)
    // -----------------------------------------------------------------------

    /// Create (or return the existing) leaf node for an ore item.
    pub fn create_ore_node(&mut self, item: ItemId) -> NodeId {
        if let Some(&id) = self.node_by_item.get(&item) {
            return id;
        }
        let id = self.nodes.insert(FactoryNode::new(item, NodeKind::Ore));
        self.node_by_item.insert(item, id);
        id
    }

    /// Create (or return the existing) production node for a craftable item.
    pub fn create_production_node(&mut self, item: ItemId, recipe: Recipe) -> NodeId {
        if let Some(&id) = self.node_by_item.get(&item) {
            return id;
        }
        let id = self.nodes.insert(FactoryNode::new(
            item,
            NodeKind::Production {
                recipe,
                dump_routes: Vec::new(),
                dump_routed: false,
            },
        ));
        self.node_by_item.insert(item, id);
        id
    }

    pub fn node_for_item(&self, item: ItemId) -> Option<NodeId> {
        self.node_by_item.get(&item).copied()
    }

    /// Register `consumer` as a consumer of `node`. Idempotent.
    pub fn add_node_consumer(&mut self, node: NodeId, consumer: NodeId) {
        let n = &mut self.nodes[node];
        if !n.consumers.contains(&consumer) {
            n.consumers.push(consumer);
        }
    }

    // -----------------------------------------------------------------------
    // Storage factory methods
    // -----------------------------------------------------------------------

    pub fn create_relay_container(
        &mut self,
        item: ItemId,
        recipe: Option<Recipe>,
        label: Option<String>,
    ) -> ContainerId {
        self.create_container(item, ContainerRole::Relay, recipe, label)
    }

    pub fn create_dump_container(
        &mut self,
        item: ItemId,
        recipe: Option<Recipe>,
        label: Option<String>,
    ) -> ContainerId {
        self.create_container(item, ContainerRole::Dump, recipe, label)
    }

    fn create_container(
        &mut self,
        item: ItemId,
        role: ContainerRole,
        recipe: Option<Recipe>,
        label: Option<String>,
    ) -> ContainerId {
        let class = match role {
            ContainerRole::Relay => LabelClass::RelayContainer,
            ContainerRole::Dump => LabelClass::DumpContainer,
        };
        let label = match label {
            Some(l) => {
                self.absorb_label(item, class, &l);
                l
            }
            None => self.next_label(item, class),
        };
        let changed = self.track_changes;
        self.containers.insert(Container {
            label,
            item,
            role,
            recipe,
            producers: Vec::new(),
            consumers: Vec::new(),
            output_rate: 0.0,
            maintain: 0.0,
            changed,
            merged: false,
        })
    }

    /// Create a transfer container holding exactly `items`.
    pub fn create_transfer_container(
        &mut self,
        mut items: Vec<ItemId>,
        label: Option<String>,
    ) -> TransferContainerId {
        items.sort();
        items.dedup();
        let label = match label {
            Some(l) => {
                self.transfer_container_counter =
                    self.transfer_container_counter.max(label_ordinal(&l));
                l
            }
            None => {
                self.transfer_container_counter += 1;
                format!("TC{}", self.transfer_container_counter)
            }
        };
        let changed = self.track_changes;
        self.transfer_containers.insert(TransferContainer {
            label,
            items,
            producers: Vec::new(),
            consumers: Vec::new(),
            changed,
        })
    }

    // -----------------------------------------------------------------------
    // Flow factory methods
    // -----------------------------------------------------------------------

    /// Create an industry producing `item` into `output`. Registers the
    /// producer back-reference on the output container.
    pub fn create_industry(
        &mut self,
        item: ItemId,
        recipe: Recipe,
        output: ContainerId,
        label: Option<String>,
    ) -> IndustryId {
        let label = match label {
            Some(l) => {
                self.absorb_label(item, LabelClass::Industry, &l);
                l
            }
            None => self.next_label(item, LabelClass::Industry),
        };
        let changed = self.track_changes;
        let id = self.industries.insert(Industry {
            label,
            item,
            recipe,
            output,
            inputs: Vec::new(),
            changed,
        });
        self.containers[output].producers.push(FlowRef::Industry(id));
        self.touch_container(output);
        id
    }

    /// Create a transfer unit moving `item` into `output`. Registers the
    /// producer back-reference on the destination.
    pub fn create_transfer_unit(
        &mut self,
        item: ItemId,
        batch_size: f64,
        transfer_time: f64,
        output: StoreRef,
        kind: TransferKind,
        label: Option<String>,
    ) -> TransferUnitId {
        let label = match label {
            Some(l) => {
                self.absorb_label(item, LabelClass::TransferUnit, &l);
                l
            }
            None => self.next_label(item, LabelClass::TransferUnit),
        };
        let changed = self.track_changes;
        let id = self.transfer_units.insert(TransferUnit {
            label,
            item,
            kind,
            output,
            sources: Vec::new(),
            required_rate: 0.0,
            batch_size,
            transfer_time,
            changed,
            merged: false,
        });
        match output {
            StoreRef::Container(c) => {
                self.containers[c].producers.push(FlowRef::Transfer(id));
                self.touch_container(c);
            }
            StoreRef::Transfer(tc) => {
                self.transfer_containers[tc].producers.push(id);
                self.touch_transfer_container(tc);
            }
        }
        id
    }

    // -----------------------------------------------------------------------
    // Pairwise link mutations
    // -----------------------------------------------------------------------

    /// Link a storage as an input of an industry, registering the consumer
    /// back-reference on the storage side.
    pub fn add_industry_input(&mut self, industry: IndustryId, store: StoreRef) {
        self.industries[industry].inputs.push(store);
        self.touch_industry(industry);
        match store {
            StoreRef::Container(c) => {
                self.containers[c].consumers.push(FlowRef::Industry(industry));
                self.touch_container(c);
            }
            StoreRef::Transfer(tc) => {
                self.transfer_containers[tc].consumers.push(industry);
                self.touch_transfer_container(tc);
            }
        }
    }

    /// Remove an industry input link (both sides). Returns true if the link
    /// existed.
    pub fn remove_industry_input(&mut self, industry: IndustryId, store: StoreRef) -> bool {
        let inputs = &mut self.industries[industry].inputs;
        let Some(pos) = inputs.iter().position(|s| *s == store) else {
            return false;
        };
        inputs.remove(pos);
        self.touch_industry(industry);
        match store {
            StoreRef::Container(c) => {
                self.containers[c]
                    .consumers
                    .retain(|r| *r != FlowRef::Industry(industry));
                self.touch_container(c);
            }
            StoreRef::Transfer(tc) => {
                self.transfer_containers[tc]
                    .consumers
                    .retain(|i| *i != industry);
                self.touch_transfer_container(tc);
            }
        }
        true
    }

    /// Attach a source container to a transfer unit with an initial rate,
    /// registering the consumer back-reference on the container.
    pub fn add_transfer_source(&mut self, unit: TransferUnitId, container: ContainerId, rate: f64) {
        let tu = &mut self.transfer_units[unit];
        debug_assert!(!tu.draws_from(container));
        tu.sources.push(TransferSource { container, rate });
        self.touch_transfer_unit(unit);
        self.containers[container]
            .consumers
            .push(FlowRef::Transfer(unit));
        self.touch_container(container);
    }

    /// Detach a source container from a transfer unit (both sides).
    pub fn remove_transfer_source(&mut self, unit: TransferUnitId, container: ContainerId) {
        let tu = &mut self.transfer_units[unit];
        tu.sources.retain(|s| s.container != container);
        self.touch_transfer_unit(unit);
        self.containers[container]
            .consumers
            .retain(|r| *r != FlowRef::Transfer(unit));
        self.touch_container(container);
    }

    /// Adjust the rate drawn from one source of a transfer unit.
    pub fn set_transfer_source_rate(
        &mut self,
        unit: TransferUnitId,
        container: ContainerId,
        rate: f64,
    ) {
        let tu = &mut self.transfer_units[unit];
        if let Some(src) = tu.sources.iter_mut().find(|s| s.container == container) {
            src.rate = rate;
        }
        self.touch_transfer_unit(unit);
    }

    /// Increase the rate drawn from an existing source of a transfer unit.
    pub fn add_transfer_source_rate(
        &mut self,
        unit: TransferUnitId,
        container: ContainerId,
        delta: f64,
    ) {
        let tu = &mut self.transfer_units[unit];
        if let Some(src) = tu.sources.iter_mut().find(|s| s.container == container) {
            src.rate += delta;
        }
        self.touch_transfer_unit(unit);
    }

    /// Raise a container's direct deliverable rate and maintained buffer.
    pub fn add_output_rate(&mut self, id: ContainerId, rate: f64, maintain: f64) {
        let c = &mut self.containers[id];
        c.output_rate += rate;
        c.maintain += maintain;
        self.touch_container(id);
    }

    pub fn add_required_rate(&mut self, unit: TransferUnitId, delta: f64) {
        self.transfer_units[unit].required_rate += delta;
        self.touch_transfer_unit(unit);
    }

    pub fn set_required_rate(&mut self, unit: TransferUnitId, rate: f64) {
        self.transfer_units[unit].required_rate = rate;
        self.touch_transfer_unit(unit);
    }

    // -----------------------------------------------------------------------
    // Change tracking
    // -----------------------------------------------------------------------

    fn touch_container(&mut self, id: ContainerId) {
        if self.track_changes {
            self.containers[id].changed = true;
        }
    }

    fn touch_transfer_container(&mut self, id: TransferContainerId) {
        if self.track_changes {
            self.transfer_containers[id].changed = true;
        }
    }

    fn touch_industry(&mut self, id: IndustryId) {
        if self.track_changes {
            self.industries[id].changed = true;
        }
    }

    fn touch_transfer_unit(&mut self, id: TransferUnitId) {
        if self.track_changes {
            self.transfer_units[id].changed = true;
        }
    }

    /// Clear every `changed` flag (used after import).
    pub fn clear_changed_flags(&mut self) {
        for (_, c) in self.containers.iter_mut() {
            c.changed = false;
        }
        for (_, tc) in self.transfer_containers.iter_mut() {
            tc.changed = false;
        }
        for (_, i) in self.industries.iter_mut() {
            i.changed = false;
        }
        for (_, t) in self.transfer_units.iter_mut() {
            t.changed = false;
        }
    }

    // -----------------------------------------------------------------------
    // Link-count arithmetic
    // -----------------------------------------------------------------------

    fn flow_ref_multiplicity(&self, r: FlowRef) -> u32 {
        match r {
            FlowRef::Industry(_) => 1,
            FlowRef::Transfer(tu) => self.transfer_units[tu].unit_count(),
        }
    }

    fn balancer_links(&self, refs: &[FlowRef]) -> u32 {
        refs.iter()
            .map(|r| match r {
                FlowRef::Transfer(tu) if self.transfer_units[*tu].kind == TransferKind::Balancer => {
                    self.transfer_units[*tu].unit_count()
                }
                _ => 0,
            })
            .sum()
    }

    fn byproduct_drain_count(&self, refs: &[FlowRef]) -> u32 {
        refs.iter()
            .filter(|r| {
                matches!(r, FlowRef::Transfer(tu)
                    if self.transfer_units[*tu].kind == TransferKind::Byproduct)
            })
            .count() as u32
    }

    pub fn container_incoming_links(&self, id: ContainerId) -> u32 {
        self.containers[id]
            .producers
            .iter()
            .map(|&r| self.flow_ref_multiplicity(r))
            .sum()
    }

    pub fn container_outgoing_links(&self, id: ContainerId) -> u32 {
        self.containers[id]
            .consumers
            .iter()
            .map(|&r| self.flow_ref_multiplicity(r))
            .sum()
    }

    /// Free incoming links after reservations. Negative means a guard was
    /// violated and the caller must roll back.
    pub fn container_incoming_links_free(&self, id: ContainerId, catalog: &Catalog) -> i64 {
        let c = &self.containers[id];
        let is_catalyst = catalog.item(c.item).map(|d| d.is_catalyst()).unwrap_or(false);
        let reserved = c.incoming_reservation(is_catalyst, self.balancer_links(&c.producers));
        MAX_CONTAINER_LINKS as i64
            - reserved as i64
            - self.container_incoming_links(id) as i64
    }

    /// Free outgoing links after reservations.
    pub fn container_outgoing_links_free(&self, id: ContainerId, catalog: &Catalog) -> i64 {
        let c = &self.containers[id];
        let is_catalyst = catalog.item(c.item).map(|d| d.is_catalyst()).unwrap_or(false);
        let reserved = c.outgoing_reservation(
            is_catalyst,
            self.balancer_links(&c.consumers),
            self.byproduct_drain_count(&c.consumers),
        );
        MAX_CONTAINER_LINKS as i64
            - reserved as i64
            - self.container_outgoing_links(id) as i64
    }

    pub fn can_add_incoming_links(&self, id: ContainerId, catalog: &Catalog, n: u32) -> bool {
        self.container_incoming_links_free(id, catalog) >= n as i64
    }

    pub fn can_add_outgoing_links(&self, id: ContainerId, catalog: &Catalog, n: u32) -> bool {
        self.container_outgoing_links_free(id, catalog) >= n as i64
    }

    pub fn transfer_container_incoming_links(&self, id: TransferContainerId) -> u32 {
        self.transfer_containers[id]
            .producers
            .iter()
            .map(|&tu| self.transfer_units[tu].unit_count())
            .sum()
    }

    pub fn transfer_container_outgoing_links(&self, id: TransferContainerId) -> u32 {
        self.transfer_containers[id].consumers.len() as u32
    }

    pub fn transfer_container_incoming_links_free(&self, id: TransferContainerId) -> i64 {
        MAX_CONTAINER_LINKS as i64 - self.transfer_container_incoming_links(id) as i64
    }

    pub fn transfer_container_outgoing_links_free(&self, id: TransferContainerId) -> i64 {
        MAX_CONTAINER_LINKS as i64 - self.transfer_container_outgoing_links(id) as i64
    }

    // -----------------------------------------------------------------------
    // Rate bookkeeping
    // -----------------------------------------------------------------------

    /// Units of `item` per second flowing into the container from all its
    /// producers.
    pub fn ingress(&self, id: ContainerId, item: ItemId) -> f64 {
        self.containers[id]
            .producers
            .iter()
            .map(|r| match r {
                FlowRef::Industry(ind) => {
                    let recipe = &self.industries[*ind].recipe;
                    if recipe.product == item {
                        recipe.production_rate()
                    } else {
                        recipe.byproduct_rate(item)
                    }
                }
                FlowRef::Transfer(tu) => {
                    let unit = &self.transfer_units[*tu];
                    if unit.item == item {
                        unit.total_rate()
                    } else {
                        0.0
                    }
                }
            })
            .sum()
    }

    /// Units of `item` per second leaving the container: the direct output
    /// rate plus consumer draws. Byproduct drains and catalyst balancers
    /// are excluded.
    pub fn egress(&self, id: ContainerId, item: ItemId) -> f64 {
        let c = &self.containers[id];
        let direct = if c.item == item { c.output_rate } else { 0.0 };
        direct
            + c.consumers
                .iter()
                .map(|r| match r {
                    FlowRef::Industry(ind) => self.industries[*ind].recipe.consumption_rate(item),
                    FlowRef::Transfer(tu) => {
                        let unit = &self.transfer_units[*tu];
                        if unit.kind == TransferKind::Route && unit.item == item {
                            unit.rate_from(id)
                        } else {
                            0.0
                        }
                    }
                })
                .sum::<f64>()
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn node(&self, id: NodeId) -> &FactoryNode {
        &self.nodes[id]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut FactoryNode {
        &mut self.nodes[id]
    }

    pub fn container(&self, id: ContainerId) -> &Container {
        &self.containers[id]
    }

    pub fn transfer_container(&self, id: TransferContainerId) -> &TransferContainer {
        &self.transfer_containers[id]
    }

    pub fn industry(&self, id: IndustryId) -> &Industry {
        &self.industries[id]
    }

    pub fn transfer_unit(&self, id: TransferUnitId) -> &TransferUnit {
        &self.transfer_units[id]
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &FactoryNode)> {
        self.nodes.iter()
    }

    pub fn containers(&self) -> impl Iterator<Item = (ContainerId, &Container)> {
        self.containers.iter()
    }

    pub fn transfer_containers(
        &self,
    ) -> impl Iterator<Item = (TransferContainerId, &TransferContainer)> {
        self.transfer_containers.iter()
    }

    pub fn industries(&self) -> impl Iterator<Item = (IndustryId, &Industry)> {
        self.industries.iter()
    }

    pub fn transfer_units(&self) -> impl Iterator<Item = (TransferUnitId, &TransferUnit)> {
        self.transfer_units.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    pub fn industry_count(&self) -> usize {
        self.industries.len()
    }

    pub fn transfer_unit_count(&self) -> usize {
        self.transfer_units.len()
    }

    pub fn transfer_container_count(&self) -> usize {
        self.transfer_containers.len()
    }

    /// True if any input of the industry already supplies `item`.
    pub fn industry_has_item_input(&self, industry: IndustryId, item: ItemId) -> bool {
        self.industries[industry].inputs.iter().any(|s| match s {
            StoreRef::Container(c) => self.containers[*c].item == item,
            StoreRef::Transfer(tc) => self.transfer_containers[*tc].holds(item),
        })
    }

    /// The direct container input currently supplying `item` to the
    /// industry, if any.
    pub fn industry_input_container_for(
        &self,
        industry: IndustryId,
        item: ItemId,
    ) -> Option<ContainerId> {
        self.industries[industry].inputs.iter().find_map(|s| match s {
            StoreRef::Container(c) if self.containers[*c].item == item => Some(*c),
            _ => None,
        })
    }

    /// Industries belonging to `consumer` whose recipe lists `item` but
    /// that have no input supplying it yet, in dump-route insertion order.
    pub fn industries_needing(&self, consumer: NodeId, item: ItemId) -> Vec<IndustryId> {
        let mut out = Vec::new();
        for dump in self.nodes[consumer].dump_routes() {
            for &ind in &dump.industries {
                if self.industries[ind].recipe.requires(item)
                    && !self.industry_has_item_input(ind, item)
                {
                    out.push(ind);
                }
            }
        }
        out
    }

    /// All unmerged dump containers storing `item`, in insertion order.
    pub fn dump_containers_for(&self, item: ItemId) -> Vec<ContainerId> {
        self.containers
            .iter()
            .filter(|(_, c)| c.item == item && c.role == ContainerRole::Dump && !c.merged)
            .map(|(id, _)| id)
            .collect()
    }
}
