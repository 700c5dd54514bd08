//! Post-build sanity checks.
//!
//! A correct build never trips these. Any violation reported here is a
//! router defect, not a user error, and the caller should discard the
//! graph rather than repair it.

use crate::catalog::Catalog;
use crate::container::MAX_CONTAINER_LINKS;
use crate::flow::MAX_INDUSTRY_LINKS;
use crate::graph::FactoryGraph;
use crate::id::ItemId;
use crate::EPSILON;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkSide {
    Incoming,
    Outgoing,
}

impl fmt::Display for LinkSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkSide::Incoming => f.write_str("incoming"),
            LinkSide::Outgoing => f.write_str("outgoing"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Violation {
    /// A container or transfer container exceeds its link budget.
    LinkCapExceeded {
        label: String,
        side: LinkSide,
        links: u32,
        budget: i64,
    },
    /// An industry kept more direct inputs than the cap allows.
    IndustryFanIn { label: String, inputs: usize },
    /// A container is drained faster than it is filled.
    FlowImbalance {
        label: String,
        item: ItemId,
        ingress: f64,
        egress: f64,
    },
    /// A transfer unit's source rates fall short of its obligation.
    RateShortfall {
        label: String,
        required: f64,
        actual: f64,
    },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::LinkCapExceeded {
                label,
                side,
                links,
                budget,
            } => write!(
                f,
                "container {label}: {links} {side} links exceed budget {budget}"
            ),
            Violation::IndustryFanIn { label, inputs } => write!(
                f,
                "industry {label}: {inputs} inputs exceed the cap of {MAX_INDUSTRY_LINKS}"
            ),
            Violation::FlowImbalance {
                label,
                item,
                ingress,
                egress,
            } => write!(
                f,
                "container {label}: egress {egress}/s of item {item:?} exceeds ingress {ingress}/s"
            ),
            Violation::RateShortfall {
                label,
                required,
                actual,
            } => write!(
                f,
                "transfer unit {label}: sources deliver {actual}/s of required {required}/s"
            ),
        }
    }
}

/// Check every structural invariant, returning all violations found.
pub fn check_graph(graph: &FactoryGraph, catalog: &Catalog) -> Vec<Violation> {
    let mut out = Vec::new();

    for (id, c) in graph.containers() {
        if c.merged {
            continue;
        }
        let incoming = graph.container_incoming_links(id);
        let outgoing = graph.container_outgoing_links(id);
        let free_in = graph.container_incoming_links_free(id, catalog);
        let free_out = graph.container_outgoing_links_free(id, catalog);
        if free_in < 0 {
            out.push(Violation::LinkCapExceeded {
                label: c.label.clone(),
                side: LinkSide::Incoming,
                links: incoming,
                budget: free_in + incoming as i64,
            });
        }
        if free_out < 0 {
            out.push(Violation::LinkCapExceeded {
                label: c.label.clone(),
                side: LinkSide::Outgoing,
                links: outgoing,
                budget: free_out + outgoing as i64,
            });
        }
        // Ore relays are filled from the world, not from producers.
        if !catalog.is_ore(c.item) {
            let ingress = graph.ingress(id, c.item);
            let egress = graph.egress(id, c.item);
            if egress > ingress + EPSILON {
                out.push(Violation::FlowImbalance {
                    label: c.label.clone(),
                    item: c.item,
                    ingress,
                    egress,
                });
            }
        }
    }

    for (id, tc) in graph.transfer_containers() {
        let incoming = graph.transfer_container_incoming_links(id);
        let outgoing = graph.transfer_container_outgoing_links(id);
        if incoming > MAX_CONTAINER_LINKS {
            out.push(Violation::LinkCapExceeded {
                label: tc.label.clone(),
                side: LinkSide::Incoming,
                links: incoming,
                budget: MAX_CONTAINER_LINKS as i64,
            });
        }
        if outgoing > MAX_CONTAINER_LINKS {
            out.push(Violation::LinkCapExceeded {
                label: tc.label.clone(),
                side: LinkSide::Outgoing,
                links: outgoing,
                budget: MAX_CONTAINER_LINKS as i64,
            });
        }
    }

    for (_, industry) in graph.industries() {
        if industry.inputs.len() > MAX_INDUSTRY_LINKS {
            out.push(Violation::IndustryFanIn {
                label: industry.label.clone(),
                inputs: industry.inputs.len(),
            });
        }
    }

    for (_, unit) in graph.transfer_units() {
        if unit.merged || catalog.is_ore(unit.item) {
            continue;
        }
        let actual = unit.total_rate();
        if actual + EPSILON < unit.required_rate {
            out.push(Violation::RateShortfall {
                label: unit.label.clone(),
                required: unit.required_rate,
                actual,
            });
        }
    }

    out
}
