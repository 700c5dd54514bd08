//! Fabrica Core -- the graph synthesis and routing engine for factory
//! production planning.
//!
//! Given a set of desired end products and rates, the planner synthesizes a
//! directed flow graph of storage containers and production/transfer units
//! that satisfies every consumer's input requirement while respecting
//! per-node connectivity limits.
//!
//! # Planning Pipeline
//!
//! Each call to [`plan::build_plan`] (or [`plan::extend_plan`] on an
//! existing graph) runs the following phases:
//!
//! 1. **Seed** -- Create a [`node::FactoryNode`] for every requested item
//!    and its full ingredient closure, with talent-scaled recipes.
//! 2. **Route** -- For each node, consumers first: relay routes wire
//!    consuming industries to relay containers, dump routes back each
//!    relay's demand with producing industries.
//! 3. **Post passes** -- Byproduct drains and catalyst chains, gas
//!    rebalancing, and link-overflow consolidation behind transfer
//!    containers.
//! 4. **Sanity check** -- [`validation::check_graph`] verifies the link,
//!    flow-balance, and rate invariants; any violation fails the build.
//! 5. **Merge** (optional) -- 1:1 dump/relay pairs collapse into single
//!    containers to save link budget.
//!
//! # Key Types
//!
//! - [`graph::FactoryGraph`] -- Arena-backed registry owning every entity,
//!   with bidirectional links kept consistent by paired mutations.
//! - [`catalog::Catalog`] -- Immutable item/recipe/talent tables (frozen at
//!   startup), the external lookup the router plans against.
//! - [`container::Container`] / [`container::TransferContainer`] -- Storage
//!   entities with per-side link budgets and reservations.
//! - [`flow::Industry`] / [`flow::TransferUnit`] -- Flow entities; a unit's
//!   multiplicity is both a display value and a link-capacity divisor.
//! - [`serialize`] -- Versioned, index-addressed JSON snapshots with
//!   talent-compatibility checks on import.

pub mod byproduct;
pub mod catalog;
pub mod container;
pub mod flow;
pub mod gas;
pub mod graph;
pub mod id;
pub mod merge;
pub mod node;
pub mod overflow;
pub mod plan;
pub mod router;
pub mod serialize;
pub mod validation;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

/// Tolerance for every floating-point rate comparison in the planner.
pub const EPSILON: f64 = 1e-8;
