//! Data file loading for the fabrica planner.
//!
//! Game content (items, recipes, talents) lives in RON, JSON, or TOML data
//! files. This crate deserializes those files and resolves every name
//! reference into a [`fabrica_core::catalog::Catalog`] ready for planning.

pub mod loader;
pub mod schema;

pub use loader::{load_catalog, DataLoadError};
