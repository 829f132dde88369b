//! Data-driven node prototypes.
//!
//! Loads group kinds, node-container prototypes and scheduler settings from
//! RON, TOML or JSON files in a data directory.

pub mod loader;
pub mod schema;

pub use loader::{load_node_data, DataLoadError, NodeData, Prototype};
