//! Serde data file structs for node prototypes.
//!
//! These structs define the on-disk format for group kinds, node-container
//! prototypes and scheduler settings. They are deserialized from RON, JSON,
//! or TOML data files and then resolved into engine types by the loader.

use serde::Deserialize;

fn default_true() -> bool {
    true
}

// ===========================================================================
// Group kinds
// ===========================================================================

/// A group kind declaration. Kinds are numbered in file order.
#[derive(Debug, Clone, Deserialize)]
pub struct KindData {
    pub name: String,
}

// ===========================================================================
// Node prototypes
// ===========================================================================

/// One compass direction as written in data files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum DirectionData {
    North,
    East,
    South,
    West,
}

/// Which half of a docking connection a slot is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum DockingData {
    Port,
    Portable,
}

/// The connection shape of a node slot.
#[derive(Debug, Clone, Deserialize)]
pub enum ShapeData {
    Adjacent,
    Pipe {
        directions: Vec<DirectionData>,
        #[serde(default = "default_true")]
        rotation_aware: bool,
    },
    Docking(DockingData),
}

/// A node slot inside a prototype.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeSlotData {
    pub name: String,
    /// Name of a kind declared in the kinds file.
    pub kind: String,
    pub shape: ShapeData,
    #[serde(default = "default_true")]
    pub needs_anchored: bool,
    /// Names of sibling slots this slot is always linked to.
    #[serde(default)]
    pub links: Vec<String>,
}

/// A node-container prototype: the slots an entity of this type carries.
#[derive(Debug, Clone, Deserialize)]
pub struct PrototypeData {
    pub name: String,
    pub nodes: Vec<NodeSlotData>,
}

// ===========================================================================
// TOML wrappers (TOML does not support top-level arrays)
// ===========================================================================

/// Wrapper for a list of kinds in TOML format.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlKinds {
    pub kinds: Vec<KindData>,
}

/// Wrapper for a list of prototypes in TOML format.
#[derive(Debug, Clone, Deserialize)]
pub struct TomlPrototypes {
    pub prototypes: Vec<PrototypeData>,
}

// ===========================================================================
// Tests
// ===========================================================================
