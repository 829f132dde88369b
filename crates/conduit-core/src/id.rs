use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a game object that owns a node container.
    pub struct EntityId;

    /// Identifies a single node (connection point) in the node graph.
    pub struct NodeId;

    /// Identifies a group (connected component) in the scheduler's registry.
    /// Generational: a destroyed group's id never resolves again.
    pub struct GroupId;
}

/// The group-type tag. Only nodes with equal kinds can ever share a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupKind(pub u32);

/// Identifies a fluid (or any fungible content) carried by a network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ItemTypeId(pub u32);
