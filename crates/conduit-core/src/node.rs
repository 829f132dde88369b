//! Nodes: typed connection points owned by grid-anchored objects.
//!
//! A node only knows how to answer one question, "which other nodes can I
//! link to right now?" ([`NodeView::reachable_nodes`]). Grouping, merging
//! and splitting are entirely the scheduler's business.

use serde::{Deserialize, Serialize};
use slotmap::{SecondaryMap, SlotMap};

use crate::container::NodeContainer;
use crate::grid::{Direction, PipeDirection, Rotation};
use crate::id::{EntityId, GroupId, GroupKind, NodeId};
use crate::lookup::NodeLookup;

// ---------------------------------------------------------------------------
// Definitions
// ---------------------------------------------------------------------------

fn default_true() -> bool {
    true
}

/// The two halves of a docking connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DockingKind {
    /// The fixed half, e.g. a connector port built into the floor.
    Port,
    /// The movable half, e.g. a canister plugged into a port.
    Portable,
}

impl DockingKind {
    pub fn complement(self) -> Self {
        match self {
            DockingKind::Port => DockingKind::Portable,
            DockingKind::Portable => DockingKind::Port,
        }
    }
}

/// Shape of a node as written in prototype data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeShape {
    /// Links to every same-kind adjacent node on the four neighboring tiles.
    Adjacent,
    /// Links along the directions in its mask, e.g. a pipe segment.
    Directional {
        directions: PipeDirection,
        #[serde(default = "default_true")]
        rotation_aware: bool,
    },
    /// Links to the complementary docking kind on the same tile.
    Docking(DockingKind),
}

/// Describes one node slot of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDef {
    /// Slot name, unique within the owning container.
    pub name: String,
    pub kind: GroupKind,
    pub shape: NodeShape,
    /// Whether the node drops out of its group while its owner is unanchored.
    #[serde(default = "default_true")]
    pub needs_anchored: bool,
}

impl NodeDef {
    pub fn new(name: impl Into<String>, kind: GroupKind, shape: NodeShape) -> Self {
        Self {
            name: name.into(),
            kind,
            shape,
            needs_anchored: true,
        }
    }

    pub fn adjacent(name: impl Into<String>, kind: GroupKind) -> Self {
        Self::new(name, kind, NodeShape::Adjacent)
    }

    pub fn pipe(name: impl Into<String>, kind: GroupKind, directions: PipeDirection) -> Self {
        Self::new(
            name,
            kind,
            NodeShape::Directional {
                directions,
                rotation_aware: true,
            },
        )
    }

    pub fn docking(name: impl Into<String>, kind: GroupKind, docking: DockingKind) -> Self {
        Self::new(name, kind, NodeShape::Docking(docking))
    }

    /// Keep the node grouped even while its owner is loose.
    pub fn anchor_free(mut self) -> Self {
        self.needs_anchored = false;
        self
    }
}

// ---------------------------------------------------------------------------
// Variants
// ---------------------------------------------------------------------------

/// State of a directional node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectionalNode {
    base: PipeDirection,
    current: PipeDirection,
    rotation_aware: bool,
    connections_enabled: bool,
}

impl DirectionalNode {
    pub fn new(base: PipeDirection, rotation_aware: bool) -> Self {
        Self {
            base,
            current: base,
            rotation_aware,
            connections_enabled: true,
        }
    }

    /// Mask as configured, before rotation.
    pub fn base(&self) -> PipeDirection {
        self.base
    }

    /// Mask after applying the owner's rotation.
    pub fn current(&self) -> PipeDirection {
        self.current
    }

    pub fn rotation_aware(&self) -> bool {
        self.rotation_aware
    }

    pub fn connections_enabled(&self) -> bool {
        self.connections_enabled
    }

    pub(crate) fn set_connections_enabled(&mut self, enabled: bool) -> bool {
        let changed = self.connections_enabled != enabled;
        self.connections_enabled = enabled;
        changed
    }

    /// Recompute the current mask for `rotation`. Returns `true` if it changed.
    pub(crate) fn apply_rotation(&mut self, rotation: Rotation) -> bool {
        if !self.rotation_aware {
            return false;
        }
        let next = self.base.rotated(rotation);
        let changed = next != self.current;
        self.current = next;
        changed
    }
}

/// The closed set of node kinds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeVariant {
    Adjacent,
    Directional(DirectionalNode),
    Docking(DockingKind),
}

impl From<&NodeShape> for NodeVariant {
    fn from(shape: &NodeShape) -> Self {
        match shape {
            NodeShape::Adjacent => NodeVariant::Adjacent,
            NodeShape::Directional {
                directions,
                rotation_aware,
            } => NodeVariant::Directional(DirectionalNode::new(*directions, *rotation_aware)),
            NodeShape::Docking(kind) => NodeVariant::Docking(*kind),
        }
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// A graph vertex. Identity is `(owner, name)`; the scheduler hands out a
/// [`NodeId`] for it.
#[derive(Debug, Clone)]
pub struct Node {
    owner: EntityId,
    name: String,
    kind: GroupKind,
    pub(crate) variant: NodeVariant,
    needs_anchored: bool,
    /// Set once the owning container shuts down.
    pub(crate) deleting: bool,
    pub(crate) group: Option<GroupId>,
    pub(crate) net_id: u32,
    /// Out-of-band edges that ignore geometry.
    pub(crate) always_reachable: Vec<NodeId>,

    // Scheduler bookkeeping, meaningful only during a pass.
    pub(crate) flood_gen: u32,
    pub(crate) undirect_gen: u32,
    pub(crate) flagged_for_flood: bool,
    /// Undirected adjacency built during the current pass.
    pub(crate) reachable: Vec<NodeId>,
}

impl Node {
    pub(crate) fn from_def(owner: EntityId, def: &NodeDef) -> Self {
        Self {
            owner,
            name: def.name.clone(),
            kind: def.kind,
            variant: NodeVariant::from(&def.shape),
            needs_anchored: def.needs_anchored,
            deleting: false,
            group: None,
            net_id: 0,
            always_reachable: Vec::new(),
            flood_gen: 0,
            undirect_gen: 0,
            flagged_for_flood: false,
            reachable: Vec::new(),
        }
    }

    pub fn owner(&self) -> EntityId {
        self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    pub fn variant(&self) -> &NodeVariant {
        &self.variant
    }

    pub fn needs_anchored(&self) -> bool {
        self.needs_anchored
    }

    pub fn is_deleting(&self) -> bool {
        self.deleting
    }

    /// The group this node currently points at. May be stale mid-step;
    /// resolve through the scheduler.
    pub fn group(&self) -> Option<GroupId> {
        self.group
    }

    /// Diagnostic network number, stable for the lifetime of the group.
    pub fn net_id(&self) -> u32 {
        self.net_id
    }

    pub fn always_reachable(&self) -> &[NodeId] {
        &self.always_reachable
    }

    pub fn directional(&self) -> Option<&DirectionalNode> {
        match &self.variant {
            NodeVariant::Directional(pipe) => Some(pipe),
            _ => None,
        }
    }

    pub(crate) fn directional_mut(&mut self) -> Option<&mut DirectionalNode> {
        match &mut self.variant {
            NodeVariant::Directional(pipe) => Some(pipe),
            _ => None,
        }
    }

    /// Whether the node may take part in grouping at all.
    pub fn is_connectable<L: NodeLookup + ?Sized>(&self, lookup: &L) -> bool {
        !self.deleting && (!self.needs_anchored || lookup.is_anchored(self.owner))
    }
}

// ---------------------------------------------------------------------------
// Reachability
// ---------------------------------------------------------------------------

/// Borrowed view of the node tables plus the spatial lookup, enough to
/// answer reachability queries without touching scheduler state.
pub struct NodeView<'a, L: ?Sized> {
    pub(crate) nodes: &'a SlotMap<NodeId, Node>,
    pub(crate) containers: &'a SecondaryMap<EntityId, NodeContainer>,
    pub(crate) lookup: &'a L,
}

impl<L: NodeLookup + ?Sized> NodeView<'_, L> {
    fn connectable(&self, id: NodeId) -> Option<&Node> {
        self.nodes
            .get(id)
            .filter(|node| node.is_connectable(self.lookup))
    }

    /// Connectable nodes of `kind` owned by containers anchored on `entities`.
    fn candidates<'s>(
        &'s self,
        entities: Vec<EntityId>,
        kind: GroupKind,
    ) -> impl Iterator<Item = (NodeId, &'s Node)> + 's {
        entities
            .into_iter()
            .filter_map(|entity| self.containers.get(entity))
            .flat_map(|container| container.nodes().iter().copied())
            .filter_map(move |id| self.connectable(id).map(|node| (id, node)))
            .filter(move |(_, node)| node.kind == kind)
    }

    /// Every connectable, same-kind node `id` can link to directly.
    ///
    /// Pure: depends only on current placement, rotation and enable flags.
    /// Never contains `id` itself for well-formed variants.
    pub fn reachable_nodes(&self, id: NodeId) -> Vec<NodeId> {
        let Some(node) = self.connectable(id) else {
            return Vec::new();
        };

        let mut out: Vec<NodeId> = node
            .always_reachable
            .iter()
            .copied()
            .filter(|&other| {
                self.connectable(other)
                    .is_some_and(|target| target.kind == node.kind)
            })
            .collect();

        let Some(tile) = self.lookup.anchored_position(node.owner) else {
            return out;
        };

        match &node.variant {
            NodeVariant::Adjacent => {
                for dir in Direction::all() {
                    let entities = self.lookup.containers_in_direction(tile, dir);
                    out.extend(
                        self.candidates(entities, node.kind)
                            .filter(|(_, other)| matches!(other.variant, NodeVariant::Adjacent))
                            .map(|(other_id, _)| other_id),
                    );
                }
            }
            NodeVariant::Directional(pipe) => {
                if !pipe.connections_enabled {
                    return out;
                }
                for dir in pipe.current.directions() {
                    let entities = self.lookup.containers_in_direction(tile, dir);
                    out.extend(
                        self.candidates(entities, node.kind)
                            .filter(|(_, other)| match &other.variant {
                                NodeVariant::Directional(theirs) => {
                                    theirs.connections_enabled
                                        && theirs.current.contains(dir.opposite())
                                }
                                _ => false,
                            })
                            .map(|(other_id, _)| other_id),
                    );
                }
            }
            NodeVariant::Docking(docking) => {
                let wanted = docking.complement();
                let entities = self
                    .lookup
                    .containers_at(tile)
                    .into_iter()
                    .filter(|&entity| entity != node.owner)
                    .collect();
                out.extend(
                    self.candidates(entities, node.kind)
                        .filter(|(_, other)| other.variant == NodeVariant::Docking(wanted))
                        .map(|(other_id, _)| other_id),
                );
            }
        }

        out
    }
}
