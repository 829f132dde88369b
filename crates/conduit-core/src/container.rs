//! Node containers: the per-entity set of named node slots, and the
//! lifecycle hooks game code calls when the owning entity changes.

use std::collections::BTreeSet;

use tracing::debug;

use crate::graph::{GraphError, NodeGraph};
use crate::group::NetResource;
use crate::grid::Direction;
use crate::id::{EntityId, NodeId};
use crate::lookup::NodeLookup;
use crate::node::{Node, NodeDef};

/// Named node slots belonging to one entity.
#[derive(Debug, Clone)]
pub struct NodeContainer {
    entity: EntityId,
    nodes: Vec<NodeId>,
}

impl NodeContainer {
    pub fn entity(&self) -> EntityId {
        self.entity
    }

    /// Node ids in slot definition order.
    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }
}

impl<R: NetResource> NodeGraph<R> {
    /// Create a container for `entity` with one node per definition and
    /// queue every node for its first flood.
    ///
    /// Directional nodes pick up the entity's current rotation right away.
    pub fn spawn_container<L: NodeLookup + ?Sized>(
        &mut self,
        entity: EntityId,
        defs: &[NodeDef],
        lookup: &L,
    ) -> Result<Vec<NodeId>, GraphError> {
        if self.containers.contains_key(entity) {
            return Err(GraphError::ContainerExists(entity));
        }
        let mut seen = BTreeSet::new();
        for def in defs {
            if !seen.insert(def.name.as_str()) {
                return Err(GraphError::DuplicateSlot {
                    entity,
                    name: def.name.clone(),
                });
            }
        }

        let rotation = lookup.rotation(entity);
        let mut ids = Vec::with_capacity(defs.len());
        for def in defs {
            let mut node = Node::from_def(entity, def);
            if let Some(pipe) = node.directional_mut() {
                pipe.apply_rotation(rotation);
            }
            ids.push(self.nodes.insert(node));
        }
        self.containers.insert(
            entity,
            NodeContainer {
                entity,
                nodes: ids.clone(),
            },
        );
        for &id in &ids {
            self.queue_reflood(id);
        }
        debug!(?entity, nodes = ids.len(), "spawned node container");
        Ok(ids)
    }

    /// Tear down `entity`'s container. Its nodes are marked deleting at once
    /// and leave the graph on the next pass.
    ///
    /// Returns `false` if the entity had no container.
    pub fn shutdown_container(&mut self, entity: EntityId) -> bool {
        let Some(container) = self.containers.remove(entity) else {
            return false;
        };
        for &id in &container.nodes {
            if let Some(node) = self.nodes.get_mut(id) {
                node.deleting = true;
            }
            self.queue_removal(id);
        }
        true
    }

    /// The entity was anchored or unanchored.
    ///
    /// Anchoring refloods every node. Unanchoring removes the nodes that need
    /// an anchor from their groups and regroups the rest.
    pub fn anchor_changed<L: NodeLookup + ?Sized>(&mut self, entity: EntityId, lookup: &L) {
        let Some(container) = self.containers.get(entity) else {
            return;
        };
        let ids = container.nodes.clone();

        if lookup.is_anchored(entity) {
            let rotation = lookup.rotation(entity);
            for &id in &ids {
                if let Some(pipe) = self.nodes.get_mut(id).and_then(Node::directional_mut) {
                    pipe.apply_rotation(rotation);
                }
                self.queue_reflood(id);
            }
        } else {
            for &id in &ids {
                let Some(node) = self.nodes.get(id) else {
                    continue;
                };
                if node.needs_anchored() {
                    self.queue_removal(id);
                } else {
                    // Still connectable, but its geometric links are gone.
                    if let Some(group) = node.group() {
                        self.queue_remake(group);
                    }
                    self.queue_reflood(id);
                }
            }
        }
    }

    /// The entity turned. Rotation-aware directional nodes recompute their
    /// masks; every node whose mask changed is reflooded together with the
    /// directional nodes of its kind on the neighboring tiles.
    pub fn rotated<L: NodeLookup + ?Sized>(&mut self, entity: EntityId, lookup: &L) {
        let Some(container) = self.containers.get(entity) else {
            return;
        };
        let ids = container.nodes.clone();
        let rotation = lookup.rotation(entity);

        let mut changed = Vec::new();
        for id in ids {
            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            let kind = node.kind();
            if node.directional_mut().is_some_and(|pipe| pipe.apply_rotation(rotation)) {
                changed.push((id, kind));
            }
        }
        if changed.is_empty() {
            return;
        }

        let mut neighbors = Vec::new();
        if let Some(tile) = lookup.anchored_position(entity) {
            for dir in Direction::all() {
                for other in lookup.containers_in_direction(tile, dir) {
                    if let Some(container) = self.containers.get(other) {
                        neighbors.extend(container.nodes.iter().copied());
                    }
                }
            }
        }

        for (id, kind) in changed {
            self.queue_reflood(id);
            for &other in &neighbors {
                if self
                    .nodes
                    .get(other)
                    .is_some_and(|n| n.kind() == kind && n.directional().is_some())
                {
                    self.queue_reflood(other);
                }
            }
        }
    }

    pub fn container(&self, entity: EntityId) -> Option<&NodeContainer> {
        self.containers.get(entity)
    }

    /// Look up a node by its slot name.
    pub fn node_by_name(&self, entity: EntityId, name: &str) -> Option<NodeId> {
        self.containers
            .get(entity)?
            .nodes
            .iter()
            .copied()
            .find(|&id| self.nodes.get(id).is_some_and(|node| node.name() == name))
    }
}
