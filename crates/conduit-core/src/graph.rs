//! The topology scheduler.
//!
//! [`NodeGraph`] owns every node, container and group. Game code queues
//! topology changes during a step; [`NodeGraph::update`] drains the queues
//! once and recomputes group membership for the affected region:
//!
//! 1. **Removal** -- excise queued nodes; their groups are marked for remake.
//! 2. **Remake** -- tear marked groups down; their members are reflooded.
//! 3. **Closure** -- recompute reachability of every reflood node and
//!    symmetrize it. Touching a node that still has a live group pulls that
//!    whole group into the pass, so the worklist grows to a fixpoint.
//! 4. **Flood** -- breadth-first fill over the undirected edges; each fill
//!    becomes one new group.
//! 5. **Resolve** -- every torn-down group hands its resource to the new
//!    groups its former members ended up in ([`NetResource::split`]).
//!
//! Nothing here fails for topology reasons. Inconsistencies are logged and
//! degrade to a missing group, never to a halted step.

use std::collections::{BTreeMap, BTreeSet};

use slotmap::{SecondaryMap, SlotMap};
use tracing::{debug, error, trace, warn};

use crate::config::GraphConfig;
use crate::container::NodeContainer;
use crate::event::{GraphEvent, PassReport};
use crate::group::{Group, NetResource};
use crate::id::{EntityId, GroupId, GroupKind, NodeId};
use crate::lookup::NodeLookup;
use crate::node::{Node, NodeView};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Errors from container management. Topology itself never errors.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    #[error("entity {0:?} already owns a node container")]
    ContainerExists(EntityId),
    #[error("duplicate node slot '{name}' on entity {entity:?}")]
    DuplicateSlot { entity: EntityId, name: String },
}

// ---------------------------------------------------------------------------
// Pass state
// ---------------------------------------------------------------------------

/// Scratch state threaded through the phases of one pass.
struct Pass<R> {
    generation: u32,
    /// Nodes to (re)examine. Grows during the closure phase.
    worklist: Vec<NodeId>,
    /// Groups torn down this pass, kept until their resources are resolved.
    released: Vec<Group<R>>,
    report: PassReport,
}

// ---------------------------------------------------------------------------
// NodeGraph
// ---------------------------------------------------------------------------

/// Nodes, containers and groups, plus the queues that drive regrouping.
///
/// `R` is the shared state each group owns; use `()` for networks that only
/// need connectivity.
#[derive(Debug)]
pub struct NodeGraph<R = ()> {
    pub(crate) nodes: SlotMap<NodeId, Node>,
    pub(crate) containers: SecondaryMap<EntityId, NodeContainer>,
    groups: SlotMap<GroupId, Group<R>>,

    to_reflood: BTreeSet<NodeId>,
    to_remove: BTreeSet<NodeId>,
    to_remake: BTreeSet<GroupId>,

    generation: u32,
    next_net_id: u32,
    events: Vec<GraphEvent>,
    config: GraphConfig,
}

impl<R: NetResource> Default for NodeGraph<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: NetResource> NodeGraph<R> {
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    pub fn with_config(config: GraphConfig) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            containers: SecondaryMap::new(),
            groups: SlotMap::with_key(),
            to_reflood: BTreeSet::new(),
            to_remove: BTreeSet::new(),
            to_remake: BTreeSet::new(),
            generation: 0,
            next_net_id: 1,
            events: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Queued mutations
    // -----------------------------------------------------------------------

    /// Queue a node to have its grouping re-examined on the next pass.
    /// Returns `false` for stale or deleting nodes.
    pub fn queue_reflood(&mut self, node: NodeId) -> bool {
        let Some(data) = self.nodes.get_mut(node) else {
            debug!(?node, "reflood requested for unknown node");
            return false;
        };
        if data.deleting {
            return false;
        }
        data.flagged_for_flood = true;
        self.to_reflood.insert(node);
        true
    }

    /// Queue a node to be detached from its group on the next pass.
    pub fn queue_removal(&mut self, node: NodeId) -> bool {
        if !self.nodes.contains_key(node) {
            debug!(?node, "removal requested for unknown node");
            return false;
        }
        self.to_remove.insert(node);
        true
    }

    /// Queue a whole group to be rebuilt from scratch on the next pass.
    pub fn queue_remake(&mut self, group: GroupId) -> bool {
        if !self.groups.contains_key(group) {
            debug!(?group, "remake requested for stale group");
            return false;
        }
        self.to_remake.insert(group);
        true
    }

    /// Returns true if a pass would do any work.
    pub fn has_pending_work(&self) -> bool {
        !(self.to_reflood.is_empty() && self.to_remove.is_empty() && self.to_remake.is_empty())
    }

    // -----------------------------------------------------------------------
    // Immediate creation
    // -----------------------------------------------------------------------

    /// Give `node` a group right now, bypassing the batched pass.
    ///
    /// A node that already has a live group keeps it. A node that is not
    /// connectable right now gets none. The fresh group is a normal group: a
    /// later pass merges it with neighbors as usual.
    pub fn create_single_net_immediate<L: NodeLookup + ?Sized>(
        &mut self,
        node: NodeId,
        lookup: &L,
    ) -> Option<GroupId> {
        let data = self.nodes.get(node)?;
        if !data.is_connectable(lookup) {
            return None;
        }
        if let Some(group) = data.group
            && self.groups.contains_key(group)
        {
            return Some(group);
        }
        let kind = data.kind();
        Some(self.create_group(kind, vec![node]))
    }

    // -----------------------------------------------------------------------
    // Node-level tweaks
    // -----------------------------------------------------------------------

    /// Toggle a directional node's connections. The change cannot be
    /// localized, so the node's group is rebuilt.
    ///
    /// Returns `true` if the flag actually changed.
    pub fn set_connections_enabled(&mut self, node: NodeId, enabled: bool) -> bool {
        let Some(data) = self.nodes.get_mut(node) else {
            return false;
        };
        let group = data.group;
        let changed = data
            .directional_mut()
            .is_some_and(|pipe| pipe.set_connections_enabled(enabled));
        if changed {
            if let Some(group) = group {
                self.queue_remake(group);
            }
            self.queue_reflood(node);
        }
        changed
    }

    /// Add a geometry-independent edge between two same-kind nodes.
    ///
    /// Returns `false` if either id is stale, the nodes are the same, the
    /// kinds differ, or the edge already exists.
    pub fn add_always_reachable(&mut self, a: NodeId, b: NodeId) -> bool {
        if a == b {
            return false;
        }
        let (Some(na), Some(nb)) = (self.nodes.get(a), self.nodes.get(b)) else {
            return false;
        };
        if na.kind() != nb.kind() || na.always_reachable.contains(&b) {
            return false;
        }
        self.nodes[a].always_reachable.push(b);
        self.nodes[b].always_reachable.push(a);
        self.requeue_pair(a, b);
        true
    }

    /// Remove an edge added with [`add_always_reachable`](Self::add_always_reachable).
    pub fn remove_always_reachable(&mut self, a: NodeId, b: NodeId) -> bool {
        let Some(na) = self.nodes.get_mut(a) else {
            return false;
        };
        let before = na.always_reachable.len();
        na.always_reachable.retain(|&n| n != b);
        if na.always_reachable.len() == before {
            return false;
        }
        if let Some(nb) = self.nodes.get_mut(b) {
            nb.always_reachable.retain(|&n| n != a);
        }
        self.requeue_pair(a, b);
        true
    }

    fn requeue_pair(&mut self, a: NodeId, b: NodeId) {
        for node in [a, b] {
            if let Some(group) = self.nodes.get(node).and_then(|n| n.group) {
                self.queue_remake(group);
            }
            self.queue_reflood(node);
        }
    }

    // -----------------------------------------------------------------------
    // The pass
    // -----------------------------------------------------------------------

    /// Drain all queues and regroup the affected nodes. Call once per step.
    pub fn update<L: NodeLookup + ?Sized>(&mut self, lookup: &L) -> PassReport {
        if !self.has_pending_work() {
            return PassReport::default();
        }

        self.generation = self.generation.wrapping_add(1).max(1);
        let mut pass = Pass {
            generation: self.generation,
            worklist: Vec::new(),
            released: Vec::new(),
            report: PassReport::default(),
        };

        self.remove_queued(&mut pass);

        pass.worklist.extend(std::mem::take(&mut self.to_reflood));
        for group in std::mem::take(&mut self.to_remake) {
            self.release_group(group, &mut pass);
        }

        self.build_undirected(lookup, &mut pass);
        self.flood_all(lookup, &mut pass);
        self.resolve_resources(&mut pass);
        self.check_grouping(lookup, &mut pass);

        let report = pass.report;
        debug!(
            removed = report.removed,
            remade = report.remade,
            reflooded = report.reflooded,
            created = report.groups_created,
            destroyed = report.groups_destroyed,
            healed = report.healed,
            "node graph pass"
        );
        report
    }

    /// Phase 1: detach queued nodes and forget deleted ones.
    fn remove_queued(&mut self, pass: &mut Pass<R>) {
        for id in std::mem::take(&mut self.to_remove) {
            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            if let Some(group_id) = node.group.take() {
                node.net_id = 0;
                if let Some(group) = self.groups.get_mut(group_id) {
                    group.members.remove(&id);
                    self.to_remake.insert(group_id);
                }
            }
            pass.report.removed += 1;

            if node.deleting {
                let partners = std::mem::take(&mut node.always_reachable);
                for partner in partners {
                    if let Some(other) = self.nodes.get_mut(partner) {
                        other.always_reachable.retain(|&n| n != id);
                    }
                }
                self.nodes.remove(id);
                self.to_reflood.remove(&id);
                self.emit(GraphEvent::NodeRemoved { node: id });
            }
        }
    }

    /// Phase 2 (and on demand during phase 3): tear a group down and queue
    /// every member for reflood. The group object is kept on the pass so
    /// its resource can be handed on.
    fn release_group(&mut self, group_id: GroupId, pass: &mut Pass<R>) {
        let Some(group) = self.groups.remove(group_id) else {
            return;
        };
        for &member in &group.members {
            let Some(node) = self.nodes.get_mut(member) else {
                continue;
            };
            node.group = None;
            if !node.flagged_for_flood {
                node.flagged_for_flood = true;
                pass.worklist.push(member);
            }
        }
        pass.report.remade += 1;
        pass.report.groups_destroyed += 1;
        self.emit(GraphEvent::GroupDestroyed {
            group: group_id,
            kind: group.kind(),
        });
        pass.released.push(group);
    }

    /// Phase 3: compute reachability for the worklist and record it as
    /// undirected edges on both endpoints.
    fn build_undirected<L: NodeLookup + ?Sized>(&mut self, lookup: &L, pass: &mut Pass<R>) {
        let generation = pass.generation;
        let mut i = 0;
        while i < pass.worklist.len() {
            let id = pass.worklist[i];
            i += 1;

            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            let kind = node.kind();
            let group = node.group;
            let connectable = node.is_connectable(lookup);
            if let Some(group) = group {
                self.release_group(group, pass);
            }
            if !connectable {
                continue;
            }
            self.clear_reachable_if_stale(id, generation);
            pass.report.reflooded += 1;

            let reachable = self.reachable_nodes(id, lookup);
            for other in reachable {
                if other == id {
                    warn!(node = ?id, "node reports itself as reachable; ignoring");
                    continue;
                }
                let Some(target) = self.nodes.get(other) else {
                    continue;
                };
                if target.kind() != kind {
                    continue;
                }
                if let Some(group) = target.group {
                    // Expanding into a live group: rebuild it uniformly.
                    self.release_group(group, pass);
                }

                self.clear_reachable_if_stale(other, generation);
                let target = &mut self.nodes[other];
                if !target.flagged_for_flood {
                    target.flagged_for_flood = true;
                    pass.worklist.push(other);
                }
                if !target.reachable.contains(&id) {
                    target.reachable.push(id);
                }
                let node = &mut self.nodes[id];
                if !node.reachable.contains(&other) {
                    node.reachable.push(other);
                }
            }
        }
    }

    fn clear_reachable_if_stale(&mut self, id: NodeId, generation: u32) {
        if let Some(node) = self.nodes.get_mut(id)
            && node.undirect_gen != generation
        {
            node.reachable.clear();
            node.undirect_gen = generation;
        }
    }

    /// Phase 4: every worklist node not yet claimed seeds a new group.
    fn flood_all<L: NodeLookup + ?Sized>(&mut self, lookup: &L, pass: &mut Pass<R>) {
        let generation = pass.generation;
        for idx in 0..pass.worklist.len() {
            let seed = pass.worklist[idx];
            let Some(node) = self.nodes.get_mut(seed) else {
                continue;
            };
            node.flagged_for_flood = false;
            if node.flood_gen == generation || node.group.is_some() {
                continue;
            }
            if !node.is_connectable(lookup) {
                continue;
            }
            let kind = node.kind();
            let members = self.flood_fill(seed, generation);
            trace!(?seed, size = members.len(), "flood fill");
            self.create_group(kind, members);
            pass.report.groups_created += 1;
        }
    }

    /// Breadth-first traversal over this pass's undirected edges.
    fn flood_fill(&mut self, seed: NodeId, generation: u32) -> Vec<NodeId> {
        self.nodes[seed].flood_gen = generation;
        let mut visited = vec![seed];
        let mut i = 0;
        while i < visited.len() {
            let id = visited[i];
            i += 1;
            if self.nodes[id].undirect_gen != generation {
                continue;
            }
            for j in 0..self.nodes[id].reachable.len() {
                let other = self.nodes[id].reachable[j];
                let Some(next) = self.nodes.get_mut(other) else {
                    continue;
                };
                if next.flood_gen == generation {
                    continue;
                }
                next.flood_gen = generation;
                visited.push(other);
            }
        }
        visited
    }

    /// Register a group holding exactly `members`.
    fn create_group(&mut self, kind: GroupKind, members: Vec<NodeId>) -> GroupId {
        let net_id = self.next_net_id;
        self.next_net_id = self.next_net_id.wrapping_add(1);
        let group_id = self
            .groups
            .insert_with_key(|id| Group::new(id, kind, net_id));
        let group = &mut self.groups[group_id];
        for &member in &members {
            if let Some(node) = self.nodes.get_mut(member) {
                node.group = Some(group_id);
                node.net_id = net_id;
                group.members.insert(member);
            }
        }
        let size = group.len();
        self.emit(GraphEvent::GroupCreated {
            group: group_id,
            kind,
            members: size,
        });
        group_id
    }

    /// Phase 5: hand each torn-down group's resource to its successors.
    fn resolve_resources(&mut self, pass: &mut Pass<R>) {
        for mut old in std::mem::take(&mut pass.released) {
            let mut successors: BTreeMap<GroupId, BTreeSet<NodeId>> = BTreeMap::new();
            for &member in old.members() {
                if let Some(group) = self.nodes.get(member).and_then(|n| n.group) {
                    successors.entry(group).or_default().insert(member);
                }
            }

            if successors.is_empty() {
                debug!(net = old.net_id(), "group left no successors; dropping its resource");
                continue;
            }

            if successors.len() == 1 {
                let Some((target_id, survivors)) = successors.pop_first() else {
                    continue;
                };
                old.members = survivors;
                if let Some(target) = self.groups.get_mut(target_id)
                    && let Err(old) = target.merge(old)
                {
                    error!(net = old.net_id(), "successor group has a different kind; resource dropped");
                }
                self.emit(GraphEvent::ResourceChanged { group: target_id });
                continue;
            }

            let (targets, subsets): (Vec<GroupId>, Vec<BTreeSet<NodeId>>) =
                successors.into_iter().unzip();
            let pieces = old.split(&subsets);
            for (target_id, piece) in targets.into_iter().zip(pieces) {
                if let Some(target) = self.groups.get_mut(target_id) {
                    target.resource.merge(piece);
                }
                self.emit(GraphEvent::ResourceChanged { group: target_id });
            }
        }
    }

    /// Every connectable node touched this pass must now have a group.
    fn check_grouping<L: NodeLookup + ?Sized>(&mut self, lookup: &L, pass: &mut Pass<R>) {
        if !self.config.check_invariants {
            return;
        }
        let mut orphans = Vec::new();
        for &id in &pass.worklist {
            if let Some(node) = self.nodes.get(id)
                && node.group.is_none()
                && node.is_connectable(lookup)
            {
                orphans.push(id);
            }
        }
        for id in orphans {
            error!(node = ?id, "connectable node finished the pass without a group");
            if self.config.self_heal && self.queue_reflood(id) {
                pass.report.healed += 1;
            }
        }
    }

    fn emit(&mut self, event: GraphEvent) {
        if self.config.emit_events {
            self.events.push(event);
        }
    }

    /// Take every event buffered since the last drain.
    pub fn drain_events(&mut self) -> Vec<GraphEvent> {
        std::mem::take(&mut self.events)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn node(&self, node: NodeId) -> Option<&Node> {
        self.nodes.get(node)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn group(&self, group: GroupId) -> Option<&Group<R>> {
        self.groups.get(group)
    }

    /// The live group a node belongs to. Stale back-references resolve to `None`.
    pub fn group_of(&self, node: NodeId) -> Option<&Group<R>> {
        self.nodes
            .get(node)
            .and_then(|n| n.group)
            .and_then(|group| self.groups.get(group))
    }

    pub fn groups(&self) -> impl Iterator<Item = &Group<R>> {
        self.groups.values()
    }

    pub fn groups_of_kind(&self, kind: GroupKind) -> impl Iterator<Item = &Group<R>> {
        self.groups.values().filter(move |group| group.kind() == kind)
    }

    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    pub fn resource(&self, group: GroupId) -> Option<&R> {
        self.groups.get(group).map(Group::resource)
    }

    /// Mutable access to a group's resource. Reported as `ResourceChanged`.
    pub fn resource_mut(&mut self, group: GroupId) -> Option<&mut R> {
        if !self.groups.contains_key(group) {
            return None;
        }
        self.emit(GraphEvent::ResourceChanged { group });
        self.groups.get_mut(group).map(|g| &mut g.resource)
    }

    pub(crate) fn view<'a, L: NodeLookup + ?Sized>(&'a self, lookup: &'a L) -> NodeView<'a, L> {
        NodeView {
            nodes: &self.nodes,
            containers: &self.containers,
            lookup,
        }
    }

    /// Nodes `node` can link to directly, as seen by the scheduler.
    pub fn reachable_nodes<L: NodeLookup + ?Sized>(&self, node: NodeId, lookup: &L) -> Vec<NodeId> {
        self.view(lookup).reachable_nodes(node)
    }
}
