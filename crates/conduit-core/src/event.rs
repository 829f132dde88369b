//! Post-pass notifications for consumers that react to topology changes.
//!
//! Events are buffered while a pass runs and handed out in one batch via
//! [`NodeGraph::drain_events`](crate::graph::NodeGraph::drain_events).
//! Buffering can be switched off with [`GraphConfig::emit_events`](crate::config::GraphConfig).

use crate::id::{GroupId, GroupKind, NodeId};

/// A topology event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphEvent {
    /// A group came into existence, either from a flood fill or immediately.
    GroupCreated {
        group: GroupId,
        kind: GroupKind,
        members: usize,
    },
    /// A group was torn down. Its id never resolves again.
    GroupDestroyed { group: GroupId, kind: GroupKind },
    /// A group's shared resource was touched (inherited on rebuild, or
    /// handed out mutably).
    ResourceChanged { group: GroupId },
    /// A node left the graph for good.
    NodeRemoved { node: NodeId },
}

/// Discriminant tag for event types, used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphEventKind {
    GroupCreated,
    GroupDestroyed,
    ResourceChanged,
    NodeRemoved,
}

impl GraphEvent {
    pub fn kind(&self) -> GraphEventKind {
        match self {
            GraphEvent::GroupCreated { .. } => GraphEventKind::GroupCreated,
            GraphEvent::GroupDestroyed { .. } => GraphEventKind::GroupDestroyed,
            GraphEvent::ResourceChanged { .. } => GraphEventKind::ResourceChanged,
            GraphEvent::NodeRemoved { .. } => GraphEventKind::NodeRemoved,
        }
    }
}

/// Summary of one scheduler pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Nodes excised during the removal phase.
    pub removed: usize,
    /// Groups released during the remake phase.
    pub remade: usize,
    /// Nodes whose reachability was recomputed.
    pub reflooded: usize,
    pub groups_created: usize,
    pub groups_destroyed: usize,
    /// Connectable nodes that ended the pass without a group and were
    /// queued again.
    pub healed: usize,
}

impl PassReport {
    /// `true` when the pass had nothing to do.
    pub fn is_idle(&self) -> bool {
        *self == PassReport::default()
    }
}
