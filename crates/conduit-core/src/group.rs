//! Groups: connected components of same-kind nodes and the shared state
//! each one owns.

use std::collections::BTreeSet;

use crate::id::{GroupId, GroupKind, NodeId};

// ---------------------------------------------------------------------------
// Shared resource
// ---------------------------------------------------------------------------

/// State shared by every node of a group, e.g. a merged volume of gas.
///
/// The scheduler never looks inside a resource. When groups are rebuilt it
/// splits each old resource by how many former members land in each new
/// group, then merges the pieces into the new groups.
pub trait NetResource: Default {
    /// Absorb `other` into `self`. Must not lose content.
    fn merge(&mut self, other: Self);

    /// Divide `self` into `weights.len()` pieces, `weights[i]` being the
    /// number of former members that ended up in the i-th new group.
    ///
    /// Default policy: the heaviest piece (first on ties) keeps everything,
    /// the others start from `Default`.
    fn split(self, weights: &[usize]) -> Vec<Self> {
        let mut pieces: Vec<Self> = weights.iter().map(|_| Self::default()).collect();
        let heaviest = weights
            .iter()
            .enumerate()
            .max_by(|(ia, a), (ib, b)| a.cmp(b).then(ib.cmp(ia)))
            .map(|(i, _)| i);
        if let Some(i) = heaviest {
            pieces[i] = self;
        }
        pieces
    }
}

/// Networks that only care about connectivity.
impl NetResource for () {
    fn merge(&mut self, _other: Self) {}
}

// ---------------------------------------------------------------------------
// Group
// ---------------------------------------------------------------------------

/// One connected component. Owned exclusively by the scheduler's registry.
#[derive(Debug, Clone)]
pub struct Group<R> {
    id: GroupId,
    kind: GroupKind,
    net_id: u32,
    pub(crate) members: BTreeSet<NodeId>,
    pub(crate) resource: R,
}

impl<R: NetResource> Group<R> {
    pub(crate) fn new(id: GroupId, kind: GroupKind, net_id: u32) -> Self {
        Self {
            id,
            kind,
            net_id,
            members: BTreeSet::new(),
            resource: R::default(),
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn kind(&self) -> GroupKind {
        self.kind
    }

    /// Diagnostic number, increasing in creation order.
    pub fn net_id(&self) -> u32 {
        self.net_id
    }

    pub fn members(&self) -> &BTreeSet<NodeId> {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        self.members.contains(&node)
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }

    /// Absorb another group of the same kind: members and resource.
    ///
    /// Hands `other` back untouched on a kind mismatch.
    pub fn merge(&mut self, other: Group<R>) -> Result<(), Group<R>> {
        if other.kind != self.kind {
            return Err(other);
        }
        self.members.extend(other.members);
        self.resource.merge(other.resource);
        Ok(())
    }

    /// Split the resource across `subsets` (disjoint partitions of the
    /// member set), consuming the group.
    pub fn split(self, subsets: &[BTreeSet<NodeId>]) -> Vec<R> {
        let weights: Vec<usize> = subsets.iter().map(BTreeSet::len).collect();
        self.resource.split(&weights)
    }
}
