//! Property-based tests driving the scheduler through `SpatialIndex`.
//!
//! Every edit goes through the index first and is then reported to the graph
//! with the matching lifecycle hook, the way game code would do it. After the
//! graph settles, its groups are compared against pipe networks computed
//! directly from the index, and fluid totals are checked.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use conduit_core::graph::NodeGraph;
use conduit_core::grid::{Direction, PipeDirection};
use conduit_core::id::{EntityId, ItemTypeId, NodeId};
use conduit_core::node::NodeDef;
use conduit_core::test_utils::{fixed, gas};
use conduit_fluid::{total_fluid, FluidMixture};
use conduit_spatial::{GridPosition, SpatialIndex};
use proptest::prelude::*;
use slotmap::SlotMap;

// ===========================================================================
// Generators
// ===========================================================================

const SIDE: i32 = 4;

#[derive(Debug, Clone)]
enum Op {
    Build { x: i32, y: i32, mask: u8 },
    Destroy(usize),
    Unanchor(usize),
    Anchor(usize),
    Rotate(usize),
    Move { idx: usize, x: i32, y: i32 },
    Pass,
}

fn arb_op(destroy: bool) -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0..SIDE, 0..SIDE, 1..16u8).prop_map(|(x, y, mask)| Op::Build { x, y, mask }),
        1 => (0..64usize).prop_map(Op::Destroy),
        1 => (0..64usize).prop_map(Op::Unanchor),
        1 => (0..64usize).prop_map(Op::Anchor),
        2 => (0..64usize).prop_map(Op::Rotate),
        1 => (0..64usize, 0..SIDE, 0..SIDE).prop_map(|(idx, x, y)| Op::Move { idx, x, y }),
        1 => Just(Op::Pass),
    ]
    .prop_map(move |op| match op {
        Op::Destroy(_) if !destroy => Op::Pass,
        op => op,
    })
}

fn arb_ops(destroy: bool) -> impl Strategy<Value = Vec<Op>> {
    proptest::collection::vec(arb_op(destroy), 1..40)
}

fn oxygen() -> ItemTypeId {
    ItemTypeId(7)
}

// ===========================================================================
// Harness
// ===========================================================================

struct Pipe {
    entity: EntityId,
    base: PipeDirection,
    node: NodeId,
}

struct Plant {
    entities: SlotMap<EntityId, ()>,
    spatial: SpatialIndex,
    graph: NodeGraph<FluidMixture>,
    pipes: Vec<Pipe>,
    /// Loose pipes stay grouped on their own instead of dropping out.
    anchor_free: bool,
}

impl Plant {
    fn new(anchor_free: bool) -> Self {
        Self {
            entities: SlotMap::with_key(),
            spatial: SpatialIndex::new(),
            graph: NodeGraph::new(),
            pipes: Vec::new(),
            anchor_free,
        }
    }

    fn pick(&self, idx: usize) -> Option<usize> {
        (!self.pipes.is_empty()).then(|| idx % self.pipes.len())
    }

    fn apply(&mut self, op: &Op) {
        match *op {
            Op::Build { x, y, mask } => {
                let entity = self.entities.insert(());
                self.spatial
                    .place(entity, GridPosition::new(x, y), Default::default())
                    .unwrap();
                let base = PipeDirection::from_bits(mask);
                let mut def = NodeDef::pipe("pipe", gas(), base);
                if self.anchor_free {
                    def = def.anchor_free();
                }
                let node = self.graph.spawn_container(entity, &[def], &self.spatial).unwrap()[0];
                self.pipes.push(Pipe { entity, base, node });
            }
            Op::Destroy(idx) => {
                let Some(i) = self.pick(idx) else { return };
                let pipe = self.pipes.swap_remove(i);
                self.graph.shutdown_container(pipe.entity);
                self.spatial.remove(pipe.entity).unwrap();
                self.entities.remove(pipe.entity);
            }
            Op::Unanchor(idx) => {
                let Some(i) = self.pick(idx) else { return };
                let entity = self.pipes[i].entity;
                if self.spatial.unanchor(entity).unwrap() {
                    self.graph.anchor_changed(entity, &self.spatial);
                }
            }
            Op::Anchor(idx) => {
                let Some(i) = self.pick(idx) else { return };
                let entity = self.pipes[i].entity;
                if self.spatial.anchor(entity).unwrap() {
                    self.graph.anchor_changed(entity, &self.spatial);
                }
            }
            Op::Rotate(idx) => {
                let Some(i) = self.pick(idx) else { return };
                let entity = self.pipes[i].entity;
                self.spatial.rotate_cw(entity).unwrap();
                self.graph.rotated(entity, &self.spatial);
            }
            Op::Move { idx, x, y } => {
                let Some(i) = self.pick(idx) else { return };
                let entity = self.pipes[i].entity;
                let anchored = self.spatial.placement(entity).unwrap().anchored;
                if anchored {
                    self.spatial.unanchor(entity).unwrap();
                    self.graph.anchor_changed(entity, &self.spatial);
                }
                self.spatial.move_to(entity, GridPosition::new(x, y)).unwrap();
                if anchored {
                    self.spatial.anchor(entity).unwrap();
                    self.graph.anchor_changed(entity, &self.spatial);
                }
            }
            Op::Pass => {
                self.graph.update(&self.spatial);
            }
        }
    }

    fn settle(&mut self) {
        for _ in 0..8 {
            if !self.graph.has_pending_work() {
                return;
            }
            self.graph.update(&self.spatial);
        }
        panic!("graph did not settle");
    }

    /// Whether a pipe takes part in grouping right now.
    fn connectable(&self, pipe: &Pipe) -> bool {
        self.anchor_free || self.spatial.placement(pipe.entity).is_some_and(|p| p.anchored)
    }

    /// Pipe networks computed from placements alone.
    fn expected_partition(&self) -> BTreeSet<BTreeSet<NodeId>> {
        let mut by_tile: BTreeMap<GridPosition, Vec<(NodeId, PipeDirection)>> = BTreeMap::new();
        for pipe in &self.pipes {
            let placement = self.spatial.placement(pipe.entity).unwrap();
            if placement.anchored {
                by_tile
                    .entry(placement.position)
                    .or_default()
                    .push((pipe.node, pipe.base.rotated(placement.rotation)));
            }
        }

        let mut adjacency: BTreeMap<NodeId, Vec<NodeId>> = BTreeMap::new();
        for (&tile, pipes) in &by_tile {
            for &(node, mask) in pipes {
                let links = adjacency.entry(node).or_default();
                for dir in Direction::all().into_iter().filter(|&d| mask.contains(d)) {
                    let Some(others) = by_tile.get(&tile.offset(dir)) else {
                        continue;
                    };
                    links.extend(
                        others
                            .iter()
                            .filter(|(_, theirs)| theirs.contains(dir.opposite()))
                            .map(|&(other, _)| other),
                    );
                }
            }
        }

        let mut seen = BTreeSet::new();
        let mut partition = BTreeSet::new();
        for pipe in self.pipes.iter().filter(|p| self.connectable(p)) {
            if !seen.insert(pipe.node) {
                continue;
            }
            let mut component = BTreeSet::from([pipe.node]);
            let mut queue = VecDeque::from([pipe.node]);
            while let Some(node) = queue.pop_front() {
                for &next in adjacency.get(&node).into_iter().flatten() {
                    if seen.insert(next) {
                        component.insert(next);
                        queue.push_back(next);
                    }
                }
            }
            partition.insert(component);
        }
        partition
    }

    fn actual_partition(&self) -> BTreeSet<BTreeSet<NodeId>> {
        self.graph.groups().map(|g| g.members().clone()).collect()
    }
}

// ===========================================================================
// Properties
// ===========================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// After settling, groups are exactly the pipe networks the placements
    /// describe, whatever edits led there.
    #[test]
    fn groups_follow_placements(ops in arb_ops(true), anchor_free in any::<bool>()) {
        let mut plant = Plant::new(anchor_free);
        for op in &ops {
            plant.apply(op);
        }
        plant.settle();
        prop_assert_eq!(plant.actual_partition(), plant.expected_partition());
    }

    /// Without deconstruction every network keeps its gas: whatever is in
    /// the pipes after seeding is still there after any sequence of edits.
    #[test]
    fn gas_is_conserved(
        layout in proptest::collection::vec((0..SIDE, 0..SIDE, 1..16u8), 1..16),
        ops in arb_ops(false),
    ) {
        let mut plant = Plant::new(true);
        for (x, y, mask) in layout {
            plant.apply(&Op::Build { x, y, mask });
        }
        plant.settle();

        let groups: Vec<_> = plant.graph.groups().map(|g| g.id()).collect();
        for &group in &groups {
            plant.graph.resource_mut(group).unwrap().add(oxygen(), fixed(12.5));
        }
        let seeded = total_fluid(&plant.graph, gas(), oxygen());
        prop_assert_eq!(seeded, fixed(12.5 * groups.len() as f64));

        for op in &ops {
            plant.apply(op);
        }
        plant.settle();
        prop_assert_eq!(total_fluid(&plant.graph, gas(), oxygen()), seeded);
    }
}
