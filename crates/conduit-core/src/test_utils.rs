//! Shared test helpers for unit tests, integration tests, and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so downstream
//! crates can pull them in through the `test-utils` feature.

use std::collections::BTreeMap;

use slotmap::SlotMap;

use crate::fixed::Fixed64;
use crate::graph::NodeGraph;
use crate::group::NetResource;
use crate::grid::{GridPosition, PipeDirection, Rotation};
use crate::id::*;
use crate::lookup::NodeLookup;
use crate::node::NodeDef;

// ===========================================================================
// Fixed-point helper
// ===========================================================================

pub fn fixed(v: f64) -> Fixed64 {
    Fixed64::from_num(v)
}

// ===========================================================================
// Group kinds
// ===========================================================================

pub fn power() -> GroupKind {
    GroupKind(0)
}
pub fn gas() -> GroupKind {
    GroupKind(1)
}
pub fn signal() -> GroupKind {
    GroupKind(2)
}

// ===========================================================================
// Node definitions
// ===========================================================================

/// An adjacent power cable slot.
pub fn wire(name: &str) -> NodeDef {
    NodeDef::adjacent(name, power())
}

/// A rotation-aware gas pipe slot.
pub fn pipe(name: &str, directions: PipeDirection) -> NodeDef {
    NodeDef::pipe(name, gas(), directions)
}

// ===========================================================================
// Resource
// ===========================================================================

/// Counting resource: merge adds, split uses the default policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pool(pub u32);

impl NetResource for Pool {
    fn merge(&mut self, other: Self) {
        self.0 += other.0;
    }
}

// ===========================================================================
// Minimal grid
// ===========================================================================

#[derive(Debug, Clone, Copy)]
struct Placement {
    tile: GridPosition,
    anchored: bool,
    rotation: Rotation,
}

/// A bare-bones [`NodeLookup`]: entities on tiles, several per tile.
#[derive(Debug, Default)]
pub struct TestGrid {
    entities: SlotMap<EntityId, Placement>,
    tiles: BTreeMap<GridPosition, Vec<EntityId>>,
}

impl TestGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate an anchored entity on `tile`.
    pub fn place(&mut self, tile: GridPosition) -> EntityId {
        let entity = self.entities.insert(Placement {
            tile,
            anchored: true,
            rotation: Rotation::None,
        });
        self.tiles.entry(tile).or_default().push(entity);
        entity
    }

    pub fn remove(&mut self, entity: EntityId) {
        if let Some(placement) = self.entities.remove(entity) {
            self.detach(entity, placement.tile);
        }
    }

    pub fn unanchor(&mut self, entity: EntityId) {
        if let Some(placement) = self.entities.get_mut(entity)
            && placement.anchored
        {
            placement.anchored = false;
            let tile = placement.tile;
            self.detach(entity, tile);
        }
    }

    /// Re-anchor `entity`, possibly somewhere else.
    pub fn anchor(&mut self, entity: EntityId, tile: GridPosition) {
        self.unanchor(entity);
        if let Some(placement) = self.entities.get_mut(entity) {
            placement.anchored = true;
            placement.tile = tile;
            self.tiles.entry(tile).or_default().push(entity);
        }
    }

    pub fn set_rotation(&mut self, entity: EntityId, rotation: Rotation) {
        if let Some(placement) = self.entities.get_mut(entity) {
            placement.rotation = rotation;
        }
    }

    fn detach(&mut self, entity: EntityId, tile: GridPosition) {
        if let Some(list) = self.tiles.get_mut(&tile) {
            list.retain(|&e| e != entity);
            if list.is_empty() {
                self.tiles.remove(&tile);
            }
        }
    }
}

impl NodeLookup for TestGrid {
    fn containers_at(&self, tile: GridPosition) -> Vec<EntityId> {
        self.tiles.get(&tile).cloned().unwrap_or_default()
    }

    fn anchored_position(&self, entity: EntityId) -> Option<GridPosition> {
        self.entities
            .get(entity)
            .filter(|p| p.anchored)
            .map(|p| p.tile)
    }

    fn rotation(&self, entity: EntityId) -> Rotation {
        self.entities
            .get(entity)
            .map(|p| p.rotation)
            .unwrap_or_default()
    }
}

// ===========================================================================
// Spawning
// ===========================================================================

/// Place a fresh entity on `tile` and give it a container with `defs`.
pub fn spawn_at<R: NetResource>(
    graph: &mut NodeGraph<R>,
    grid: &mut TestGrid,
    tile: GridPosition,
    defs: Vec<NodeDef>,
) -> Vec<NodeId> {
    let entity = grid.place(tile);
    graph
        .spawn_container(entity, &defs, grid)
        .expect("fresh entity cannot already own a container")
}

/// Run passes until the graph reports no pending work, up to `limit`.
pub fn settle<R: NetResource>(graph: &mut NodeGraph<R>, grid: &TestGrid, limit: usize) -> usize {
    let mut passes = 0;
    while graph.has_pending_work() && passes < limit {
        graph.update(grid);
        passes += 1;
    }
    passes
}
