//! Tile placement for node-container entities.
//!
//! Provides a 2D spatial index mapping grid tiles to the entities anchored
//! on them. Any number of entities may share a tile (a pipe, a cable and a
//! canister on one floor tile). The index implements
//! [`NodeLookup`], so it can be handed straight to
//! [`NodeGraph::update`](conduit_core::graph::NodeGraph::update).

use std::collections::BTreeMap;

use conduit_core::id::EntityId;
use conduit_core::lookup::NodeLookup;
use serde::{Deserialize, Serialize};
use slotmap::SecondaryMap;

pub use conduit_core::grid::{Direction, GridPosition, Rotation};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Where an entity sits and how it is oriented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    pub position: GridPosition,
    pub rotation: Rotation,
    /// Loose entities keep their position but are invisible to tile queries.
    pub anchored: bool,
}

/// Errors from spatial operations.
#[derive(Debug, thiserror::Error)]
pub enum SpatialError {
    #[error("entity is not placed on the grid")]
    NotPlaced,
    #[error("entity is already placed on the grid")]
    AlreadyPlaced,
}

// ---------------------------------------------------------------------------
// SpatialIndex
// ---------------------------------------------------------------------------

/// A spatial index mapping grid tiles to anchored entities.
///
/// Maintains a bidirectional mapping:
/// - `tiles`: position -> entities anchored there, in anchoring order
/// - `placements`: entity -> position, rotation and anchored flag
#[derive(Debug, Default)]
pub struct SpatialIndex {
    tiles: BTreeMap<GridPosition, Vec<EntityId>>,
    placements: SecondaryMap<EntityId, Placement>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    // -- Placement --

    /// Put an entity on the grid, anchored.
    pub fn place(
        &mut self,
        entity: EntityId,
        position: GridPosition,
        rotation: Rotation,
    ) -> Result<(), SpatialError> {
        if self.placements.contains_key(entity) {
            return Err(SpatialError::AlreadyPlaced);
        }
        self.placements.insert(
            entity,
            Placement {
                position,
                rotation,
                anchored: true,
            },
        );
        self.attach(entity, position);
        Ok(())
    }

    /// Take an entity off the grid. Returns its last position.
    pub fn remove(&mut self, entity: EntityId) -> Result<GridPosition, SpatialError> {
        let placement = self.placements.remove(entity).ok_or(SpatialError::NotPlaced)?;
        if placement.anchored {
            self.detach(entity, placement.position);
        }
        Ok(placement.position)
    }

    /// Anchor a loose entity at its current position. Returns `true` if the
    /// anchored state changed.
    pub fn anchor(&mut self, entity: EntityId) -> Result<bool, SpatialError> {
        let placement = self.placements.get_mut(entity).ok_or(SpatialError::NotPlaced)?;
        if placement.anchored {
            return Ok(false);
        }
        placement.anchored = true;
        let position = placement.position;
        self.attach(entity, position);
        Ok(true)
    }

    /// Loosen an entity. Returns `true` if the anchored state changed.
    pub fn unanchor(&mut self, entity: EntityId) -> Result<bool, SpatialError> {
        let placement = self.placements.get_mut(entity).ok_or(SpatialError::NotPlaced)?;
        if !placement.anchored {
            return Ok(false);
        }
        placement.anchored = false;
        let position = placement.position;
        self.detach(entity, position);
        Ok(true)
    }

    /// Move an entity, keeping its anchored state.
    pub fn move_to(&mut self, entity: EntityId, position: GridPosition) -> Result<(), SpatialError> {
        let placement = self.placements.get_mut(entity).ok_or(SpatialError::NotPlaced)?;
        let old = std::mem::replace(&mut placement.position, position);
        if placement.anchored && old != position {
            self.detach(entity, old);
            self.attach(entity, position);
        }
        Ok(())
    }

    /// Set an entity's rotation. Returns `true` if it changed.
    pub fn set_rotation(&mut self, entity: EntityId, rotation: Rotation) -> Result<bool, SpatialError> {
        let placement = self.placements.get_mut(entity).ok_or(SpatialError::NotPlaced)?;
        let changed = placement.rotation != rotation;
        placement.rotation = rotation;
        Ok(changed)
    }

    /// Turn an entity a quarter clockwise.
    pub fn rotate_cw(&mut self, entity: EntityId) -> Result<Rotation, SpatialError> {
        let placement = self.placements.get_mut(entity).ok_or(SpatialError::NotPlaced)?;
        placement.rotation = placement.rotation.rotate_cw();
        Ok(placement.rotation)
    }

    fn attach(&mut self, entity: EntityId, position: GridPosition) {
        self.tiles.entry(position).or_default().push(entity);
    }

    fn detach(&mut self, entity: EntityId, position: GridPosition) {
        if let Some(list) = self.tiles.get_mut(&position) {
            list.retain(|&e| e != entity);
            if list.is_empty() {
                self.tiles.remove(&position);
            }
        }
    }

    // -- Point queries --

    /// Entities anchored on a tile, in anchoring order.
    pub fn entities_at(&self, pos: GridPosition) -> &[EntityId] {
        self.tiles.get(&pos).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn placement(&self, entity: EntityId) -> Option<&Placement> {
        self.placements.get(entity)
    }

    /// Last known position, anchored or not.
    pub fn get_position(&self, entity: EntityId) -> Option<GridPosition> {
        self.placements.get(entity).map(|p| p.position)
    }

    // -- Stats --

    /// Number of entities on the grid, anchored or not.
    pub fn entity_count(&self) -> usize {
        self.placements.len()
    }

    /// Number of tiles with at least one anchored entity.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }
}

impl NodeLookup for SpatialIndex {
    fn containers_at(&self, tile: GridPosition) -> Vec<EntityId> {
        self.entities_at(tile).to_vec()
    }

    fn anchored_position(&self, entity: EntityId) -> Option<GridPosition> {
        self.placements
            .get(entity)
            .filter(|p| p.anchored)
            .map(|p| p.position)
    }

    fn rotation(&self, entity: EntityId) -> Rotation {
        self.placements
            .get(entity)
            .map(|p| p.rotation)
            .unwrap_or_default()
    }
}
