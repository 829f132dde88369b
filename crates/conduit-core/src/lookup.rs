//! The spatial seam between the node graph and whatever owns tile placement.

use crate::grid::{Direction, GridPosition, Rotation};
use crate::id::EntityId;

/// Read-only view of where node containers sit on the grid.
///
/// The scheduler only ever asks about anchored objects; an implementation
/// should leave unanchored objects out of [`containers_at`](Self::containers_at).
pub trait NodeLookup {
    /// Entities anchored to the given tile.
    fn containers_at(&self, tile: GridPosition) -> Vec<EntityId>;

    /// Tile an entity is anchored to, or `None` while it is loose.
    fn anchored_position(&self, entity: EntityId) -> Option<GridPosition>;

    /// Current rotation of an entity. Loose or unknown entities report
    /// [`Rotation::None`].
    fn rotation(&self, entity: EntityId) -> Rotation;

    fn is_anchored(&self, entity: EntityId) -> bool {
        self.anchored_position(entity).is_some()
    }

    /// Entities anchored to the cardinal neighbor of `tile`.
    fn containers_in_direction(&self, tile: GridPosition, dir: Direction) -> Vec<EntityId> {
        self.containers_at(tile.offset(dir))
    }
}
