//! Grid primitives shared by node reachability and the spatial index.
//!
//! The grid is y-down: `North` is `(0, -1)`. Rotations are clockwise
//! quarter turns, so an east-facing mask rotated by [`Rotation::Cw90`]
//! faces south.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

/// A tile position on the 2D grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The neighboring tile in the given direction.
    pub fn offset(&self, dir: Direction) -> Self {
        let (dx, dy) = dir.offset();
        Self::new(self.x + dx, self.y + dy)
    }

    /// Manhattan distance to another position.
    pub fn manhattan_distance(&self, other: &GridPosition) -> u32 {
        (self.x - other.x).unsigned_abs() + (self.y - other.y).unsigned_abs()
    }
}

// ---------------------------------------------------------------------------
// Directions
// ---------------------------------------------------------------------------

/// Cardinal directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    North,
    East,
    South,
    West,
}

impl Direction {
    /// All four cardinal directions, clockwise from north.
    pub fn all() -> [Direction; 4] {
        [
            Direction::North,
            Direction::East,
            Direction::South,
            Direction::West,
        ]
    }

    /// Offset for this direction.
    pub fn offset(&self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            Direction::North => Direction::South,
            Direction::East => Direction::West,
            Direction::South => Direction::North,
            Direction::West => Direction::East,
        }
    }

    /// Apply a clockwise rotation.
    pub fn rotated(self, rotation: Rotation) -> Self {
        let index = (self as u8 + rotation.quarter_turns()) % 4;
        Direction::all()[index as usize]
    }
}

// ---------------------------------------------------------------------------
// Rotation
// ---------------------------------------------------------------------------

/// Rotation applied to a placed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Rotation {
    /// No rotation.
    #[default]
    None,
    /// 90 degrees clockwise.
    Cw90,
    /// 180 degrees.
    Cw180,
    /// 270 degrees clockwise (90 degrees counter-clockwise).
    Cw270,
}

impl Rotation {
    /// All four rotation values.
    pub fn all() -> [Rotation; 4] {
        [
            Rotation::None,
            Rotation::Cw90,
            Rotation::Cw180,
            Rotation::Cw270,
        ]
    }

    /// Build a rotation from a (possibly negative) count of clockwise quarter turns.
    pub fn from_quarter_turns(turns: i32) -> Self {
        Rotation::all()[turns.rem_euclid(4) as usize]
    }

    /// Number of clockwise quarter turns, 0..4.
    pub fn quarter_turns(self) -> u8 {
        match self {
            Rotation::None => 0,
            Rotation::Cw90 => 1,
            Rotation::Cw180 => 2,
            Rotation::Cw270 => 3,
        }
    }

    /// Rotate 90 degrees clockwise.
    pub fn rotate_cw(self) -> Self {
        Self::from_quarter_turns(self.quarter_turns() as i32 + 1)
    }

    /// Rotate 90 degrees counter-clockwise.
    pub fn rotate_ccw(self) -> Self {
        Self::from_quarter_turns(self.quarter_turns() as i32 - 1)
    }
}

// ---------------------------------------------------------------------------
// Direction masks
// ---------------------------------------------------------------------------

/// A set of cardinal directions a directional node connects towards.
///
/// Serialized as its raw bits. Deserializing rejects bits above the low four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct PipeDirection(u8);

impl PipeDirection {
    pub const NONE: PipeDirection = PipeDirection(0);
    pub const NORTH: PipeDirection = PipeDirection(1 << 0);
    pub const EAST: PipeDirection = PipeDirection(1 << 1);
    pub const SOUTH: PipeDirection = PipeDirection(1 << 2);
    pub const WEST: PipeDirection = PipeDirection(1 << 3);

    pub const LONGITUDINAL: PipeDirection = PipeDirection(Self::NORTH.0 | Self::SOUTH.0);
    pub const LATERAL: PipeDirection = PipeDirection(Self::EAST.0 | Self::WEST.0);
    pub const ALL: PipeDirection = PipeDirection(0b1111);

    /// Build from raw bits; bits above the low four are dropped.
    pub fn from_bits(bits: u8) -> Self {
        PipeDirection(bits & Self::ALL.0)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn contains(self, dir: Direction) -> bool {
        self.0 & PipeDirection::from(dir).0 != 0
    }

    pub fn union(self, other: PipeDirection) -> Self {
        PipeDirection(self.0 | other.0)
    }

    /// The directions contained in this mask, clockwise from north.
    pub fn directions(self) -> impl Iterator<Item = Direction> {
        Direction::all()
            .into_iter()
            .filter(move |dir| self.contains(*dir))
    }

    /// Every contained direction flipped to its opposite.
    pub fn opposite(self) -> Self {
        self.directions()
            .map(|dir| PipeDirection::from(dir.opposite()))
            .fold(PipeDirection::NONE, PipeDirection::union)
    }

    /// Every contained direction rotated clockwise by `rotation`.
    pub fn rotated(self, rotation: Rotation) -> Self {
        let turns = rotation.quarter_turns();
        let bits = ((self.0 << turns) | (self.0 >> (4 - turns))) & Self::ALL.0;
        PipeDirection(bits)
    }
}

impl From<Direction> for PipeDirection {
    fn from(dir: Direction) -> Self {
        match dir {
            Direction::North => PipeDirection::NORTH,
            Direction::East => PipeDirection::EAST,
            Direction::South => PipeDirection::SOUTH,
            Direction::West => PipeDirection::WEST,
        }
    }
}

impl TryFrom<u8> for PipeDirection {
    type Error = String;

    fn try_from(bits: u8) -> Result<Self, Self::Error> {
        if bits & !Self::ALL.0 != 0 {
            return Err(format!("direction mask {bits:#06b} has bits outside north/east/south/west"));
        }
        Ok(PipeDirection(bits))
    }
}

impl From<PipeDirection> for u8 {
    fn from(mask: PipeDirection) -> u8 {
        mask.0
    }
}

impl FromIterator<Direction> for PipeDirection {
    fn from_iter<I: IntoIterator<Item = Direction>>(iter: I) -> Self {
        iter.into_iter()
            .map(PipeDirection::from)
            .fold(PipeDirection::NONE, PipeDirection::union)
    }
}
