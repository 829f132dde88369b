//! Conduit Core -- the connectivity engine behind pipe, cable and signal
//! networks on a tile grid.
//!
//! Grid objects own *nodes*: typed connection points that can link to
//! nearby nodes of the same [`id::GroupKind`]. Connected nodes form a
//! *group*, and each group owns one shared resource (a gas mixture, a
//! power budget, nothing at all). This crate keeps groups equal to the
//! connected components of the node graph while objects are built,
//! destroyed, rotated and (un)anchored.
//!
//! # Batched Regrouping
//!
//! Topology changes are queued, never applied in place:
//!
//! ```rust,ignore
//! let nodes = graph.spawn_container(entity, &defs, &grid)?;
//! graph.rotated(other_entity, &grid);
//! let report = graph.update(&grid); // once per step
//! ```
//!
//! [`graph::NodeGraph::update`] drains every queue in one pass and
//! recomputes membership for the affected region only. Old resources are
//! merged or split into the new groups via [`group::NetResource`].
//!
//! # Key Types
//!
//! - [`graph::NodeGraph`] -- Node, container and group registry plus the
//!   scheduler.
//! - [`node::Node`] -- A node and its [`node::NodeVariant`]: adjacent,
//!   directional or docking.
//! - [`group::Group`] -- One connected component and its resource.
//! - [`lookup::NodeLookup`] -- Spatial queries the scheduler needs.
//! - [`grid::PipeDirection`] -- Four-bit direction mask with rotation.
//! - [`fixed::Fixed64`] -- Q32.32 fixed-point type for deterministic
//!   resource math.

pub mod config;
pub mod container;
pub mod event;
pub mod fixed;
pub mod graph;
pub mod grid;
pub mod group;
pub mod id;
pub mod lookup;
pub mod node;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
