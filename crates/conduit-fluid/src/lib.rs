//! Fluid resource for pipe networks.
//!
//! A pipe group owns one [`FluidMixture`]: a bag of fluid amounts keyed by
//! [`ItemTypeId`] plus the volume of pipe holding them. When pipe groups join
//! the mixtures are summed; when a group is cut apart every fluid (and the
//! volume) is divided in proportion to how many pipes end up on each side.
//!
//! # Design
//!
//! - All quantities are [`Fixed64`], so splits are deterministic and the
//!   pieces always add back up to the whole.
//! - Fluids are stored in a `BTreeMap` for stable iteration order.
//! - Pressure is amount per unit volume, derived on demand.
//! - [`pipe_nets`] summarizes the pipe groups of one kind for debug overlays.

use std::collections::BTreeMap;

use conduit_core::fixed::{checked_div_64, split_proportional, Fixed64};
use conduit_core::graph::NodeGraph;
use conduit_core::group::NetResource;
use conduit_core::id::{GroupId, GroupKind, ItemTypeId};
use serde::{Deserialize, Serialize};
use tracing::trace;

// ---------------------------------------------------------------------------
// Mixture
// ---------------------------------------------------------------------------

/// The fluid content of one pipe network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FluidMixture {
    /// Volume of the pipes holding this mixture.
    volume: Fixed64,
    /// Amount per fluid type. Zero entries are pruned.
    amounts: BTreeMap<ItemTypeId, Fixed64>,
}

impl FluidMixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_volume(volume: Fixed64) -> Self {
        Self {
            volume,
            amounts: BTreeMap::new(),
        }
    }

    pub fn volume(&self) -> Fixed64 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: Fixed64) {
        self.volume = volume.max(Fixed64::ZERO);
    }

    /// Amount of one fluid.
    pub fn amount(&self, fluid: ItemTypeId) -> Fixed64 {
        self.amounts.get(&fluid).copied().unwrap_or(Fixed64::ZERO)
    }

    /// Sum of all fluid amounts.
    pub fn total(&self) -> Fixed64 {
        self.amounts.values().fold(Fixed64::ZERO, |acc, &v| acc + v)
    }

    pub fn is_empty(&self) -> bool {
        self.amounts.is_empty()
    }

    /// Fluids present, in id order.
    pub fn fluids(&self) -> impl Iterator<Item = (ItemTypeId, Fixed64)> + '_ {
        self.amounts.iter().map(|(&fluid, &amount)| (fluid, amount))
    }

    /// Add fluid. Non-positive amounts are ignored.
    pub fn add(&mut self, fluid: ItemTypeId, amount: Fixed64) {
        if amount <= Fixed64::ZERO {
            return;
        }
        *self.amounts.entry(fluid).or_insert(Fixed64::ZERO) += amount;
    }

    /// Take up to `amount` of a fluid. Returns how much was actually taken.
    pub fn remove(&mut self, fluid: ItemTypeId, amount: Fixed64) -> Fixed64 {
        let Some(current) = self.amounts.get_mut(&fluid) else {
            return Fixed64::ZERO;
        };
        let taken = amount.max(Fixed64::ZERO).min(*current);
        *current -= taken;
        if *current <= Fixed64::ZERO {
            self.amounts.remove(&fluid);
        }
        taken
    }

    /// Amount per unit volume. Zero for a mixture without volume.
    pub fn pressure(&self) -> Fixed64 {
        checked_div_64(self.total(), self.volume).unwrap_or(Fixed64::ZERO)
    }

    /// Share of one fluid in the mixture, 0..=1.
    pub fn fraction(&self, fluid: ItemTypeId) -> Fixed64 {
        checked_div_64(self.amount(fluid), self.total()).unwrap_or(Fixed64::ZERO)
    }
}

impl NetResource for FluidMixture {
    fn merge(&mut self, other: Self) {
        self.volume += other.volume;
        for (fluid, amount) in other.amounts {
            self.add(fluid, amount);
        }
    }

    /// Proportional split: every fluid and the volume are divided by member
    /// count. The pieces sum exactly to the original.
    fn split(self, weights: &[usize]) -> Vec<Self> {
        let mut pieces: Vec<FluidMixture> = split_proportional(self.volume, weights)
            .into_iter()
            .map(FluidMixture::with_volume)
            .collect();
        for (fluid, amount) in self.amounts {
            for (piece, share) in pieces.iter_mut().zip(split_proportional(amount, weights)) {
                piece.add(fluid, share);
            }
        }
        trace!(pieces = pieces.len(), "split fluid mixture");
        pieces
    }
}

// ---------------------------------------------------------------------------
// Pipe-net statistics
// ---------------------------------------------------------------------------

/// Read-only summary of one pipe network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipeNetSummary {
    pub group: GroupId,
    pub net_id: u32,
    pub members: usize,
    pub volume: Fixed64,
    pub total: Fixed64,
    pub pressure: Fixed64,
}

/// Summaries of every group of `kind`, ordered by `net_id`.
pub fn pipe_nets(graph: &NodeGraph<FluidMixture>, kind: GroupKind) -> Vec<PipeNetSummary> {
    let mut nets: Vec<PipeNetSummary> = graph
        .groups_of_kind(kind)
        .map(|group| {
            let mixture = group.resource();
            PipeNetSummary {
                group: group.id(),
                net_id: group.net_id(),
                members: group.len(),
                volume: mixture.volume(),
                total: mixture.total(),
                pressure: mixture.pressure(),
            }
        })
        .collect();
    nets.sort_by_key(|net| net.net_id);
    nets
}

/// Total of one fluid across every group of `kind`.
pub fn total_fluid(graph: &NodeGraph<FluidMixture>, kind: GroupKind, fluid: ItemTypeId) -> Fixed64 {
    graph
        .groups_of_kind(kind)
        .fold(Fixed64::ZERO, |acc, group| acc + group.resource().amount(fluid))
}

// ===========================================================================
// Tests
// ===========================================================================
