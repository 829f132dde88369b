use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Tunables for the topology scheduler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Re-queue connectable nodes that end a pass without a group.
    #[serde(default = "default_true")]
    pub self_heal: bool,
    /// Buffer [`GraphEvent`](crate::event::GraphEvent)s for `drain_events`.
    #[serde(default = "default_true")]
    pub emit_events: bool,
    /// Run the end-of-pass grouping check at all.
    #[serde(default = "default_true")]
    pub check_invariants: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            self_heal: true,
            emit_events: true,
            check_invariants: true,
        }
    }
}
