//! Rebalance run state machine
//!
//! SCAN → PLAN → APPLY → DONE, or FAILED when no view can be read.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shelfsync_common::models::DisplayCategory;
use std::collections::BTreeMap;
use uuid::Uuid;

/// Rebalance run state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RebalanceState {
    /// Reading the canonical view
    Scan,
    /// Selecting excess members per category
    Plan,
    /// Writing moves through the override store
    Apply,
    Done,
    Failed,
}

impl RebalanceState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RebalanceState::Done | RebalanceState::Failed)
    }
}

/// One planned category move
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedMove {
    pub product_id: String,
    pub from: DisplayCategory,
    pub to: DisplayCategory,
    /// Sales-potential score that ranked the product for moving
    pub score: f64,
}

impl PlannedMove {
    /// `"from → to"` key used in summaries
    pub fn route(&self) -> String {
        format!("{} → {}", self.from, self.to)
    }
}

/// Result of applying one planned move
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveOutcome {
    pub product_id: String,
    pub from: DisplayCategory,
    pub to: DisplayCategory,
    pub applied: bool,
    pub error: Option<String>,
}

/// Summary emitted when a run ends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RebalanceSummary {
    pub run_id: Uuid,
    pub state: RebalanceState,
    pub view_generation: Option<Uuid>,
    /// Products that took part in capacity accounting
    pub considered: usize,
    /// Excluded-segment products left out entirely
    pub excluded: usize,
    pub before_counts: BTreeMap<DisplayCategory, usize>,
    pub planned: usize,
    pub moved: usize,
    pub failed: usize,
    /// Applied moves grouped by `"from → to"`
    pub moves_by_route: BTreeMap<String, usize>,
    pub outcomes: Vec<MoveOutcome>,
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

/// In-flight run
#[derive(Debug, Clone)]
pub struct RebalanceRun {
    pub run_id: Uuid,
    pub state: RebalanceState,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl RebalanceRun {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            state: RebalanceState::Scan,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Transition to new state, stamping the end time on terminal states
    pub fn transition_to(&mut self, new_state: RebalanceState) {
        tracing::debug!(
            run_id = %self.run_id,
            from = ?self.state,
            to = ?new_state,
            "Rebalance state transition"
        );
        self.state = new_state;
        if new_state.is_terminal() {
            self.ended_at = Some(Utc::now());
        }
    }
}

impl Default for RebalanceRun {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shelfsync_common::models::ArchiveCategory;

    #[test]
    fn test_run_starts_in_scan() {
        let run = RebalanceRun::new();
        assert_eq!(run.state, RebalanceState::Scan);
        assert!(run.ended_at.is_none());
    }

    #[test]
    fn test_terminal_transition_sets_end_time() {
        let mut run = RebalanceRun::new();
        run.transition_to(RebalanceState::Plan);
        assert!(run.ended_at.is_none());
        run.transition_to(RebalanceState::Done);
        assert!(run.ended_at.is_some());
        assert!(run.state.is_terminal());
    }

    #[test]
    fn test_route_label() {
        let planned = PlannedMove {
            product_id: "1".to_string(),
            from: DisplayCategory::Archive(ArchiveCategory::MilitaryArchive),
            to: DisplayCategory::Clearance,
            score: 12.0,
        };
        assert_eq!(planned.route(), "military-archive → clearance");
    }
}
