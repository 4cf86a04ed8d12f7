//! Rebalance job
//!
//! Keeps each display category under its soft capacity by moving the
//! lowest-ranked excess members to the category's overflow destination.
//! Reads a canonical view snapshot; writes go through the override store as
//! automatic pins, one row at a time.

use serde::{Deserialize, Serialize};
use shelfsync_common::models::{ArchiveCategory, CategorySource, DisplayCategory};
use sqlx::SqlitePool;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;

use super::ranker::{RankingContext, SalesPotentialRanker};
use super::sync_orchestrator::SyncOrchestrator;
use crate::db;
use crate::db::rebalance_moves::MoveRecord;
use crate::models::{
    CanonicalView, MoveOutcome, OverrideFields, PlannedMove, RebalanceRun, RebalanceState, RebalanceSummary,
};

/// `[rebalance]` table
///
/// Category keys use display names (`new`, `archive-root`, `military-archive`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RebalanceConfig {
    /// Capacity for categories without an explicit entry (clearance excepted)
    pub default_capacity: usize,
    pub capacities: BTreeMap<String, usize>,
    /// Overflow destinations replacing the default cascade
    pub overflow: BTreeMap<String, String>,
    /// Internal schedule period, 0 disables it
    pub interval_secs: u64,
}

impl Default for RebalanceConfig {
    fn default() -> Self {
        Self {
            default_capacity: 200,
            capacities: BTreeMap::new(),
            overflow: BTreeMap::new(),
            interval_secs: 0,
        }
    }
}

impl RebalanceConfig {
    /// Capacity of a category, `None` when unbounded
    pub fn capacity_of(&self, category: DisplayCategory) -> Option<usize> {
        if let Some(capacity) = self.capacities.get(category.as_str()) {
            return Some(*capacity);
        }
        match category {
            DisplayCategory::Clearance => None,
            _ => Some(self.default_capacity),
        }
    }

    /// Where a category's excess goes
    pub fn overflow_of(&self, category: DisplayCategory) -> Option<DisplayCategory> {
        if let Some(target) = self.overflow.get(category.as_str()) {
            return match target.parse() {
                Ok(target) if target != category => Some(target),
                _ => {
                    tracing::warn!(category = %category, target = %target, "Ignoring invalid overflow target");
                    None
                }
            };
        }
        match category {
            DisplayCategory::New => Some(DisplayCategory::Curated),
            DisplayCategory::Curated => Some(DisplayCategory::ArchiveRoot),
            DisplayCategory::ArchiveRoot | DisplayCategory::Archive(_) => Some(DisplayCategory::Clearance),
            DisplayCategory::Clearance => None,
        }
    }
}

/// Categories in the order they are planned
pub fn cascade_order() -> Vec<DisplayCategory> {
    let mut order = vec![DisplayCategory::New, DisplayCategory::Curated, DisplayCategory::ArchiveRoot];
    order.extend(ArchiveCategory::CLASSIFIED.into_iter().map(DisplayCategory::Archive));
    order.push(DisplayCategory::Clearance);
    order
}

/// Output of the planning step
#[derive(Debug, Clone, Default)]
pub struct RebalancePlan {
    pub considered: usize,
    pub excluded: usize,
    pub before_counts: BTreeMap<DisplayCategory, usize>,
    pub moves: Vec<PlannedMove>,
}

/// Select moves for every over-capacity category
///
/// Excluded-segment products neither count nor move. Manually pinned
/// products count but never move. A product moves at most once per plan.
pub fn plan(
    view: &CanonicalView,
    ranker: &SalesPotentialRanker,
    context: &RankingContext,
    config: &RebalanceConfig,
) -> RebalancePlan {
    let mut counts: BTreeMap<DisplayCategory, usize> = BTreeMap::new();
    let mut movable: HashMap<DisplayCategory, Vec<(f64, &str)>> = HashMap::new();
    let mut excluded = 0;

    for product in &view.products {
        if ranker.is_excluded(product.attributes.gender) {
            excluded += 1;
            continue;
        }
        *counts.entry(product.display_category).or_insert(0) += 1;
        if !product.manually_pinned {
            movable
                .entry(product.display_category)
                .or_default()
                .push((ranker.score(product, context), product.product.id.as_str()));
        }
    }

    let before_counts = counts.clone();
    let considered = counts.values().sum();
    let mut moves = Vec::new();

    for category in cascade_order() {
        let Some(capacity) = config.capacity_of(category) else {
            continue;
        };
        let count = counts.get(&category).copied().unwrap_or(0);
        if count <= capacity {
            continue;
        }
        let Some(target) = config.overflow_of(category) else {
            tracing::warn!(category = %category, count, capacity, "Over capacity with no overflow target");
            continue;
        };

        let mut candidates = movable.remove(&category).unwrap_or_default();
        candidates.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(Ordering::Equal)
                .then_with(|| a.1.cmp(b.1))
        });

        let excess = count - capacity;
        if candidates.len() < excess {
            tracing::warn!(
                category = %category,
                excess,
                movable = candidates.len(),
                "Not enough unpinned products to reach capacity"
            );
        }

        for (score, id) in candidates.into_iter().take(excess) {
            moves.push(PlannedMove {
                product_id: id.to_string(),
                from: category,
                to: target,
                score,
            });
            *counts.entry(category).or_insert(0) -= 1;
            *counts.entry(target).or_insert(0) += 1;
        }
    }

    RebalancePlan {
        considered,
        excluded,
        before_counts,
        moves,
    }
}

#[derive(Debug, Error)]
pub enum RebalanceError {
    #[error("A rebalance run is already in progress")]
    AlreadyRunning,
}

pub struct RebalanceJob {
    db: SqlitePool,
    sync: Arc<SyncOrchestrator>,
    ranker: SalesPotentialRanker,
    config: RebalanceConfig,
    running: Mutex<()>,
}

impl RebalanceJob {
    pub fn new(db: SqlitePool, sync: Arc<SyncOrchestrator>, ranker: SalesPotentialRanker, config: RebalanceConfig) -> Self {
        Self {
            db,
            sync,
            ranker,
            config,
            running: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &RebalanceConfig {
        &self.config
    }

    /// One full run; `Failed` only when no view can be read
    pub async fn run(&self) -> Result<RebalanceSummary, RebalanceError> {
        let _guard = self.running.try_lock().map_err(|_| RebalanceError::AlreadyRunning)?;

        let mut run = RebalanceRun::new();
        tracing::info!(run_id = %run.run_id, "Rebalance started");

        // SCAN
        let view = match self.sync.refresh(false).await {
            Ok(view) => view,
            Err(e) => match self.sync.current().await {
                Some(view) => {
                    tracing::warn!(run_id = %run.run_id, error = %e, "Refresh failed, rebalancing the cached view");
                    view
                }
                None => {
                    tracing::error!(run_id = %run.run_id, error = %e, "No canonical view to rebalance");
                    run.transition_to(RebalanceState::Failed);
                    return Ok(failed_summary(&run, e.to_string()));
                }
            },
        };

        // PLAN
        run.transition_to(RebalanceState::Plan);
        let plan = plan(&view, &self.ranker, &RankingContext::default(), &self.config);
        tracing::info!(
            run_id = %run.run_id,
            considered = plan.considered,
            excluded = plan.excluded,
            planned = plan.moves.len(),
            "Rebalance planned"
        );

        // APPLY
        run.transition_to(RebalanceState::Apply);
        let now = self.sync.now();
        let mut outcomes = Vec::with_capacity(plan.moves.len());
        let mut records = Vec::with_capacity(plan.moves.len());
        let mut moves_by_route: BTreeMap<String, usize> = BTreeMap::new();

        for planned in &plan.moves {
            let fields = OverrideFields::pin(planned.to, CategorySource::Automatic);
            let error = match db::overrides::upsert(&self.db, &planned.product_id, &fields, now).await {
                Ok(()) => {
                    *moves_by_route.entry(planned.route()).or_insert(0) += 1;
                    None
                }
                Err(e) => {
                    tracing::warn!(
                        run_id = %run.run_id,
                        product_id = %planned.product_id,
                        error = %e,
                        "Move failed, continuing"
                    );
                    Some(e.to_string())
                }
            };

            records.push(MoveRecord {
                run_id: run.run_id,
                product_id: planned.product_id.clone(),
                from: planned.from,
                to: planned.to,
                score: planned.score,
                applied: error.is_none(),
                error: error.clone(),
                created_at: now,
            });
            outcomes.push(MoveOutcome {
                product_id: planned.product_id.clone(),
                from: planned.from,
                to: planned.to,
                applied: error.is_none(),
                error,
            });
        }

        if let Err(e) = db::rebalance_moves::append(&self.db, &records).await {
            tracing::error!(run_id = %run.run_id, error = %e, "Failed to record rebalance moves");
        }
        if !plan.moves.is_empty() {
            self.sync.invalidate();
        }

        run.transition_to(RebalanceState::Done);
        let moved = outcomes.iter().filter(|o| o.applied).count();
        let failed = outcomes.len() - moved;
        tracing::info!(run_id = %run.run_id, moved, failed, "Rebalance finished");

        Ok(RebalanceSummary {
            run_id: run.run_id,
            state: run.state,
            view_generation: Some(view.generation),
            considered: plan.considered,
            excluded: plan.excluded,
            before_counts: plan.before_counts,
            planned: plan.moves.len(),
            moved,
            failed,
            moves_by_route,
            outcomes,
            error: None,
            started_at: run.started_at,
            ended_at: run.ended_at,
        })
    }
}

fn failed_summary(run: &RebalanceRun, error: String) -> RebalanceSummary {
    RebalanceSummary {
        run_id: run.run_id,
        state: run.state,
        view_generation: None,
        considered: 0,
        excluded: 0,
        before_counts: BTreeMap::new(),
        planned: 0,
        moved: 0,
        failed: 0,
        moves_by_route: BTreeMap::new(),
        outcomes: Vec::new(),
        error: Some(error),
        started_at: run.started_at,
        ended_at: run.ended_at,
    }
}
