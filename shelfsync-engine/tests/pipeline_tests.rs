//! End-to-end pipeline scenarios
//!
//! Fetch, merge, classify, cache and rebalance wired together the way the
//! service runs them, minus the HTTP layer.

mod helpers;

use async_trait::async_trait;
use chrono::Duration as ChronoDuration;
use helpers::{create_test_db, create_test_sync, now, record, StaticCatalog};
use shelfsync_common::models::{ArchiveCategory, BrandTier, CategorySource, DisplayCategory, LifecycleStage};
use shelfsync_common::time::FixedClock;
use shelfsync_engine::db;
use shelfsync_engine::models::{FieldUpdate, OverrideFields, RebalanceState};
use shelfsync_engine::services::ai_classifier::{AiProductSnapshot, AiSuggestion, NoSignal};
use shelfsync_engine::services::sync_orchestrator::ClassifyItem;
use shelfsync_engine::services::{
    AiClassifier, CatalogFetcher, ClassifierConfig, FetchOptions, RankingConfig, RebalanceConfig, RebalanceJob,
    SalesPotentialRanker, SyncConfig, SyncOrchestrator,
};
use std::collections::BTreeMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

/// AI stage that holds every call until the gate opens
struct GatedAi {
    gate: Arc<tokio::sync::Notify>,
}

#[async_trait]
impl AiClassifier for GatedAi {
    async fn suggest(&self, _product: &AiProductSnapshot) -> Result<AiSuggestion, NoSignal> {
        self.gate.notified().await;
        Err(NoSignal::Timeout)
    }
}

fn rebalance_job(
    pool: sqlx::SqlitePool,
    sync: Arc<SyncOrchestrator>,
    capacities: &[(&str, usize)],
) -> RebalanceJob {
    let config = RebalanceConfig {
        capacities: capacities.iter().map(|(k, v)| (k.to_string(), *v)).collect::<BTreeMap<_, _>>(),
        ..Default::default()
    };
    RebalanceJob::new(pool, sync, SalesPotentialRanker::new(RankingConfig::default()), config)
}

#[tokio::test]
async fn test_aged_military_surplus_lands_in_clearance() {
    let pool = create_test_db().await;
    let sync = create_test_sync(
        pool.clone(),
        StaticCatalog::new(vec![record(1, "M-65 Field Jacket Rothco", "Rothco", 150)]),
    );

    let view = sync.refresh(false).await.unwrap();
    let product = view.get("1").unwrap();

    assert_eq!(product.stage(), LifecycleStage::Clearance);
    assert_eq!(product.display_category, DisplayCategory::Clearance);
    assert_eq!(product.archive_category(), Some(ArchiveCategory::MilitaryArchive));
    assert_eq!(product.brand_tier, BrandTier::Mid);

    let classification = product.classification.as_ref().unwrap();
    assert!(!classification.ai_consulted);
    assert!(classification.confidence >= 40);

    let logged = db::classification_log::recent(&pool, Some("1"), 10).await.unwrap();
    assert_eq!(logged.len(), 1);
    assert_eq!(logged[0].category, ArchiveCategory::MilitaryArchive);
    assert_eq!(logged[0].product_name, "M-65 Field Jacket Rothco");
}

#[tokio::test]
async fn test_archive_root_overflow_moves_excess_to_clearance() {
    let pool = create_test_db().await;
    let records = (1..=1000).map(|i| record(i, "Plain tee", "", 70)).collect();
    let sync = create_test_sync(pool.clone(), StaticCatalog::new(records));
    let job = rebalance_job(pool.clone(), sync.clone(), &[("archive-root", 900)]);

    let summary = job.run().await.unwrap();

    assert_eq!(summary.state, RebalanceState::Done);
    assert_eq!(summary.considered, 1000);
    assert_eq!(summary.before_counts.get(&DisplayCategory::ArchiveRoot), Some(&1000));
    assert_eq!(summary.planned, 100);
    assert_eq!(summary.moved, 100);
    assert_eq!(summary.failed, 0);
    assert!(summary
        .outcomes
        .iter()
        .all(|o| o.from == DisplayCategory::ArchiveRoot && o.to == DisplayCategory::Clearance));

    let moves = db::rebalance_moves::for_run(&pool, summary.run_id).await.unwrap();
    assert_eq!(moves.len(), 100);
    assert!(moves.iter().all(|m| m.applied));

    // pins are automatic, so a later run may move them again
    let moved = db::overrides::get_one(&pool, &moves[0].product_id).await.unwrap().unwrap();
    assert_eq!(moved.internal_category, Some(DisplayCategory::Clearance));
    assert_eq!(moved.category_source, Some(CategorySource::Automatic));

    let view = sync.refresh(false).await.unwrap();
    let counts = view.category_counts();
    assert_eq!(counts.get(&DisplayCategory::ArchiveRoot), Some(&900));
    assert_eq!(counts.get(&DisplayCategory::Clearance), Some(&100));

    // already within capacity: a second run plans nothing
    let second = job.run().await.unwrap();
    assert_eq!(second.planned, 0);
}

#[tokio::test]
async fn test_manual_pins_are_never_rebalanced() {
    let pool = create_test_db().await;
    for id in ["1", "2", "3"] {
        db::overrides::upsert(
            &pool,
            id,
            &OverrideFields::pin(DisplayCategory::New, CategorySource::Manual),
            now(),
        )
        .await
        .unwrap();
    }
    let records = (1..=4).map(|i| record(i, "Plain tee", "", 2)).collect();
    let sync = create_test_sync(pool.clone(), StaticCatalog::new(records));
    let job = rebalance_job(pool.clone(), sync, &[("new", 2)]);

    let summary = job.run().await.unwrap();

    // only the unpinned item may move, even though two are over
    assert_eq!(summary.planned, 1);
    assert_eq!(summary.outcomes[0].product_id, "4");
}

#[tokio::test]
async fn test_duplicate_records_collapse_to_the_last_one() {
    let pool = create_test_db().await;
    let sync = create_test_sync(
        pool,
        StaticCatalog::new(vec![
            record(1, "Plain tee", "", 3),
            record(2, "Chore coat", "", 3),
            record(1, "Plain tee v2", "", 3),
        ]),
    );

    let view = sync.refresh(false).await.unwrap();

    assert_eq!(view.len(), 2);
    assert_eq!(view.fetch.duplicates, 1);
    assert_eq!(view.get("1").unwrap().product.name, "Plain tee v2");
}

#[tokio::test]
async fn test_failed_refresh_keeps_serving_previous_view() {
    let pool = create_test_db().await;
    let catalog = StaticCatalog::new(vec![record(1, "Plain tee", "", 3)]);
    let sync = create_test_sync(pool, catalog.clone());

    let first = sync.refresh(false).await.unwrap();
    catalog.fail.store(true, Ordering::SeqCst);

    assert!(sync.refresh(true).await.is_err());

    let current = sync.current().await.unwrap();
    assert_eq!(current.generation, first.generation);
    let status = sync.status().await;
    assert!(status.last_error.is_some());
    assert_eq!(status.products, 1);
}

#[tokio::test]
async fn test_override_date_restarts_the_lifecycle() {
    let pool = create_test_db().await;
    let fields = OverrideFields {
        override_date: FieldUpdate::Set((now() - ChronoDuration::days(40)).to_rfc3339()),
        ..Default::default()
    };
    db::overrides::upsert(&pool, "1", &fields, now()).await.unwrap();

    let sync = create_test_sync(pool, StaticCatalog::new(vec![record(1, "Plain tee", "", 400)]));
    let view = sync.refresh(false).await.unwrap();
    let product = view.get("1").unwrap();

    assert_eq!(product.stage(), LifecycleStage::Curated);
    assert_eq!(product.lifecycle.age_days, 40);
    assert!(product.lifecycle.from_override);
    assert!(product.classification.is_none());
}

#[tokio::test]
async fn test_failed_move_does_not_abort_the_plan() {
    let pool = create_test_db().await;
    sqlx::query(
        r#"
        CREATE TRIGGER reject_product_1 BEFORE INSERT ON product_overrides
        WHEN NEW.id = '1'
        BEGIN
            SELECT RAISE(ABORT, 'product 1 is read-only');
        END
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();

    // identical items: ties move in id order, so "1" and "2" are planned
    let records = (1..=5).map(|i| record(i, "Plain tee", "", 2)).collect();
    let sync = create_test_sync(pool.clone(), StaticCatalog::new(records));
    let job = rebalance_job(pool.clone(), sync, &[("new", 3)]);

    let summary = job.run().await.unwrap();

    assert_eq!(summary.state, RebalanceState::Done);
    assert_eq!(summary.planned, 2);
    assert_eq!(summary.moved, 1);
    assert_eq!(summary.failed, 1);

    let rejected = summary.outcomes.iter().find(|o| o.product_id == "1").unwrap();
    assert!(!rejected.applied);
    assert!(rejected.error.as_deref().unwrap().contains("read-only"));
    let applied = summary.outcomes.iter().find(|o| o.product_id == "2").unwrap();
    assert!(applied.applied);
    assert_eq!(applied.to, DisplayCategory::Curated);

    let moves = db::rebalance_moves::for_run(&pool, summary.run_id).await.unwrap();
    assert_eq!(moves.len(), 2);
    assert_eq!(moves.iter().filter(|m| !m.applied && m.error.is_some()).count(), 1);

    assert!(db::overrides::get_one(&pool, "1").await.unwrap().is_none());
    let pinned = db::overrides::get_one(&pool, "2").await.unwrap().unwrap();
    assert_eq!(pinned.internal_category, Some(DisplayCategory::Curated));
}

#[tokio::test]
async fn test_invalidation_during_refresh_is_not_lost() {
    let pool = create_test_db().await;
    let gate = Arc::new(tokio::sync::Notify::new());
    let ai = Arc::new(GatedAi { gate: gate.clone() });
    let sync = Arc::new(
        SyncOrchestrator::new(
            pool.clone(),
            CatalogFetcher::new(
                StaticCatalog::new(vec![record(1, "Plain tee", "", 70)]),
                FetchOptions {
                    page_size: 100,
                    max_attempts: 1,
                    initial_backoff: std::time::Duration::from_millis(1),
                    page_timeout: std::time::Duration::from_secs(5),
                    fan_out: 1,
                },
            ),
            SyncConfig {
                use_ai: true,
                ..Default::default()
            },
            ClassifierConfig::default(),
        )
        .with_ai(ai)
        .with_clock(Arc::new(FixedClock(now()))),
    );

    let refreshing = tokio::spawn({
        let sync = sync.clone();
        async move { sync.refresh(false).await }
    });

    // the build has read overrides and is waiting on the AI stage
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    db::overrides::upsert(
        &pool,
        "1",
        &OverrideFields::pin(DisplayCategory::New, CategorySource::Manual),
        now(),
    )
    .await
    .unwrap();
    sync.invalidate();
    gate.notify_one();

    let first = refreshing.await.unwrap().unwrap();
    assert!(!first.get("1").unwrap().manually_pinned);
    assert!(sync.status().await.stale);

    let second = sync.refresh(false).await.unwrap();
    assert_ne!(second.generation, first.generation);
    let product = second.get("1").unwrap();
    assert!(product.manually_pinned);
    assert_eq!(product.display_category, DisplayCategory::New);
}

#[tokio::test]
async fn test_repeated_ids_are_classified_once() {
    let pool = create_test_db().await;
    let sync = create_test_sync(
        pool.clone(),
        StaticCatalog::new(vec![record(1, "M-65 Field Jacket Rothco", "Rothco", 150)]),
    );
    sync.refresh(false).await.unwrap();

    let ids = vec!["1".to_string(), "1".to_string(), "404".to_string()];
    let items = sync.classify_ids(&ids, false).await.unwrap();

    assert_eq!(items.len(), 3);
    assert!(matches!(&items[0], ClassifyItem::Classified(o) if o.product_id == "1"));
    assert!(matches!(&items[1], ClassifyItem::Classified(o) if o.product_id == "1"));
    assert!(matches!(&items[2], ClassifyItem::NotFound { product_id } if product_id == "404"));

    // one row from the refresh, one from the request
    let logged = db::classification_log::recent(&pool, Some("1"), 10).await.unwrap();
    assert_eq!(logged.len(), 2);
}
