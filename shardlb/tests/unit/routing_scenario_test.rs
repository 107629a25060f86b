//! ShardRouter シナリオテスト
//!
//! 初期利用率からの選択結果と、決定ログに書かれる値を確認する。

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, TimeZone, Utc};
use shardlb::balancer::{RoutingOutcome, ShardRouter, UtilizationTracker, UtilizationVector};
use shardlb::decision_log::MemoryDecisionLogger;
use shardlb_common::config::RoutingConfig;
use shardlb_common::types::{EndpointKind, ShardId};

fn router() -> (ShardRouter, Arc<MemoryDecisionLogger>) {
    let log = Arc::new(MemoryDecisionLogger::new());
    (
        ShardRouter::new(RoutingConfig::default(), log.clone()),
        log,
    )
}

#[tokio::test]
async fn initial_state_routes_each_kind_to_lowest_load() {
    let (router, _log) = router();
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    // features: L = cpu .0575 / mem .0925 / io .0525
    let features = router.decide(EndpointKind::Features, "u1", t0).await;
    assert_eq!(features.shard, ShardId::Io);
    assert!((features.load - 0.0525).abs() < 1e-12);

    // auth: L = cpu .09 / mem .0575 / io .0525
    let auth = router.decide(EndpointKind::Auth, "u2", t0).await;
    assert_eq!(auth.shard, ShardId::Io);

    // document: L = cpu .0575 / mem .0625 / io .08
    let document = router.decide(EndpointKind::Document, "u3", t0).await;
    assert_eq!(document.shard, ShardId::Cpu);
    assert!((document.load - 0.0575).abs() < 1e-12);
}

#[tokio::test]
async fn decision_record_reflects_completed_request() {
    let (router, log) = router();
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    let decision = router.decide(EndpointKind::Features, "u1", t0).await;
    router
        .finish(
            &decision,
            RoutingOutcome::Completed,
            StdDuration::from_millis(240),
        )
        .await;

    let records = log.records();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.user_id, "u1");
    assert_eq!(record.selected_shard, ShardId::Io);
    assert!((record.score - 0.0525).abs() < 1e-12);
    assert_eq!(record.locality, 1.0);

    // 240ms: use = min(0.99, demand * 2)
    let io = router.utilization(ShardId::Io).await;
    assert!((io.cpu - (0.96 * 0.05 + 0.04 * 0.30)).abs() < 1e-12);
    assert!((io.mem - (0.96 * 0.05 + 0.04 * 0.99)).abs() < 1e-12);
    assert!((io.io - (0.96 * 0.10 + 0.04 * 0.10)).abs() < 1e-12);
}

#[tokio::test]
async fn sticky_then_ttl_expiry_reselects() {
    let log = Arc::new(MemoryDecisionLogger::new());
    let loaded = UtilizationVector::new(0.5, 0.5, 0.5);
    let idle = UtilizationVector::new(0.05, 0.05, 0.05);
    let router = ShardRouter::with_tracker(
        RoutingConfig {
            locality_weight: 0.0,
            ..RoutingConfig::default()
        },
        UtilizationTracker::with_initial([idle, loaded, idle]),
        log.clone(),
    );
    let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    // cpu と io が同値なので cpu
    let first = router.decide(EndpointKind::Features, "u1", t0).await;
    assert_eq!(first.shard, ShardId::Cpu);

    let within_ttl = router
        .decide(EndpointKind::Features, "u1", t0 + Duration::seconds(1199))
        .await;
    assert!(within_ttl.sticky_used);
    assert_eq!(within_ttl.shard, ShardId::Cpu);

    // 同じ状態ならTTL切れ後も cpu に戻り、ダイバートにはならない
    let expired = router
        .decide(EndpointKind::Features, "u1", t0 + Duration::seconds(1200))
        .await;
    assert!(!expired.sticky_used);
    assert_eq!(expired.shard, ShardId::Cpu);
    assert!(!expired.diverted);
    assert_eq!(
        router.affinity("u1").await.unwrap().assigned_at,
        t0 + Duration::seconds(1200)
    );
}
