//! Property-based tests using proptest

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use shardlb::balancer::{
    AffinityStore, DemandModel, DemandVector, ShardSelector, UtilizationTracker, UtilizationVector,
};
use shardlb::cli::analyze::percentile;
use shardlb_common::config::RoutingConfig;
use shardlb_common::types::{EndpointKind, ShardId};

fn shard_strategy() -> impl Strategy<Value = ShardId> {
    prop_oneof![Just(ShardId::Cpu), Just(ShardId::Mem), Just(ShardId::Io)]
}

fn kind_strategy() -> impl Strategy<Value = EndpointKind> {
    prop_oneof![
        Just(EndpointKind::Auth),
        Just(EndpointKind::Features),
        Just(EndpointKind::Document)
    ]
}

// ---------------------------------------------------------------------------
// UtilizationTracker::update
// ---------------------------------------------------------------------------

proptest! {
    /// 任意の更新列の後も全成分が [0, 0.99] に収まる
    #[test]
    fn utilization_stays_within_bounds(
        updates in prop::collection::vec(
            (shard_strategy(), kind_strategy(), 0.0f64..1_000_000.0),
            0..200,
        ),
    ) {
        let model = DemandModel::default();
        let mut tracker = UtilizationTracker::new();
        for (shard, kind, latency) in &updates {
            tracker.update(*shard, &model.demand(*kind), *latency);
        }
        for (_, u) in tracker.snapshot() {
            for value in u.as_array() {
                prop_assert!((0.0..=0.99).contains(&value), "out of range: {}", value);
            }
        }
    }

    /// 負値・非有限のレイテンシでも範囲外にならない
    #[test]
    fn utilization_ignores_invalid_latency(
        shard in shard_strategy(),
        latency in prop_oneof![Just(f64::NAN), Just(f64::INFINITY), -1_000.0f64..0.0],
    ) {
        let mut tracker = UtilizationTracker::new();
        tracker.update(shard, &DemandModel::AUTH, latency);
        for value in tracker.get(shard).as_array() {
            prop_assert!((0.0..=0.99).contains(&value));
        }
    }
}

// ---------------------------------------------------------------------------
// ShardSelector
// ---------------------------------------------------------------------------

proptest! {
    /// 全シャードの利用率が等しければ新規選択は常に cpu
    #[test]
    fn equal_utilization_selects_cpu(
        value in 0.0f64..0.99,
        cpu in 0.0f64..1.0,
        mem in 0.0f64..1.0,
        io in 0.0f64..1.0,
    ) {
        let u = UtilizationVector::new(value, value, value);
        let tracker = UtilizationTracker::with_initial([u, u, u]);
        let selector = ShardSelector::new(RoutingConfig::default());
        let demand = DemandVector::new(cpu, mem, io);
        prop_assert_eq!(selector.fresh_select(&demand, &tracker, None).shard, ShardId::Cpu);
    }

    /// TTL内で維持条件を満たす限り同じシャードを返し続ける
    #[test]
    fn sticky_shard_is_stable_within_ttl(
        kind in kind_strategy(),
        offsets in prop::collection::vec(0i64..1200, 1..30),
    ) {
        let selector = ShardSelector::new(RoutingConfig::default());
        let tracker = UtilizationTracker::new();
        let model = DemandModel::default();
        let mut store = AffinityStore::new();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

        let first = selector.decide(kind, model.demand(kind), "k", &mut store, &tracker, t0);
        for offset in offsets {
            let next = selector.decide(
                kind,
                model.demand(kind),
                "k",
                &mut store,
                &tracker,
                t0 + Duration::seconds(offset),
            );
            prop_assert_eq!(next.shard, first.shard);
            prop_assert!(next.sticky_used);
            prop_assert_eq!(next.score, 0.0);
        }
    }

    /// TTL経過後は必ず新規選択になる
    #[test]
    fn expired_affinity_forces_fresh_selection(
        kind in kind_strategy(),
        prior in shard_strategy(),
        extra in 0i64..100_000,
    ) {
        let selector = ShardSelector::new(RoutingConfig::default());
        let tracker = UtilizationTracker::new();
        let model = DemandModel::default();
        let mut store = AffinityStore::new();
        let t0 = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        store.set("k", prior, t0);

        let now = t0 + Duration::seconds(1200 + extra);
        let decision = selector.decide(kind, model.demand(kind), "k", &mut store, &tracker, now);
        prop_assert!(!decision.sticky_used);
        prop_assert_eq!(decision.diverted, decision.shard != prior);
        prop_assert_eq!(store.get("k").unwrap().assigned_at, now);
    }
}

// ---------------------------------------------------------------------------
// percentile
// ---------------------------------------------------------------------------

proptest! {
    /// パーセンタイルは最小値と最大値の間に収まる
    #[test]
    fn percentile_is_within_range(
        values in prop::collection::vec(0.0f64..10_000.0, 1..100),
        p in 0.0f64..=1.0,
    ) {
        let result = percentile(&values, p).unwrap();
        let min = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        prop_assert!(result >= min - 1e-9 && result <= max + 1e-9);
    }
}
