//! ロードバランサーモジュール
//!
//! リクエスト種別ごとのデマンドとシャードごとのEWMA利用率からシャードを選び、
//! クライアントキーごとのスティッキー割り当てを維持する。
//!
//! 利用率・アフィニティ・ローカリティは `ShardRouter` インスタンスが所有し、
//! 1つの非同期Mutexで直列化する。判定と完了は別々のクリティカルセクションなので、
//! 同じキーへの並行リクエストは後勝ちになる。

pub mod affinity;
pub mod demand;
pub mod lease;
pub mod selector;
pub mod types;
pub mod utilization;

pub use affinity::{AffinityEntry, AffinityStore};
pub use demand::{DemandModel, DemandVector};
pub use lease::RoutingLease;
pub use selector::ShardSelector;
pub use types::{RoutingDecision, RoutingOutcome, ShardScore};
pub use utilization::{UtilizationTracker, UtilizationVector};

use crate::decision_log::SharedDecisionLogger;
use chrono::{DateTime, Utc};
use shardlb_common::config::RoutingConfig;
use shardlb_common::types::{EndpointKind, ShardId};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::Mutex;

/// ロックで保護するルーティング状態
#[derive(Debug, Default)]
struct RoutingState {
    tracker: UtilizationTracker,
    store: AffinityStore,
}

/// シャードルーター
///
/// クローンは同じ状態を共有する。
#[derive(Clone)]
pub struct ShardRouter {
    state: Arc<Mutex<RoutingState>>,
    selector: Arc<ShardSelector>,
    demand: Arc<DemandModel>,
    logger: SharedDecisionLogger,
}

impl ShardRouter {
    /// 初期利用率で作成
    pub fn new(config: RoutingConfig, logger: SharedDecisionLogger) -> Self {
        Self::with_tracker(config, UtilizationTracker::new(), logger)
    }

    /// 任意の利用率で作成
    pub fn with_tracker(
        config: RoutingConfig,
        tracker: UtilizationTracker,
        logger: SharedDecisionLogger,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(RoutingState {
                tracker,
                store: AffinityStore::new(),
            })),
            selector: Arc::new(ShardSelector::new(config)),
            demand: Arc::new(DemandModel::default()),
            logger,
        }
    }

    /// 判定に使う設定
    pub fn config(&self) -> &RoutingConfig {
        self.selector.config()
    }

    /// リクエストパスとクライアントキーから判定し、leaseを開始する
    pub async fn route(&self, path: &str, client_key: &str) -> RoutingLease {
        let decision = self
            .decide(EndpointKind::from_path(path), client_key, Utc::now())
            .await;
        self.begin(decision)
    }

    /// 指定時刻で判定する
    pub async fn decide(
        &self,
        endpoint: EndpointKind,
        client_key: &str,
        now: DateTime<Utc>,
    ) -> RoutingDecision {
        let demand = self.demand.demand(endpoint);
        let mut state = self.state.lock().await;
        let RoutingState { tracker, store } = &mut *state;
        let decision = self
            .selector
            .decide(endpoint, demand, client_key, store, tracker, now);

        tracing::debug!(
            endpoint = %decision.endpoint,
            user_id = %decision.client_key,
            shard = %decision.shard,
            load = decision.load,
            score = decision.score,
            sticky_used = decision.sticky_used,
            diverted = decision.diverted,
            "Routing decision"
        );
        decision
    }

    /// 判定に対するleaseを開始する
    pub fn begin(&self, decision: RoutingDecision) -> RoutingLease {
        RoutingLease::new(self.clone(), decision)
    }

    /// 転送の終了を記録する
    ///
    /// 完了時のみ観測レイテンシで利用率を更新する。決定ログはどちらの場合も出力する。
    pub async fn finish(
        &self,
        decision: &RoutingDecision,
        outcome: RoutingOutcome,
        elapsed: StdDuration,
    ) {
        let locality = {
            let mut state = self.state.lock().await;
            if outcome == RoutingOutcome::Completed {
                let latency_ms = elapsed.as_secs_f64() * 1000.0;
                state
                    .tracker
                    .update(decision.shard, &decision.demand, latency_ms);
            }
            locality_flag(&state.store, &decision.client_key, decision.shard)
        };

        self.logger.record(&decision.to_record(locality, Utc::now()));
    }

    /// 完了時点のヒントでローカリティフラグを評価する
    pub async fn locality_flag(&self, client_key: &str, shard: ShardId) -> f64 {
        let state = self.state.lock().await;
        locality_flag(&state.store, client_key, shard)
    }

    /// シャードの現在の利用率
    pub async fn utilization(&self, shard: ShardId) -> UtilizationVector {
        self.state.lock().await.tracker.get(shard)
    }

    /// 全シャードの利用率
    pub async fn snapshot(&self) -> Vec<(ShardId, UtilizationVector)> {
        self.state.lock().await.tracker.snapshot()
    }

    /// スティッキー割り当て
    pub async fn affinity(&self, client_key: &str) -> Option<AffinityEntry> {
        self.state.lock().await.store.get(client_key)
    }

    /// `(スティッキー割り当て件数, ローカリティヒント件数)`
    pub async fn affinity_counts(&self) -> (usize, usize) {
        let state = self.state.lock().await;
        (state.store.len(), state.store.locality_len())
    }
}

fn locality_flag(store: &AffinityStore, client_key: &str, shard: ShardId) -> f64 {
    if store.locality(client_key) == Some(shard) {
        1.0
    } else {
        0.0
    }
}
