//! シャード選択
//!
//! 新規選択はスコア `β·L + γ·locality` の最小値を取る（同値は cpu, mem, io の順）。
//! スティッキー割り当てはTTL内かつ支配的リソースの利用率が `閾値 + τ` 以下の間だけ維持する。

use super::affinity::AffinityStore;
use super::demand::DemandVector;
use super::types::{RoutingDecision, ShardScore};
use super::utilization::UtilizationTracker;
use chrono::{DateTime, Duration, Utc};
use shardlb_common::config::RoutingConfig;
use shardlb_common::types::{EndpointKind, ShardId};

/// chrono::Duration に変換できるTTLの上限（約100年）
const MAX_TTL_SECS: u64 = 100 * 365 * 24 * 60 * 60;

/// スコア計算とスティッキー判定
#[derive(Debug, Clone)]
pub struct ShardSelector {
    config: RoutingConfig,
}

impl ShardSelector {
    /// 設定から作成
    pub fn new(config: RoutingConfig) -> Self {
        Self { config }
    }

    /// 判定に使う設定
    pub fn config(&self) -> &RoutingConfig {
        &self.config
    }

    /// スティッキーTTL
    pub fn sticky_ttl(&self) -> Duration {
        Duration::seconds(self.config.sticky_ttl_secs.min(MAX_TTL_SECS) as i64)
    }

    /// 全シャードのスコアをタイブレーク順で返す
    pub fn score_shards(
        &self,
        demand: &DemandVector,
        tracker: &UtilizationTracker,
        hint: Option<ShardId>,
    ) -> [ShardScore; 3] {
        ShardId::ALL.map(|shard| {
            let load = demand.dot(&tracker.get(shard));
            let locality = if hint == Some(shard) { 1.0 } else { 0.0 };
            ShardScore {
                shard,
                load,
                locality,
                score: self.config.load_weight * load + self.config.locality_weight * locality,
            }
        })
    }

    /// スコア最小のシャードを選ぶ
    pub fn fresh_select(
        &self,
        demand: &DemandVector,
        tracker: &UtilizationTracker,
        hint: Option<ShardId>,
    ) -> ShardScore {
        let scores = self.score_shards(demand, tracker, hint);
        let mut best = scores[0];
        for candidate in &scores[1..] {
            // 厳密な比較で同値なら先に並ぶシャードを残す
            if candidate.score < best.score {
                best = *candidate;
            }
        }
        best
    }

    /// スティッキー先の支配的リソース利用率が `閾値 + τ` 以下か
    pub fn can_stay_sticky(
        &self,
        shard: ShardId,
        demand: &DemandVector,
        tracker: &UtilizationTracker,
    ) -> bool {
        let dominant = demand.dominant();
        let utilization = tracker.get(shard).component(dominant);
        utilization <= self.config.threshold(dominant) + self.config.equivalence_margin
    }

    /// 1リクエスト分の判定を行い、アフィニティとローカリティを更新する
    pub fn decide(
        &self,
        endpoint: EndpointKind,
        demand: DemandVector,
        client_key: &str,
        store: &mut AffinityStore,
        tracker: &UtilizationTracker,
        now: DateTime<Utc>,
    ) -> RoutingDecision {
        let prior = store.get(client_key);

        if let Some(entry) = prior {
            if !entry.is_expired(now, self.sticky_ttl())
                && self.can_stay_sticky(entry.shard, &demand, tracker)
            {
                store.set_locality(client_key, entry.shard);
                return RoutingDecision {
                    endpoint,
                    client_key: client_key.to_string(),
                    demand,
                    shard: entry.shard,
                    load: demand.dot(&tracker.get(entry.shard)),
                    score: 0.0,
                    sticky_used: true,
                    diverted: false,
                    decided_at: now,
                };
            }
        }

        let best = self.fresh_select(&demand, tracker, store.locality(client_key));
        let diverted = prior.is_some_and(|entry| entry.shard != best.shard);

        store.set(client_key, best.shard, now);
        store.set_locality(client_key, best.shard);

        RoutingDecision {
            endpoint,
            client_key: client_key.to_string(),
            demand,
            shard: best.shard,
            load: best.load,
            score: best.score,
            sticky_used: false,
            diverted,
            decided_at: now,
        }
    }
}
