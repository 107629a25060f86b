//! 利用率トラッカー
//!
//! 観測レイテンシからシャードごとのリソース占有率を推定し、EWMAで平滑化する。
//! 直接計測ではなくレイテンシからの近似であり、定数は挙動互換のため固定。

use super::demand::DemandVector;
use shardlb_common::types::{Resource, ShardId};

/// EWMA平滑化係数 k
pub const EWMA_SMOOTHING: f64 = 0.04;

/// 基準レイテンシ（ミリ秒）
pub const REFERENCE_LATENCY_MS: f64 = 120.0;

/// 利用率の上限
pub const MAX_UTILIZATION: f64 = 0.99;

/// シャードのリソース占有率推定 `(cpu, mem, io)`
///
/// 各成分は `[0, 0.99]` に収まる。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UtilizationVector {
    /// CPU成分
    pub cpu: f64,
    /// メモリ成分
    pub mem: f64,
    /// IO成分
    pub io: f64,
}

impl UtilizationVector {
    /// 新しい利用率ベクトルを作成（範囲外の値はクランプ）
    pub fn new(cpu: f64, mem: f64, io: f64) -> Self {
        Self {
            cpu: clamp_utilization(cpu),
            mem: clamp_utilization(mem),
            io: clamp_utilization(io),
        }
    }

    /// `[cpu, mem, io]` 配列として返す
    pub fn as_array(&self) -> [f64; 3] {
        [self.cpu, self.mem, self.io]
    }

    /// 指定リソースの成分
    pub fn component(&self, resource: Resource) -> f64 {
        self.as_array()[resource.index()]
    }

    /// シャードごとの初期値
    ///
    /// 全ゼロ比較を避けるため、得意リソースだけ少し高い値から始める。
    pub fn initial(shard: ShardId) -> Self {
        match shard {
            ShardId::Cpu => Self::new(0.10, 0.05, 0.05),
            ShardId::Mem => Self::new(0.05, 0.10, 0.05),
            ShardId::Io => Self::new(0.05, 0.05, 0.10),
        }
    }
}

fn clamp_utilization(value: f64) -> f64 {
    if value.is_nan() {
        return 0.0;
    }
    value.clamp(0.0, MAX_UTILIZATION)
}

/// シャードごとのEWMA利用率
#[derive(Debug, Clone, PartialEq)]
pub struct UtilizationTracker {
    vectors: [UtilizationVector; 3],
}

impl UtilizationTracker {
    /// 初期値で作成
    pub fn new() -> Self {
        Self {
            vectors: ShardId::ALL.map(UtilizationVector::initial),
        }
    }

    /// 任意の初期値で作成（`[cpu, mem, io]` シャード順）
    pub fn with_initial(vectors: [UtilizationVector; 3]) -> Self {
        Self { vectors }
    }

    /// シャードの現在の利用率
    pub fn get(&self, shard: ShardId) -> UtilizationVector {
        self.vectors[shard.index()]
    }

    /// 全シャードの利用率（タイブレーク順）
    pub fn snapshot(&self) -> Vec<(ShardId, UtilizationVector)> {
        ShardId::ALL
            .iter()
            .map(|shard| (*shard, self.get(*shard)))
            .collect()
    }

    /// 完了したリクエストの観測レイテンシで利用率を更新する
    ///
    /// `use[i] = min(0.99, demand[i] * latency / 120)`
    /// `U[i] = (1 - k) * U[i] + k * use[i]`
    pub fn update(&mut self, shard: ShardId, demand: &DemandVector, observed_latency_ms: f64) {
        let latency = if observed_latency_ms.is_finite() {
            observed_latency_ms.max(0.0)
        } else {
            0.0
        };
        let usage = demand
            .as_array()
            .map(|d| (d * latency / REFERENCE_LATENCY_MS).min(MAX_UTILIZATION));

        let current = self.vectors[shard.index()].as_array();
        let mut next = [0.0; 3];
        for i in 0..3 {
            next[i] = (1.0 - EWMA_SMOOTHING) * current[i] + EWMA_SMOOTHING * usage[i];
        }
        self.vectors[shard.index()] = UtilizationVector::new(next[0], next[1], next[2]);
    }
}

impl Default for UtilizationTracker {
    fn default() -> Self {
        Self::new()
    }
}
