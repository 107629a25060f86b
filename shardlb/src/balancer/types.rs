//! ルーティング判定の型定義

use super::demand::DemandVector;
use chrono::{DateTime, Utc};
use shardlb_common::protocol::{DecisionRecord, DEFAULT_REPLICA};
use shardlb_common::types::{EndpointKind, ShardId};

/// 1リクエスト分のルーティング判定
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingDecision {
    /// エンドポイント種別
    pub endpoint: EndpointKind,
    /// クライアントキー（`user_id`）
    pub client_key: String,
    /// リクエスト種別のデマンド
    pub demand: DemandVector,
    /// 選択されたシャード
    pub shard: ShardId,
    /// 選択シャードでの負荷スコア L
    pub load: f64,
    /// 選択スコア（スティッキー維持時は0）
    pub score: f64,
    /// スティッキー割り当てを維持したか
    pub sticky_used: bool,
    /// 既存の割り当てと異なるシャードを選んだか
    pub diverted: bool,
    /// 判定時刻
    pub decided_at: DateTime<Utc>,
}

impl RoutingDecision {
    /// ログレコードへ変換
    ///
    /// `locality` は完了時点のヒントで評価した値を渡す。
    pub fn to_record(&self, locality: f64, ts: DateTime<Utc>) -> DecisionRecord {
        DecisionRecord {
            ts,
            endpoint: self.endpoint,
            user_id: self.client_key.clone(),
            selected_shard: self.shard,
            selected_replica: DEFAULT_REPLICA.to_string(),
            load: self.load,
            locality,
            score: self.score,
            sticky_used: self.sticky_used,
            diverted: self.diverted,
        }
    }
}

/// シャードごとのスコア
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShardScore {
    /// シャード
    pub shard: ShardId,
    /// 負荷 L
    pub load: f64,
    /// ローカリティ（ヒント一致で1.0）
    pub locality: f64,
    /// `β·L + γ·locality`
    pub score: f64,
}

/// 転送結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoutingOutcome {
    /// レスポンスを最後まで返した
    Completed,
    /// バックエンドに到達できなかった
    Failed,
}
