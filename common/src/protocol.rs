//! ログレコード・レスポンス定義
//!
//! ルーターの決定ログ、シャードのリクエストログ、シャードAPIレスポンス

use crate::types::{EndpointKind, ShardId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 決定ログの `selected_replica` に書き込む固定値
pub const DEFAULT_REPLICA: &str = "svc";

/// ルーティング決定ログ（1リクエスト1行）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionRecord {
    /// 記録時刻（レスポンス完了時）
    pub ts: DateTime<Utc>,
    /// エンドポイント種別
    pub endpoint: EndpointKind,
    /// クライアントキー
    pub user_id: String,
    /// 選択されたシャード
    pub selected_shard: ShardId,
    /// 選択されたレプリカ（常に `svc`）
    #[serde(default = "default_replica")]
    pub selected_replica: String,
    /// 負荷スコア `dot(demand, U[shard])`
    #[serde(rename = "L")]
    pub load: f64,
    /// ローカリティフラグ（完了時点のヒントと選択シャードが一致すれば1.0）
    pub locality: f64,
    /// 総合スコア（スティッキー維持時は0）
    pub score: f64,
    /// スティッキー経路を使ったか
    pub sticky_used: bool,
    /// 以前のスティッキー割当から変更されたか
    pub diverted: bool,
}

fn default_replica() -> String {
    DEFAULT_REPLICA.to_string()
}

/// シャードAPIの成功レスポンス
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShardResponse {
    /// 成功フラグ
    pub ok: bool,
    /// キャッシュヒットしたか
    pub cache_hit: bool,
    /// 処理時間（ミリ秒）
    pub latency_ms: u64,
}

/// シャードAPIのエラーレスポンス
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShardErrorResponse {
    /// 常にfalse
    pub ok: bool,
    /// エラー種別（例: `doc_not_found`）
    pub error: String,
    /// 対象リソースID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

/// シャードのリクエストログ（1リクエスト1行）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ShardLogRecord {
    /// 記録時刻
    pub ts: DateTime<Utc>,
    /// エンドポイント種別
    pub endpoint: EndpointKind,
    /// キャッシュキー（featuresは `user:model`、documentは正規化済みID）
    pub user_id: String,
    /// キャッシュヒットしたか
    pub cache_hit: bool,
    /// 処理時間（ミリ秒）。エラー時は欠落することがある
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    /// シャードID（例: `cpu`, `baseline`）
    pub shard_id: String,
    /// レプリカID（ホスト名）
    pub replica_id: String,
}
