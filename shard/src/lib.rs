//! shardlb-shard: キャッシュ付きバックエンドシャード
//!
//! auth（CPU）、features（メモリ）、document（IO）の3種類のリクエストを
//! エンドポイントごとのTTLキャッシュ越しに処理する。

#![warn(missing_docs)]

/// REST APIハンドラー
pub mod api;

/// TTL付きキャッシュ
pub mod cache;

/// 環境変数からの設定読み込み
pub mod config;

/// リクエストログ
pub mod request_log;

/// キャッシュミス時の実処理
pub mod work;

use cache::TtlCache;
use chrono::Utc;
use request_log::SharedRequestLogger;
use shardlb_common::config::ShardConfig;
use shardlb_common::protocol::ShardLogRecord;
use shardlb_common::types::EndpointKind;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use work::Worker;

/// エンドポイントごとのキャッシュ
#[derive(Debug)]
pub struct ShardCaches {
    /// 認証済みユーザー
    pub auth: Mutex<TtlCache<()>>,
    /// `user:model` → 特徴量ベクトル
    pub features: Mutex<TtlCache<Vec<u8>>>,
    /// 正規化済みドキュメントID → パース済みドキュメント
    pub documents: Mutex<TtlCache<Arc<serde_json::Value>>>,
}

impl ShardCaches {
    /// 設定のTTLと上限でキャッシュを作成
    pub fn from_config(config: &ShardConfig) -> Self {
        let ttl = Duration::from_secs(config.cache_ttl_secs);
        Self {
            auth: Mutex::new(TtlCache::new(ttl, config.auth_cache_cap)),
            features: Mutex::new(TtlCache::new(ttl, config.feat_cache_cap)),
            documents: Mutex::new(TtlCache::new(ttl, config.doc_cache_cap)),
        }
    }
}

/// アプリケーション状態
#[derive(Clone)]
pub struct ShardState {
    /// 起動時の設定
    pub config: Arc<ShardConfig>,
    /// キャッシュ
    pub caches: Arc<ShardCaches>,
    /// キャッシュミス時の処理
    pub worker: Worker,
    /// リクエストログの出力先
    pub logger: SharedRequestLogger,
}

impl ShardState {
    /// 設定とロガーから状態を作成
    pub fn new(config: ShardConfig, logger: SharedRequestLogger) -> Self {
        Self {
            caches: Arc::new(ShardCaches::from_config(&config)),
            worker: Worker::from_config(&config),
            config: Arc::new(config),
            logger,
        }
    }

    /// リクエストログを1行出力する
    pub fn log_request(
        &self,
        endpoint: EndpointKind,
        key: &str,
        cache_hit: bool,
        latency_ms: Option<u64>,
    ) {
        self.logger.record(&ShardLogRecord {
            ts: Utc::now(),
            endpoint,
            user_id: key.to_string(),
            cache_hit,
            latency_ms,
            shard_id: self.config.shard_id.clone(),
            replica_id: self.config.replica_id.clone(),
        });
    }
}
