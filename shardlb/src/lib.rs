//! shardlb: リソース特性別シャードへのスティッキールーター
//!
//! リクエスト種別ごとのデマンドとシャードごとのEWMA利用率から転送先を選び、
//! クライアントごとのスティッキー割り当てを維持しながらリクエストを中継する。

#![warn(missing_docs)]

/// REST APIハンドラー（healthz、プロキシ）
pub mod api;

/// ロードバランサー（シャード選択、スティッキー維持、利用率推定）
pub mod balancer;

/// CLIインターフェース
pub mod cli;

/// 設定管理（環境変数ヘルパー）
pub mod config;

/// ルーティング決定ログ
pub mod decision_log;

/// axumサーバー起動・シャットダウン
pub mod server;

use shardlb_common::config::BackendConfig;

/// アプリケーション状態
#[derive(Clone)]
pub struct AppState {
    /// シャードルーター
    pub router: balancer::ShardRouter,
    /// 共有HTTPクライアント（接続プーリング有効）
    pub http_client: reqwest::Client,
    /// バックエンドシャードのアドレス
    pub backends: BackendConfig,
}
