//! shardlb 共通ライブラリ
//!
//! ルーターとシャードサービスで共有する型定義・設定・エラー・ログ出力

#![warn(missing_docs)]

/// 設定構造体（serdeデフォルト付き）
pub mod config;

/// 環境変数の読み取り（旧名フォールバック付き）
pub mod env;

/// エラー型定義
pub mod error;

/// ロギング初期化とJSON Lines出力
pub mod logging;

/// ログレコード・レスポンスの型定義
pub mod protocol;

/// シャットダウンシグナル待機
pub mod shutdown;

/// シャード・リソース・エンドポイント種別
pub mod types;
