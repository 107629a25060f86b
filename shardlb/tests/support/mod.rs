//! 統合テスト用の共通ユーティリティ

pub mod http;
pub mod router;
pub mod shard;
