//! 環境変数からのシャード設定読み込み
//!
//! `SHARD_` 付きの名前を優先し、旧名（`PORT`、`CACHE_TTL_SEC` など）へ
//! フォールバックする。

use shardlb_common::config::{ShardConfig, WorkMode};
use shardlb_common::env::{get_env_with_fallback, get_env_with_fallback_or, get_env_with_fallback_parse};

/// バインドアドレスのデフォルト
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// 環境変数からシャード設定を読み込む
pub fn shard_config_from_env() -> ShardConfig {
    let defaults = ShardConfig::default();
    ShardConfig {
        shard_id: get_env_with_fallback_or("SHARD_ID", "SHARD_ID", &defaults.shard_id),
        replica_id: get_env_with_fallback_or("SHARD_REPLICA_ID", "HOSTNAME", &defaults.replica_id),
        port: get_env_with_fallback_parse("SHARD_PORT", "PORT", defaults.port),
        cache_ttl_secs: get_env_with_fallback_parse(
            "SHARD_CACHE_TTL_SEC",
            "CACHE_TTL_SEC",
            defaults.cache_ttl_secs,
        ),
        auth_cache_cap: get_env_with_fallback_parse(
            "SHARD_AUTH_CACHE_CAP",
            "AUTH_CACHE_CAP",
            defaults.auth_cache_cap,
        ),
        feat_cache_cap: get_env_with_fallback_parse(
            "SHARD_FEAT_CACHE_CAP",
            "FEAT_CACHE_CAP",
            defaults.feat_cache_cap,
        ),
        doc_cache_cap: get_env_with_fallback_parse(
            "SHARD_DOC_CACHE_CAP",
            "DOC_CACHE_CAP",
            defaults.doc_cache_cap,
        ),
        auth_iter: get_env_with_fallback_parse("SHARD_AUTH_ITER", "AUTH_ITER", defaults.auth_iter),
        feat_bytes: get_env_with_fallback_parse("SHARD_FEAT_BYTES", "FEAT_BYTES", defaults.feat_bytes),
        doc_dir: get_env_with_fallback_or("SHARD_DOC_DIR", "DOC_DIR", &defaults.doc_dir),
        work_mode: get_env_with_fallback("SHARD_WORK_MODE", "SHARD_WORK_MODE")
            .map(|raw| parse_work_mode(&raw))
            .unwrap_or(defaults.work_mode),
        simulated_ms: get_env_with_fallback_parse(
            "SHARD_SIMULATED_MS",
            "SHARD_SIMULATED_MS",
            defaults.simulated_ms,
        ),
    }
}

/// `real` / `simulated` を解釈する。不明な値は `real`
pub fn parse_work_mode(raw: &str) -> WorkMode {
    match raw.trim().to_ascii_lowercase().as_str() {
        "simulated" | "sim" => WorkMode::Simulated,
        "real" => WorkMode::Real,
        other => {
            tracing::warn!(value = other, "Unknown SHARD_WORK_MODE, using real");
            WorkMode::Real
        }
    }
}
