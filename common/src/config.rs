//! 設定管理
//!
//! RoutingConfig, BackendConfig, ShardConfig等の設定構造体

use crate::error::{CommonError, CommonResult};
use crate::types::{Resource, ShardId};
use serde::{Deserialize, Serialize};

/// ルーティング判定の設定
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// 負荷の重み β (デフォルト: 1.0)
    #[serde(default = "default_load_weight")]
    pub load_weight: f64,

    /// ローカリティの重み γ (デフォルト: 0.5)
    #[serde(default = "default_locality_weight")]
    pub locality_weight: f64,

    /// CPU閾値 (デフォルト: 0.80)
    #[serde(default = "default_threshold")]
    pub threshold_cpu: f64,

    /// メモリ閾値 (デフォルト: 0.80)
    #[serde(default = "default_threshold")]
    pub threshold_mem: f64,

    /// IO閾値 (デフォルト: 0.80)
    #[serde(default = "default_threshold")]
    pub threshold_io: f64,

    /// ヒステリシス窓（秒）(デフォルト: 90)
    ///
    /// 判定ロジックでは参照しない。起動ログにのみ出力する。
    #[serde(default = "default_hysteresis_window")]
    pub hysteresis_window_secs: u64,

    /// 同等とみなすマージン τ (デフォルト: 0.10)
    #[serde(default = "default_equivalence_margin")]
    pub equivalence_margin: f64,

    /// スティッキーTTL（秒）(デフォルト: 1200)
    #[serde(default = "default_sticky_ttl")]
    pub sticky_ttl_secs: u64,

    /// テレメトリ更新間隔（秒）(デフォルト: 20)
    ///
    /// 判定ロジックでは参照しない。
    #[serde(default = "default_telemetry_refresh")]
    pub telemetry_refresh_secs: u64,
}

fn default_load_weight() -> f64 {
    1.0
}

fn default_locality_weight() -> f64 {
    0.5
}

fn default_threshold() -> f64 {
    0.80
}

fn default_hysteresis_window() -> u64 {
    90
}

fn default_equivalence_margin() -> f64 {
    0.10
}

fn default_sticky_ttl() -> u64 {
    1200
}

fn default_telemetry_refresh() -> u64 {
    20
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            load_weight: default_load_weight(),
            locality_weight: default_locality_weight(),
            threshold_cpu: default_threshold(),
            threshold_mem: default_threshold(),
            threshold_io: default_threshold(),
            hysteresis_window_secs: default_hysteresis_window(),
            equivalence_margin: default_equivalence_margin(),
            sticky_ttl_secs: default_sticky_ttl(),
            telemetry_refresh_secs: default_telemetry_refresh(),
        }
    }
}

impl RoutingConfig {
    /// リソース次元ごとの閾値
    pub fn threshold(&self, resource: Resource) -> f64 {
        match resource {
            Resource::Cpu => self.threshold_cpu,
            Resource::Mem => self.threshold_mem,
            Resource::Io => self.threshold_io,
        }
    }

    /// 値の妥当性を検証
    ///
    /// 重み・閾値・τ は有限値であればよい。負の γ はローカリティヒントへの
    /// ボーナスになり、TTL 0 はスティッキー維持を無効にする。
    pub fn validate(&self) -> CommonResult<()> {
        let weights = [
            ("load_weight", self.load_weight),
            ("locality_weight", self.locality_weight),
            ("threshold_cpu", self.threshold_cpu),
            ("threshold_mem", self.threshold_mem),
            ("threshold_io", self.threshold_io),
            ("equivalence_margin", self.equivalence_margin),
        ];
        for (name, value) in weights {
            if !value.is_finite() {
                return Err(CommonError::Validation(format!(
                    "{name} must be a finite number, got {value}"
                )));
            }
        }
        Ok(())
    }
}

/// バックエンドシャードのアドレス
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// CPUシャード (デフォルト: "http://cpu-shard:8080")
    #[serde(default = "default_cpu_backend")]
    pub cpu: String,

    /// メモリシャード (デフォルト: "http://mem-shard:8080")
    #[serde(default = "default_mem_backend")]
    pub mem: String,

    /// IOシャード (デフォルト: "http://io-shard:8080")
    #[serde(default = "default_io_backend")]
    pub io: String,
}

fn default_cpu_backend() -> String {
    "http://cpu-shard:8080".to_string()
}

fn default_mem_backend() -> String {
    "http://mem-shard:8080".to_string()
}

fn default_io_backend() -> String {
    "http://io-shard:8080".to_string()
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            cpu: default_cpu_backend(),
            mem: default_mem_backend(),
            io: default_io_backend(),
        }
    }
}

impl BackendConfig {
    /// シャードのベースURL（末尾スラッシュなし）
    pub fn base_url(&self, shard: ShardId) -> &str {
        let url = match shard {
            ShardId::Cpu => &self.cpu,
            ShardId::Mem => &self.mem,
            ShardId::Io => &self.io,
        };
        url.trim_end_matches('/')
    }

    /// URLの形式を検証
    pub fn validate(&self) -> CommonResult<()> {
        for shard in ShardId::ALL {
            let url = self.base_url(shard);
            let rest = url
                .strip_prefix("http://")
                .or_else(|| url.strip_prefix("https://"));
            match rest {
                Some(host) if !host.is_empty() => {}
                _ => {
                    return Err(CommonError::Validation(format!(
                        "backend URL for shard {shard} must be an absolute http(s) URL, got '{url}'"
                    )))
                }
            }
        }
        Ok(())
    }
}

/// シャードのワーク実行モード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkMode {
    /// 実際のCPU/メモリ/IO処理
    Real,
    /// 固定スリープによる模擬処理
    Simulated,
}

/// シャードサービス設定
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShardConfig {
    /// シャードID（ログ用）(デフォルト: "baseline")
    #[serde(default = "default_shard_id")]
    pub shard_id: String,

    /// レプリカID（ログ用）(デフォルト: "local")
    #[serde(default = "default_replica_id")]
    pub replica_id: String,

    /// ポート番号 (デフォルト: 8080)
    #[serde(default = "default_shard_port")]
    pub port: u16,

    /// キャッシュTTL（秒）(デフォルト: 1800)
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_secs: u64,

    /// authキャッシュ上限 (デフォルト: 2000)
    #[serde(default = "default_auth_cache_cap")]
    pub auth_cache_cap: usize,

    /// featuresキャッシュ上限 (デフォルト: 300)
    #[serde(default = "default_feat_cache_cap")]
    pub feat_cache_cap: usize,

    /// documentキャッシュ上限 (デフォルト: 1000)
    #[serde(default = "default_doc_cache_cap")]
    pub doc_cache_cap: usize,

    /// 鍵導出の反復回数 (デフォルト: 180000)
    #[serde(default = "default_auth_iter")]
    pub auth_iter: u64,

    /// 特徴量ベクトルのバイト数 (デフォルト: 200MiB)
    #[serde(default = "default_feat_bytes")]
    pub feat_bytes: usize,

    /// ドキュメント格納ディレクトリ (デフォルト: "/data/docs")
    #[serde(default = "default_doc_dir")]
    pub doc_dir: String,

    /// ワーク実行モード (デフォルト: real)
    #[serde(default = "default_work_mode")]
    pub work_mode: WorkMode,

    /// 模擬モードのスリープ時間（ミリ秒）(デフォルト: 50)
    #[serde(default = "default_simulated_ms")]
    pub simulated_ms: u64,
}

fn default_shard_id() -> String {
    "baseline".to_string()
}

fn default_replica_id() -> String {
    "local".to_string()
}

fn default_shard_port() -> u16 {
    8080
}

fn default_cache_ttl() -> u64 {
    1800
}

fn default_auth_cache_cap() -> usize {
    2000
}

fn default_feat_cache_cap() -> usize {
    300
}

fn default_doc_cache_cap() -> usize {
    1000
}

fn default_auth_iter() -> u64 {
    180_000
}

fn default_feat_bytes() -> usize {
    200 * 1024 * 1024
}

fn default_doc_dir() -> String {
    "/data/docs".to_string()
}

fn default_work_mode() -> WorkMode {
    WorkMode::Real
}

fn default_simulated_ms() -> u64 {
    50
}

impl Default for ShardConfig {
    fn default() -> Self {
        Self {
            shard_id: default_shard_id(),
            replica_id: default_replica_id(),
            port: default_shard_port(),
            cache_ttl_secs: default_cache_ttl(),
            auth_cache_cap: default_auth_cache_cap(),
            feat_cache_cap: default_feat_cache_cap(),
            doc_cache_cap: default_doc_cache_cap(),
            auth_iter: default_auth_iter(),
            feat_bytes: default_feat_bytes(),
            doc_dir: default_doc_dir(),
            work_mode: default_work_mode(),
            simulated_ms: default_simulated_ms(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routing_config_defaults() {
        let config = RoutingConfig::default();

        assert_eq!(config.load_weight, 1.0);
        assert_eq!(config.locality_weight, 0.5);
        assert_eq!(config.threshold(Resource::Cpu), 0.80);
        assert_eq!(config.threshold(Resource::Mem), 0.80);
        assert_eq!(config.threshold(Resource::Io), 0.80);
        assert_eq!(config.hysteresis_window_secs, 90);
        assert_eq!(config.equivalence_margin, 0.10);
        assert_eq!(config.sticky_ttl_secs, 1200);
        assert_eq!(config.telemetry_refresh_secs, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_routing_config_deserialization() {
        let json = r#"{"load_weight":2.0,"threshold_io":0.5}"#;
        let config: RoutingConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.load_weight, 2.0);
        assert_eq!(config.threshold_io, 0.5);
        // デフォルト値が適用される
        assert_eq!(config.locality_weight, 0.5);
        assert_eq!(config.sticky_ttl_secs, 1200);
    }

    #[test]
    fn test_routing_config_accepts_negative_weights_and_zero_ttl() {
        let config = RoutingConfig {
            locality_weight: -0.5,
            equivalence_margin: -0.1,
            threshold_cpu: -1.0,
            sticky_ttl_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_routing_config_rejects_non_finite_values() {
        let nan = RoutingConfig {
            equivalence_margin: f64::NAN,
            ..Default::default()
        };
        let err = nan.validate().unwrap_err();
        assert!(err.to_string().contains("equivalence_margin"));

        let infinite = RoutingConfig {
            locality_weight: f64::NEG_INFINITY,
            ..Default::default()
        };
        let err = infinite.validate().unwrap_err();
        assert!(err.to_string().contains("locality_weight"));
    }

    #[test]
    fn test_backend_config_base_url_trims_trailing_slash() {
        let config = BackendConfig {
            cpu: "http://127.0.0.1:9001/".to_string(),
            ..Default::default()
        };
        assert_eq!(config.base_url(ShardId::Cpu), "http://127.0.0.1:9001");
        assert_eq!(config.base_url(ShardId::Io), "http://io-shard:8080");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backend_config_rejects_relative_url() {
        let config = BackendConfig {
            mem: "mem-shard:8080".to_string(),
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("mem"));
    }

    #[test]
    fn test_shard_config_defaults() {
        let config = ShardConfig::default();

        assert_eq!(config.shard_id, "baseline");
        assert_eq!(config.port, 8080);
        assert_eq!(config.cache_ttl_secs, 1800);
        assert_eq!(config.auth_cache_cap, 2000);
        assert_eq!(config.feat_cache_cap, 300);
        assert_eq!(config.doc_cache_cap, 1000);
        assert_eq!(config.auth_iter, 180_000);
        assert_eq!(config.feat_bytes, 200 * 1024 * 1024);
        assert_eq!(config.doc_dir, "/data/docs");
        assert_eq!(config.work_mode, WorkMode::Real);
    }

    #[test]
    fn test_shard_config_deserialization() {
        let json = r#"{"shard_id":"io","work_mode":"simulated"}"#;
        let config: ShardConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.shard_id, "io");
        assert_eq!(config.work_mode, WorkMode::Simulated);
        assert_eq!(config.simulated_ms, 50);
    }
}
