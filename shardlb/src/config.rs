//! Configuration management via environment variables
//!
//! Every setting has a preferred `SHARDLB_*` name and a legacy short name.
//! The legacy name still works but logs a deprecation warning.

use crate::cli::serve::ServeArgs;
use shardlb_common::config::{BackendConfig, RoutingConfig};
use shardlb_common::env::{get_env_with_fallback_or, get_env_with_fallback_parse};
use std::time::Duration;

/// Default listen port
pub const DEFAULT_PORT: u16 = 8081;

/// Default bind address
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Environment variable for the optional forward timeout
pub const FORWARD_TIMEOUT_ENV: &str = "SHARDLB_FORWARD_TIMEOUT_SECS";

/// Listen address of the router
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Bind address
    pub host: String,
    /// Listen port
    pub port: u16,
}

impl ServerConfig {
    /// Load the listen address from environment variables.
    pub fn from_env() -> Self {
        let host = get_env_with_fallback_or("SHARDLB_HOST", "HOST", DEFAULT_HOST);
        let port = get_env_with_fallback_parse("SHARDLB_PORT", "PORT", DEFAULT_PORT);
        Self { host, port }
    }

    /// Command-line arguments override environment variables.
    pub fn from_args(args: &ServeArgs) -> Self {
        let env = Self::from_env();
        Self {
            host: args.host.clone().unwrap_or(env.host),
            port: args.port.unwrap_or(env.port),
        }
    }

    /// `host:port`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Load routing weights, thresholds and TTL from environment variables.
pub fn routing_config_from_env() -> RoutingConfig {
    let defaults = RoutingConfig::default();
    RoutingConfig {
        load_weight: get_env_with_fallback_parse(
            "SHARDLB_BETA_LOAD",
            "BETA_LOAD",
            defaults.load_weight,
        ),
        locality_weight: get_env_with_fallback_parse(
            "SHARDLB_GAMMA_LOCALITY",
            "GAMMA_LOCALITY",
            defaults.locality_weight,
        ),
        threshold_cpu: get_env_with_fallback_parse("SHARDLB_T_CPU", "T_CPU", defaults.threshold_cpu),
        threshold_mem: get_env_with_fallback_parse("SHARDLB_T_MEM", "T_MEM", defaults.threshold_mem),
        threshold_io: get_env_with_fallback_parse("SHARDLB_T_IO", "T_IO", defaults.threshold_io),
        hysteresis_window_secs: get_env_with_fallback_parse(
            "SHARDLB_HYSTERESIS_WINDOW_SECS",
            "W",
            defaults.hysteresis_window_secs,
        ),
        equivalence_margin: get_env_with_fallback_parse(
            "SHARDLB_TAU",
            "TAU",
            defaults.equivalence_margin,
        ),
        sticky_ttl_secs: get_env_with_fallback_parse(
            "SHARDLB_STICKY_TTL_SECS",
            "STICKY_TTL",
            defaults.sticky_ttl_secs,
        ),
        telemetry_refresh_secs: get_env_with_fallback_parse(
            "SHARDLB_TELEMETRY_REFRESH_SECS",
            "F",
            defaults.telemetry_refresh_secs,
        ),
    }
}

/// Load backend shard addresses from environment variables.
pub fn backend_config_from_env() -> BackendConfig {
    let defaults = BackendConfig::default();
    BackendConfig {
        cpu: get_env_with_fallback_or("SHARDLB_CPU_SVC", "CPU_SVC", &defaults.cpu),
        mem: get_env_with_fallback_or("SHARDLB_MEM_SVC", "MEM_SVC", &defaults.mem),
        io: get_env_with_fallback_or("SHARDLB_IO_SVC", "IO_SVC", &defaults.io),
    }
}

/// Load the optional forward timeout.
///
/// Unset, unparsable or zero values disable the timeout.
pub fn forward_timeout_from_env() -> Option<Duration> {
    std::env::var(FORWARD_TIMEOUT_ENV)
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}
