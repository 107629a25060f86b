//! CLI module for shardlb
//!
//! Provides the router server entry point and the offline log analyzer.

pub mod analyze;
pub mod serve;

use clap::{Parser, Subcommand};

/// shardlb - sticky router for cpu/mem/io specialised shards
#[derive(Parser, Debug)]
#[command(name = "shardlb")]
#[command(version, about, long_about = None)]
#[command(after_help = r#"ENVIRONMENT VARIABLES:
    SHARDLB_HOST                     Bind address (default: 0.0.0.0)
    SHARDLB_PORT                     Listen port (default: 8081, legacy: PORT)
    SHARDLB_LOG_LEVEL                Log level (default: info)
    SHARDLB_BETA_LOAD                Load weight (default: 1.0, legacy: BETA_LOAD)
    SHARDLB_GAMMA_LOCALITY           Locality weight (default: 0.5, legacy: GAMMA_LOCALITY)
    SHARDLB_T_CPU / _T_MEM / _T_IO   Sticky thresholds (default: 0.80, legacy: T_CPU ...)
    SHARDLB_TAU                      Equivalence margin (default: 0.10, legacy: TAU)
    SHARDLB_STICKY_TTL_SECS          Sticky TTL seconds (default: 1200, legacy: STICKY_TTL)
    SHARDLB_CPU_SVC / _MEM_SVC / _IO_SVC
                                     Shard base URLs (legacy: CPU_SVC ...)
    SHARDLB_FORWARD_TIMEOUT_SECS     Forward timeout seconds (default: unset)
"#)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the router server (default)
    Serve(serve::ServeArgs),
    /// Summarise router decision logs and shard request logs
    Analyze(analyze::AnalyzeArgs),
}
