//! shardlb-shard Server Entry Point

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use shardlb_common::config::ShardConfig;
use shardlb_common::logging::{self, emit_json_line};
use shardlb_common::shutdown::shutdown_signal;
use shardlb_shard::config::{shard_config_from_env, DEFAULT_HOST};
use shardlb_shard::request_log::StdoutRequestLogger;
use shardlb_shard::{api, ShardState};
use std::sync::Arc;
use tracing::info;

const DEFAULT_LOG_DIRECTIVES: &str = "shardlb_shard=info,tower_http=info";

/// キャッシュ付きバックエンドシャード
#[derive(Parser, Debug)]
#[command(name = "shardlb-shard", version, about)]
struct Args {
    /// Listen port (overrides SHARD_PORT / PORT)
    #[arg(short, long)]
    port: Option<u16>,

    /// Bind address
    #[arg(short = 'H', long, default_value = DEFAULT_HOST)]
    host: String,
}

/// 起動時に出力する設定（stdoutの1行目）
#[derive(Serialize)]
struct BootBanner<'a> {
    boot_cfg: &'a ShardConfig,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(DEFAULT_LOG_DIRECTIVES).context("failed to initialize logging")?;

    let mut config = shard_config_from_env();
    if let Some(port) = args.port {
        config.port = port;
    }

    emit_json_line(&BootBanner { boot_cfg: &config })
        .context("failed to write boot configuration")?;
    info!(
        shard_id = %config.shard_id,
        replica_id = %config.replica_id,
        work_mode = ?config.work_mode,
        "Shard configuration loaded"
    );

    let bind_addr = format!("{}:{}", args.host, config.port);
    let state = ShardState::new(config, Arc::new(StdoutRequestLogger));
    let app = api::create_app(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {bind_addr}"))?;
    info!("Shard listening on {}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}
