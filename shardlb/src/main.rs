//! shardlb Server Entry Point

use anyhow::Context;
use clap::Parser;
use shardlb::balancer::ShardRouter;
use shardlb::cli::{serve::ServeArgs, Cli, Commands};
use shardlb::config::{
    backend_config_from_env, forward_timeout_from_env, routing_config_from_env, ServerConfig,
};
use shardlb::decision_log::StdoutDecisionLogger;
use shardlb::{server, AppState};
use shardlb_common::logging;
use std::sync::Arc;
use tracing::info;

const DEFAULT_LOG_DIRECTIVES: &str = "shardlb=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Analyze(args)) => {
            let report = shardlb::cli::analyze::execute(&args)?;
            print!("{report}");
            Ok(())
        }
        Some(Commands::Serve(args)) => run_server(args).await,
        None => run_server(ServeArgs::default()).await,
    }
}

async fn run_server(args: ServeArgs) -> anyhow::Result<()> {
    logging::init(DEFAULT_LOG_DIRECTIVES).context("failed to initialize logging")?;

    let server_config = ServerConfig::from_args(&args);
    let routing = routing_config_from_env();
    routing
        .validate()
        .context("invalid routing configuration")?;
    let backends = backend_config_from_env();
    backends
        .validate()
        .context("invalid backend configuration")?;
    let forward_timeout = forward_timeout_from_env();

    info!(
        beta_load = routing.load_weight,
        gamma_locality = routing.locality_weight,
        t_cpu = routing.threshold_cpu,
        t_mem = routing.threshold_mem,
        t_io = routing.threshold_io,
        tau = routing.equivalence_margin,
        sticky_ttl_secs = routing.sticky_ttl_secs,
        "Routing configuration loaded"
    );
    info!(
        hysteresis_window_secs = routing.hysteresis_window_secs,
        telemetry_refresh_secs = routing.telemetry_refresh_secs,
        "Hysteresis window and telemetry refresh are reported only; decisions do not use them"
    );
    info!(
        cpu = %backends.cpu,
        mem = %backends.mem,
        io = %backends.io,
        forward_timeout_secs = forward_timeout.map(|t| t.as_secs()),
        "Backend shards configured"
    );

    let mut client_builder = reqwest::Client::builder();
    if let Some(timeout) = forward_timeout {
        client_builder = client_builder.timeout(timeout);
    }
    let http_client = client_builder
        .build()
        .context("Failed to create HTTP client")?;

    let state = AppState {
        router: ShardRouter::new(routing, Arc::new(StdoutDecisionLogger)),
        http_client,
        backends,
    };

    server::run(state, &server_config.bind_addr()).await
}
