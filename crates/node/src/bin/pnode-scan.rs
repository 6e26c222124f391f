#![forbid(unsafe_code)]

use std::sync::Arc;

use clap::Parser;
use pnode_scan::dashboard::DashboardState;
use pnode_scan::poller::shared;
use pnode_scan::{
    AppState, Cli, DirectoryFetcher, NodeStatsRpc, Poller, ScanConfig, StatsFetcher, router,
};
use pnode_scan_rpc::{RpcClient, redact_rpc_url};
use pnode_scan_simulation::Simulator;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ScanConfig::from_cli(Cli::parse())?;

    let simulator = Arc::new(Simulator::from_entropy());
    let pods = RpcClient::new(config.rpc_url.clone(), config.rpc_timeout)?;
    let node_stats = NodeStatsRpc::new(config.rpc_timeout, config.stats_port)?;
    let directory = DirectoryFetcher::new(Arc::new(pods), Arc::clone(&simulator))
        .with_deadline(config.rpc_timeout);
    let stats = StatsFetcher::new(Arc::new(node_stats), Arc::clone(&simulator));

    let dashboard = shared(DashboardState::new(config.auto_refresh));
    let poller = Poller::new(dashboard, Arc::new(directory), config.refresh_interval);

    let app = router(AppState {
        poller: poller.clone(),
        stats: Arc::new(stats),
    });
    let listener = TcpListener::bind(config.bind).await?;

    info!(
        upstream = %redact_rpc_url(&config.rpc_url),
        bind = %config.bind,
        refresh_ms = config.refresh_interval.as_millis() as u64,
        auto_refresh = config.auto_refresh,
        stats_port = config.stats_port,
        "pnode-scan starting"
    );

    let mut server = tokio::spawn(async move { axum::serve(listener, app).await });

    if let Err(error) = poller.refresh().await {
        warn!(%error, "initial directory refresh failed");
    }
    let polling = poller.spawn();

    let finished = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received shutdown signal");
            None
        }
        result = &mut server => Some(result),
    };

    polling.abort();
    let result = match finished {
        Some(result) => result,
        None => {
            server.abort();
            server.await
        }
    };
    match result {
        Ok(Ok(())) => {}
        Ok(Err(error)) => warn!(%error, "http server exited with error"),
        Err(error) if error.is_cancelled() => {}
        Err(error) => warn!(%error, "http server task join error"),
    }

    Ok(())
}
