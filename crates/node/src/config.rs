use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use pnode_scan_rpc::{DEFAULT_RPC_TIMEOUT_MS, DEFAULT_RPC_URL, DEFAULT_STATS_PORT};
use reqwest::Url;
use thiserror::Error;

use crate::poller::DEFAULT_REFRESH_MS;

pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

#[derive(Parser, Debug, Clone)]
#[command(name = "pnode-scan", version, about = "pNode network dashboard backend")]
pub struct Cli {
    /// JSON-RPC endpoint serving `get-pods`.
    #[arg(long, env = "PNODE_RPC_URL", default_value = DEFAULT_RPC_URL)]
    pub rpc_url: String,

    #[arg(long, env = "PNODE_SCAN_BIND", default_value = DEFAULT_BIND)]
    pub bind: String,

    #[arg(long, env = "PNODE_SCAN_REFRESH_MS", default_value_t = DEFAULT_REFRESH_MS)]
    pub refresh_ms: u64,

    #[arg(long, env = "PNODE_SCAN_NO_AUTO_REFRESH")]
    pub no_auto_refresh: bool,

    /// Port every pNode serves `get-stats` on.
    #[arg(long, env = "PNODE_STATS_PORT", default_value_t = DEFAULT_STATS_PORT)]
    pub stats_port: u16,

    #[arg(long, env = "PNODE_RPC_TIMEOUT_MS", default_value_t = DEFAULT_RPC_TIMEOUT_MS)]
    pub rpc_timeout_ms: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid rpc url `{url}`: {reason}")]
    InvalidRpcUrl { url: String, reason: String },
    #[error("rpc url `{0}` must use http or https")]
    UnsupportedScheme(String),
    #[error("invalid bind address `{addr}`: {reason}")]
    InvalidBind { addr: String, reason: String },
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanConfig {
    pub rpc_url: String,
    pub bind: SocketAddr,
    pub refresh_interval: Duration,
    pub auto_refresh: bool,
    pub stats_port: u16,
    pub rpc_timeout: Duration,
}

impl ScanConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let url = Url::parse(&cli.rpc_url).map_err(|error| ConfigError::InvalidRpcUrl {
            url: cli.rpc_url.clone(),
            reason: error.to_string(),
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::UnsupportedScheme(cli.rpc_url));
        }
        let bind = cli
            .bind
            .parse::<SocketAddr>()
            .map_err(|error| ConfigError::InvalidBind {
                addr: cli.bind.clone(),
                reason: error.to_string(),
            })?;
        if cli.stats_port == 0 {
            return Err(ConfigError::Zero {
                field: "stats_port",
            });
        }
        Ok(Self {
            rpc_url: cli.rpc_url,
            bind,
            refresh_interval: Duration::from_millis(positive(cli.refresh_ms, "refresh_ms")?),
            auto_refresh: !cli.no_auto_refresh,
            stats_port: cli.stats_port,
            rpc_timeout: Duration::from_millis(positive(cli.rpc_timeout_ms, "rpc_timeout_ms")?),
        })
    }
}

fn positive(value: u64, field: &'static str) -> Result<u64, ConfigError> {
    if value == 0 {
        return Err(ConfigError::Zero { field });
    }
    Ok(value)
}
