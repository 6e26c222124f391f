#![forbid(unsafe_code)]

pub mod config;
pub mod dashboard;
pub mod fetch;
pub mod poller;
pub mod server;

pub use config::{Cli, ConfigError, ScanConfig};
pub use dashboard::{DashboardEvent, DashboardState};
pub use fetch::{
    Directory, DirectoryFetcher, HostStats, NodeStatsRpc, NodeTelemetry, PodSource,
    StatsFetcher, StatsSource,
};
pub use poller::{Poller, SharedDashboard};
pub use server::{AppState, router};
