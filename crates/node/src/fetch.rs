use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use pnode_scan_rpc::{
    DEFAULT_RPC_TIMEOUT_MS, RpcClient, RpcError, build_http_client, decode_stats, stats_url,
};
use pnode_scan_simulation::{MOCK_FLEET_SIZE, Simulator};
use pnode_scan_types::{FetchOutcome, NodeRecord, NodeStats};
use serde_json::{Value, json};
use tokio::time::{sleep, timeout};
use tracing::{info, warn};

pub const DEFAULT_INSPECT_TIMEOUT_MS: u64 = 1_000;
pub const DEFAULT_FALLBACK_DELAY_MS: u64 = 500;

pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, RpcError>> + Send + 'a>>;

pub trait PodSource: Send + Sync {
    fn fetch_pods(&self) -> SourceFuture<'_, Vec<Value>>;
}

pub trait StatsSource: Send + Sync {
    fn fetch_stats<'a>(&'a self, host: &'a str) -> SourceFuture<'a, Value>;
}

impl PodSource for RpcClient {
    fn fetch_pods(&self) -> SourceFuture<'_, Vec<Value>> {
        Box::pin(self.get_pods())
    }
}

// Each node serves `get-stats` on its own host, so a client is built per call
// on top of one shared connection pool.
#[derive(Clone, Debug)]
pub struct NodeStatsRpc {
    http: reqwest::Client,
    port: u16,
}

impl NodeStatsRpc {
    pub fn new(timeout: Duration, port: u16) -> Result<Self, RpcError> {
        Ok(Self {
            http: build_http_client(timeout)?,
            port,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl StatsSource for NodeStatsRpc {
    fn fetch_stats<'a>(&'a self, host: &'a str) -> SourceFuture<'a, Value> {
        Box::pin(async move {
            RpcClient::with_http(self.http.clone(), stats_url(host, self.port))
                .get_stats()
                .await
        })
    }
}

pub fn outcome_for(error: &RpcError) -> FetchOutcome {
    if error.is_timeout() {
        FetchOutcome::Timeout
    } else {
        FetchOutcome::UpstreamError(error.to_string())
    }
}

// `pods` is what `/api/nodes` serves; `nodes` is the typed view the
// dashboard filters and sorts.
#[derive(Debug, Clone, PartialEq)]
pub struct Directory {
    pub pods: Vec<Value>,
    pub nodes: Vec<NodeRecord>,
    pub outcome: FetchOutcome,
}

impl Directory {
    pub fn live(pods: Vec<Value>) -> Self {
        let nodes: Vec<NodeRecord> = pods.iter().filter_map(NodeRecord::from_pod).collect();
        if nodes.len() < pods.len() {
            warn!(
                skipped = pods.len() - nodes.len(),
                "pods that are not objects are left out of the dashboard view"
            );
        }
        Self {
            pods,
            nodes,
            outcome: FetchOutcome::RealData,
        }
    }

    pub fn from_records(nodes: Vec<NodeRecord>, outcome: FetchOutcome) -> Self {
        let pods = nodes
            .iter()
            .filter_map(|node| serde_json::to_value(node).ok())
            .collect();
        Self {
            pods,
            nodes,
            outcome,
        }
    }
}

pub struct DirectoryFetcher {
    source: Arc<dyn PodSource>,
    simulator: Arc<Simulator>,
    deadline: Duration,
    fleet_size: usize,
}

impl DirectoryFetcher {
    pub fn new(source: Arc<dyn PodSource>, simulator: Arc<Simulator>) -> Self {
        Self {
            source,
            simulator,
            deadline: Duration::from_millis(DEFAULT_RPC_TIMEOUT_MS),
            fleet_size: MOCK_FLEET_SIZE,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub async fn fetch_directory(&self) -> Vec<NodeRecord> {
        self.fetch_directory_with_outcome().await.nodes
    }

    // An empty pod list is treated like an outage: both show the simulated fleet.
    pub async fn fetch_directory_with_outcome(&self) -> Directory {
        let outcome = match timeout(self.deadline, self.source.fetch_pods()).await {
            Ok(Ok(pods)) if !pods.is_empty() => {
                info!(pods = pods.len(), "fetched live pod list");
                return Directory::live(pods);
            }
            Ok(Ok(_)) => FetchOutcome::EmptyUpstream,
            Ok(Err(error)) => outcome_for(&error),
            Err(_) => FetchOutcome::Timeout,
        };
        warn!(
            %outcome,
            fleet_size = self.fleet_size,
            "pod list unavailable, serving simulated fleet"
        );
        Directory::from_records(self.simulator.fleet(self.fleet_size), outcome)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeTelemetry {
    pub stats: NodeStats,
    pub outcome: FetchOutcome,
}

// `get-stats` result as the node sent it, or the demo figures.
#[derive(Debug, Clone, PartialEq)]
pub struct HostStats {
    pub body: Value,
    pub outcome: FetchOutcome,
}

pub struct StatsFetcher {
    source: Arc<dyn StatsSource>,
    simulator: Arc<Simulator>,
    inspect_timeout: Duration,
    fallback_delay: Duration,
}

impl StatsFetcher {
    pub fn new(source: Arc<dyn StatsSource>, simulator: Arc<Simulator>) -> Self {
        Self {
            source,
            simulator,
            inspect_timeout: Duration::from_millis(DEFAULT_INSPECT_TIMEOUT_MS),
            fallback_delay: Duration::from_millis(DEFAULT_FALLBACK_DELAY_MS),
        }
    }

    pub fn with_inspect_timeout(mut self, inspect_timeout: Duration) -> Self {
        self.inspect_timeout = inspect_timeout;
        self
    }

    pub fn with_fallback_delay(mut self, fallback_delay: Duration) -> Self {
        self.fallback_delay = fallback_delay;
        self
    }

    pub async fn fetch_stats(&self, node: &NodeRecord) -> NodeStats {
        self.fetch_stats_with_outcome(node).await.stats
    }

    // Inspector path: bounded by the inspect timeout, and on failure the
    // simulated stats arrive only after `fallback_delay`, however fast the
    // failure was.
    pub async fn fetch_stats_with_outcome(&self, node: &NodeRecord) -> NodeTelemetry {
        let host = node.host();
        let outcome = match timeout(self.inspect_timeout, self.source.fetch_stats(host)).await {
            Ok(Ok(raw)) => match decode_stats(&raw) {
                Ok(stats) => {
                    return NodeTelemetry {
                        stats,
                        outcome: FetchOutcome::RealData,
                    };
                }
                Err(error) => outcome_for(&error),
            },
            Ok(Err(error)) => outcome_for(&error),
            Err(_) => FetchOutcome::Timeout,
        };
        warn!(host, %outcome, "node stats unavailable, simulating telemetry");
        sleep(self.fallback_delay).await;
        NodeTelemetry {
            stats: self.simulator.inspector_stats(node.specs.as_ref()),
            outcome,
        }
    }

    // `/api/stats` path: only the source's own request timeout applies, and a
    // live result is passed through undecoded. A null result reads as `{}`.
    pub async fn fetch_host_stats(&self, host: &str) -> HostStats {
        match self.source.fetch_stats(host).await {
            Ok(Value::Null) => HostStats {
                body: json!({}),
                outcome: FetchOutcome::RealData,
            },
            Ok(body) => HostStats {
                body,
                outcome: FetchOutcome::RealData,
            },
            Err(error) => {
                let outcome = outcome_for(&error);
                warn!(host, %outcome, "node stats unavailable, serving demo stats");
                let body = serde_json::to_value(self.simulator.endpoint_stats())
                    .unwrap_or_else(|_| json!({}));
                HostStats { body, outcome }
            }
        }
    }
}
