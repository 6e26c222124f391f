use pnode_scan_types::{CURRENT_VERSION, NodeRecord};
use semver::Version;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkSummary {
    pub total_nodes: usize,
    pub online_nodes: usize,
    pub offline_nodes: usize,
    pub current_version: String,
    pub adoption_rate: u32,
    pub latest_version: Option<String>,
    pub simulated: bool,
}

pub fn summarize(nodes: &[NodeRecord], simulated: bool) -> NetworkSummary {
    let online_nodes = nodes.iter().filter(|node| node.is_online()).count();
    let on_current = nodes
        .iter()
        .filter(|node| node.version == CURRENT_VERSION)
        .count();
    // Versions that are not valid semver are left out of the latest-version pick.
    let latest_version = nodes
        .iter()
        .filter_map(|node| Version::parse(node.version.trim_start_matches('v')).ok())
        .max()
        .map(|version| version.to_string());

    NetworkSummary {
        total_nodes: nodes.len(),
        online_nodes,
        offline_nodes: nodes.len() - online_nodes,
        current_version: CURRENT_VERSION.to_string(),
        adoption_rate: adoption_rate(on_current, nodes.len()),
        latest_version,
        simulated,
    }
}

fn adoption_rate(on_current: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (on_current.saturating_mul(100) / total) as u32
}
