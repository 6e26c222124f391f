use std::fmt;
use std::str::FromStr;

use pnode_scan_types::{NodeRecord, NodeStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StatusFilter {
    #[default]
    All,
    Online,
    Offline,
}

impl StatusFilter {
    pub fn admits(self, status: NodeStatus) -> bool {
        match self {
            Self::All => true,
            Self::Online => status == NodeStatus::Online,
            Self::Offline => status == NodeStatus::Offline,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::All => "All",
            Self::Online => "Online",
            Self::Offline => "Offline",
        }
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown status filter `{0}`, expected All, Online or Offline")]
pub struct ParseFilterError(pub String);

impl FromStr for StatusFilter {
    type Err = ParseFilterError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "all" => Ok(Self::All),
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            _ => Err(ParseFilterError(raw.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterState {
    pub search_term: String,
    pub status_filter: StatusFilter,
}

impl FilterState {
    pub fn matches(&self, node: &NodeRecord) -> bool {
        let needle = self.search_term.to_lowercase();
        matches_search(node, &needle) && self.status_filter.admits(node.status)
    }
}

pub fn filter_nodes(nodes: &[NodeRecord], filter: &FilterState) -> Vec<NodeRecord> {
    let needle = filter.search_term.to_lowercase();
    nodes
        .iter()
        .filter(|node| matches_search(node, &needle) && filter.status_filter.admits(node.status))
        .cloned()
        .collect()
}

fn matches_search(node: &NodeRecord, needle: &str) -> bool {
    if needle.is_empty() {
        return true;
    }
    [
        Some(node.address.as_str()),
        node.country(),
        node.name(),
        node.provider(),
    ]
    .into_iter()
    .flatten()
    .any(|haystack| haystack.to_lowercase().contains(needle))
}
