#![forbid(unsafe_code)]

pub mod export;
pub mod filter;
pub mod page;
pub mod sort;
pub mod summary;

use pnode_scan_types::NodeRecord;

pub use export::{CSV_HEADER, export_csv, export_file_name};
pub use filter::{FilterState, ParseFilterError, StatusFilter, filter_nodes};
pub use page::{PAGE_SIZE, Page, paginate, total_pages};
pub use sort::{ParseDirectionError, SortConfig, SortDirection, SortKey, sort_nodes};
pub use summary::{NetworkSummary, summarize};

// Filter then sort. Without a sort key the input order is kept.
pub fn process(nodes: &[NodeRecord], filter: &FilterState, sort: &SortConfig) -> Vec<NodeRecord> {
    let mut processed = filter_nodes(nodes, filter);
    sort_nodes(&mut processed, sort);
    processed
}

pub fn process_page(
    nodes: &[NodeRecord],
    filter: &FilterState,
    sort: &SortConfig,
    page: usize,
) -> Page<NodeRecord> {
    paginate(&process(nodes, filter, sort), page, PAGE_SIZE)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use std::collections::BTreeMap;

    use pnode_scan_types::{NodeLocation, NodeRecord, NodeStatus};

    pub fn node(address: &str, status: NodeStatus, country: &str) -> NodeRecord {
        NodeRecord {
            address: address.to_string(),
            version: "1.0.2".to_string(),
            status,
            last_seen: if status.is_online() {
                "Just now".to_string()
            } else {
                "12 mins ago".to_string()
            },
            name: Some(format!("node-{address}")),
            provider: Some("DigitalOcean".to_string()),
            location: Some(NodeLocation {
                country: country.to_string(),
                city: "City".to_string(),
                flag: String::new(),
                region: "Region".to_string(),
            }),
            specs: None,
            extra: BTreeMap::new(),
        }
    }
}
