use pnode_scan_pipeline::{
    FilterState, NetworkSummary, PAGE_SIZE, Page, SortConfig, SortKey, StatusFilter, paginate,
    process, summarize,
};
use pnode_scan_types::{FetchOutcome, NodeRecord, NodeStats};

use crate::fetch::Directory;

#[derive(Debug, Clone)]
pub enum DashboardEvent {
    RefreshStarted,
    NodesLoaded {
        sequence: u64,
        directory: Directory,
        fetched_at_unix_ms: u64,
    },
    SearchChanged(String),
    StatusFilterChanged(StatusFilter),
    SortRequested(SortKey),
    SortChanged(SortConfig),
    PageChanged(usize),
    NodeSelected(NodeRecord),
    StatsLoaded {
        address: String,
        stats: NodeStats,
    },
    NodeDeselected,
    AutoRefreshToggled(bool),
}

#[derive(Debug, Clone, PartialEq)]
pub struct DashboardState {
    nodes: Vec<NodeRecord>,
    outcome: Option<FetchOutcome>,
    last_updated_unix_ms: Option<u64>,
    filter: FilterState,
    sort: SortConfig,
    page: usize,
    auto_refresh: bool,
    selected: Option<NodeRecord>,
    selected_stats: Option<NodeStats>,
    issued_sequence: u64,
    applied_sequence: u64,
}

impl Default for DashboardState {
    fn default() -> Self {
        Self::new(true)
    }
}

impl DashboardState {
    pub fn new(auto_refresh: bool) -> Self {
        Self {
            nodes: Vec::new(),
            outcome: None,
            last_updated_unix_ms: None,
            filter: FilterState::default(),
            sort: SortConfig::default(),
            page: 1,
            auto_refresh,
            selected: None,
            selected_stats: None,
            issued_sequence: 0,
            applied_sequence: 0,
        }
    }

    pub fn apply(self, event: DashboardEvent) -> Self {
        match event {
            DashboardEvent::RefreshStarted => Self {
                issued_sequence: self.issued_sequence.saturating_add(1),
                ..self
            },
            DashboardEvent::NodesLoaded {
                sequence,
                directory,
                fetched_at_unix_ms,
            } => {
                if sequence <= self.applied_sequence {
                    return self;
                }
                Self {
                    nodes: directory.nodes,
                    outcome: Some(directory.outcome),
                    last_updated_unix_ms: Some(fetched_at_unix_ms),
                    applied_sequence: sequence,
                    ..self
                }
            }
            DashboardEvent::SearchChanged(search_term) => Self {
                filter: FilterState {
                    search_term,
                    ..self.filter
                },
                ..self
            },
            DashboardEvent::StatusFilterChanged(status_filter) => Self {
                filter: FilterState {
                    status_filter,
                    ..self.filter
                },
                ..self
            },
            DashboardEvent::SortRequested(key) => Self {
                sort: self.sort.request(key),
                ..self
            },
            DashboardEvent::SortChanged(sort) => Self { sort, ..self },
            DashboardEvent::PageChanged(page) => Self {
                page: page.max(1),
                ..self
            },
            DashboardEvent::NodeSelected(node) => Self {
                selected: Some(node),
                selected_stats: None,
                ..self
            },
            DashboardEvent::StatsLoaded { address, stats } => {
                let still_selected = self
                    .selected
                    .as_ref()
                    .is_some_and(|node| node.address == address);
                if !still_selected {
                    return self;
                }
                Self {
                    selected_stats: Some(stats),
                    ..self
                }
            }
            DashboardEvent::NodeDeselected => Self {
                selected: None,
                selected_stats: None,
                ..self
            },
            DashboardEvent::AutoRefreshToggled(auto_refresh) => Self {
                auto_refresh,
                ..self
            },
        }
    }

    // Issues the next request sequence; pair it with `NodesLoaded` once the fetch lands.
    pub fn begin_refresh(self) -> (Self, u64) {
        let next = self.apply(DashboardEvent::RefreshStarted);
        let sequence = next.issued_sequence;
        (next, sequence)
    }

    pub fn view(&self) -> Page<NodeRecord> {
        paginate(
            &process(&self.nodes, &self.filter, &self.sort),
            self.page,
            PAGE_SIZE,
        )
    }

    pub fn summary(&self) -> NetworkSummary {
        summarize(&self.nodes, self.is_simulated())
    }

    pub fn is_simulated(&self) -> bool {
        self.outcome
            .as_ref()
            .is_some_and(FetchOutcome::is_simulated)
    }

    pub fn nodes(&self) -> &[NodeRecord] {
        &self.nodes
    }

    pub fn find_node(&self, address: &str) -> Option<&NodeRecord> {
        self.nodes.iter().find(|node| node.address == address)
    }

    pub fn outcome(&self) -> Option<&FetchOutcome> {
        self.outcome.as_ref()
    }

    pub fn last_updated_unix_ms(&self) -> Option<u64> {
        self.last_updated_unix_ms
    }

    pub fn filter(&self) -> &FilterState {
        &self.filter
    }

    pub fn sort(&self) -> &SortConfig {
        &self.sort
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn auto_refresh(&self) -> bool {
        self.auto_refresh
    }

    pub fn selected(&self) -> Option<&NodeRecord> {
        self.selected.as_ref()
    }

    pub fn selected_stats(&self) -> Option<&NodeStats> {
        self.selected_stats.as_ref()
    }

    pub fn applied_sequence(&self) -> u64 {
        self.applied_sequence
    }
}
