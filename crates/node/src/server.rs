use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse};
use axum::routing::{get, post};
use axum::{Json, Router};
use pnode_scan_pipeline::{
    NetworkSummary, Page, SortConfig, SortDirection, SortKey, StatusFilter, export_csv,
    export_file_name,
};
use pnode_scan_types::{FetchOutcome, NodeRecord, NodeStats};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::dashboard::{DashboardEvent, DashboardState};
use crate::fetch::StatsFetcher;
use crate::poller::{Poller, dispatch, snapshot, unix_now_ms};

type HandlerError = (StatusCode, String);

#[derive(Clone)]
pub struct AppState {
    pub poller: Poller,
    pub stats: Arc<StatsFetcher>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/healthz", get(healthz))
        .route("/api/nodes", post(nodes))
        .route("/api/stats", post(stats))
        .route("/api/view", get(view))
        .route("/api/summary", get(summary))
        .route("/api/export.csv", get(export))
        .route("/api/inspect", post(inspect).delete(dismiss))
        .route("/api/auto-refresh", post(auto_refresh))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsRequest {
    #[serde(rename = "targetIp", default)]
    pub target_ip: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ViewQuery {
    pub search: Option<String>,
    pub status: Option<String>,
    pub sort: Option<String>,
    pub direction: Option<String>,
    pub page: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct SummaryPayload {
    #[serde(flatten)]
    pub summary: NetworkSummary,
    pub outcome: Option<FetchOutcome>,
    pub last_updated_unix_ms: Option<u64>,
    pub auto_refresh: bool,
}

#[derive(Debug, Deserialize)]
pub struct InspectRequest {
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct InspectPayload {
    pub node: NodeRecord,
    pub stats: NodeStats,
    pub outcome: FetchOutcome,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AutoRefresh {
    pub enabled: bool,
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn healthz() -> impl IntoResponse {
    StatusCode::OK
}

async fn nodes(State(state): State<AppState>) -> Result<Json<Vec<Value>>, HandlerError> {
    let directory = state.poller.refresh().await.map_err(internal)?;
    Ok(Json(directory.pods))
}

async fn stats(State(state): State<AppState>, Json(request): Json<StatsRequest>) -> Json<Value> {
    let served = state.stats.fetch_host_stats(&request.target_ip).await;
    debug!(host = %request.target_ip, outcome = %served.outcome, "served node stats");
    Json(served.body)
}

async fn view(
    State(state): State<AppState>,
    Query(query): Query<ViewQuery>,
) -> Result<Json<Page<NodeRecord>>, HandlerError> {
    let current = snapshot(state.poller.dashboard()).map_err(internal)?;
    let scoped = apply_query(current, query)?;
    Ok(Json(scoped.view()))
}

// Query values shape a private copy of the polled state; the shared one is untouched.
fn apply_query(state: DashboardState, query: ViewQuery) -> Result<DashboardState, HandlerError> {
    let mut state = state;
    if let Some(search) = query.search {
        state = state.apply(DashboardEvent::SearchChanged(search));
    }
    if let Some(status) = query.status {
        let filter = StatusFilter::from_str(&status).map_err(bad_request)?;
        state = state.apply(DashboardEvent::StatusFilterChanged(filter));
    }
    let direction = query
        .direction
        .as_deref()
        .map(SortDirection::from_str)
        .transpose()
        .map_err(bad_request)?;
    match (query.sort.filter(|key| !key.is_empty()), direction) {
        (Some(key), direction) => {
            let key = SortKey::from_str(&key).map_err(bad_request)?;
            let config = SortConfig::by(key, direction.unwrap_or_default());
            state = state.apply(DashboardEvent::SortChanged(config));
        }
        (None, Some(direction)) => {
            let config = SortConfig {
                direction,
                ..state.sort().clone()
            };
            state = state.apply(DashboardEvent::SortChanged(config));
        }
        (None, None) => {}
    }
    if let Some(page) = query.page {
        state = state.apply(DashboardEvent::PageChanged(page));
    }
    Ok(state)
}

async fn summary(State(state): State<AppState>) -> Result<Json<SummaryPayload>, HandlerError> {
    let current = snapshot(state.poller.dashboard()).map_err(internal)?;
    Ok(Json(SummaryPayload {
        summary: current.summary(),
        outcome: current.outcome().cloned(),
        last_updated_unix_ms: current.last_updated_unix_ms(),
        auto_refresh: current.auto_refresh(),
    }))
}

async fn export(State(state): State<AppState>) -> Result<impl IntoResponse, HandlerError> {
    let current = snapshot(state.poller.dashboard()).map_err(internal)?;
    let disposition = format!(
        "attachment; filename=\"{}\"",
        export_file_name(u128::from(unix_now_ms()))
    );
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        export_csv(current.nodes()),
    ))
}

async fn inspect(
    State(state): State<AppState>,
    Json(request): Json<InspectRequest>,
) -> Result<Json<InspectPayload>, HandlerError> {
    let dashboard = state.poller.dashboard();
    let node = snapshot(dashboard)
        .map_err(internal)?
        .find_node(&request.address)
        .cloned()
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                format!("unknown node `{}`", request.address),
            )
        })?;
    dispatch(dashboard, DashboardEvent::NodeSelected(node.clone())).map_err(internal)?;

    let telemetry = state.stats.fetch_stats_with_outcome(&node).await;
    dispatch(
        dashboard,
        DashboardEvent::StatsLoaded {
            address: node.address.clone(),
            stats: telemetry.stats.clone(),
        },
    )
    .map_err(internal)?;

    Ok(Json(InspectPayload {
        node,
        stats: telemetry.stats,
        outcome: telemetry.outcome,
    }))
}

async fn dismiss(State(state): State<AppState>) -> Result<StatusCode, HandlerError> {
    dispatch(state.poller.dashboard(), DashboardEvent::NodeDeselected).map_err(internal)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn auto_refresh(
    State(state): State<AppState>,
    Json(request): Json<AutoRefresh>,
) -> Result<Json<AutoRefresh>, HandlerError> {
    let enabled = state
        .poller
        .set_auto_refresh(request.enabled)
        .map_err(internal)?;
    Ok(Json(AutoRefresh { enabled }))
}

fn internal(error: String) -> HandlerError {
    (StatusCode::INTERNAL_SERVER_ERROR, error)
}

fn bad_request(error: impl std::fmt::Display) -> HandlerError {
    (StatusCode::BAD_REQUEST, error.to_string())
}


const INDEX_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8" />
  <meta name="viewport" content="width=device-width,initial-scale=1" />
  <title>Xandeum pNode Scan</title>
  <style>
    :root {
      --bg: #0b1120;
      --panel: #111827;
      --ink: #e5e7eb;
      --muted: #9ca3af;
      --accent: #22d3ee;
      --ok: #34d399;
      --warn: #fbbf24;
      --danger: #f87171;
      --border: #1f2937;
      --mono: ui-monospace, SFMono-Regular, Menlo, Monaco, Consolas, monospace;
      --sans: "IBM Plex Sans", "Avenir Next", "Segoe UI", sans-serif;
    }
    body { margin: 0; background: var(--bg); color: var(--ink); font-family: var(--sans); }
    .wrap { max-width: 1180px; margin: 0 auto; padding: 24px; }
    .title { margin: 0 0 4px 0; font-size: 30px; }
    .subtitle { margin: 0 0 20px 0; color: var(--muted); }
    .banner { display: none; margin-bottom: 16px; padding: 10px 14px; border-radius: 10px;
      border: 1px solid var(--warn); color: var(--warn); font-size: 14px; }
    .grid { display: grid; grid-template-columns: repeat(auto-fit, minmax(200px, 1fr)); gap: 12px; margin-bottom: 16px; }
    .card { background: var(--panel); border: 1px solid var(--border); border-radius: 12px; padding: 14px 16px; }
    .card h3 { margin: 0 0 8px 0; font-size: 12px; color: var(--muted); text-transform: uppercase; letter-spacing: 0.08em; }
    .value { font-size: 26px; font-weight: 650; }
    .toolbar { display: flex; flex-wrap: wrap; gap: 8px; margin-bottom: 12px; }
    input, select, button { background: var(--panel); color: var(--ink); border: 1px solid var(--border);
      border-radius: 8px; padding: 8px 10px; font: inherit; }
    button { cursor: pointer; }
    table { width: 100%; border-collapse: collapse; background: var(--panel); border-radius: 12px; overflow: hidden; }
    th, td { padding: 10px 12px; border-bottom: 1px solid var(--border); text-align: left; font-size: 14px; }
    th { cursor: pointer; color: var(--muted); font-size: 12px; text-transform: uppercase; letter-spacing: 0.06em; }
    tr.row:hover { background: #172033; cursor: pointer; }
    .mono { font-family: var(--mono); font-size: 12px; }
    .ok { color: var(--ok); }
    .off { color: var(--danger); }
    .pager { display: flex; gap: 8px; align-items: center; margin-top: 12px; color: var(--muted); }
    .inspector { display: none; margin-top: 16px; }
    .bar { height: 10px; background: var(--border); border-radius: 6px; overflow: hidden; }
    .bar > div { height: 100%; background: var(--accent); }
  </style>
</head>
<body>
  <div class="wrap">
    <h1 class="title">pNode Scan</h1>
    <p class="subtitle">Xandeum storage network: node directory, telemetry and version adoption.</p>
    <div class="banner" id="banner">Upstream unavailable: showing simulated network data.</div>

    <div class="grid">
      <div class="card"><h3>Total Nodes</h3><div class="value" id="total">-</div></div>
      <div class="card"><h3>Online</h3><div class="value ok" id="online">-</div></div>
      <div class="card"><h3>Offline</h3><div class="value off" id="offline">-</div></div>
      <div class="card"><h3>Adoption</h3><div class="value" id="adoption">-</div></div>
    </div>

    <div class="toolbar">
      <input id="search" placeholder="Search address, country, name, provider" size="36" />
      <select id="status">
        <option value="all">All</option>
        <option value="online">Online</option>
        <option value="offline">Offline</option>
      </select>
      <button id="refresh">Refresh</button>
      <label><input type="checkbox" id="auto" checked /> Auto refresh</label>
      <a href="/api/export.csv"><button type="button">Export CSV</button></a>
    </div>

    <table>
      <thead>
        <tr>
          <th data-key="address">Address</th>
          <th data-key="name">Name</th>
          <th data-key="provider">Provider</th>
          <th data-key="country">Country</th>
          <th data-key="version">Version</th>
          <th data-key="status">Status</th>
          <th data-key="last_seen">Last Seen</th>
        </tr>
      </thead>
      <tbody id="rows"></tbody>
    </table>
    <div class="pager">
      <button id="prev">Prev</button>
      <span id="pageInfo">-</span>
      <button id="next">Next</button>
      <span id="updated"></span>
    </div>

    <section class="card inspector" id="inspector">
      <h3 id="inspectTitle">Node</h3>
      <div class="mono" id="inspectMeta"></div>
      <p>Storage used</p>
      <div class="bar"><div id="storageBar" style="width:0%"></div></div>
      <p class="mono" id="storageText"></p>
      <button id="closeInspect">Close</button>
    </section>
  </div>

  <script>
    const ui = { search: '', status: 'all', sort: '', direction: 'asc', page: 1, totalPages: 1 };

    function text(id, value) { document.getElementById(id).textContent = value; }

    async function loadSummary() {
      const res = await fetch('/api/summary');
      if (!res.ok) return;
      const s = await res.json();
      text('total', s.total_nodes);
      text('online', s.online_nodes);
      text('offline', s.offline_nodes);
      text('adoption', s.adoption_rate + '% on v' + s.current_version);
      document.getElementById('banner').style.display = s.simulated ? 'block' : 'none';
      document.getElementById('auto').checked = s.auto_refresh;
      if (s.last_updated_unix_ms) {
        text('updated', 'Updated ' + new Date(s.last_updated_unix_ms).toLocaleTimeString());
      }
    }

    async function loadView() {
      const params = new URLSearchParams({
        search: ui.search, status: ui.status, sort: ui.sort, direction: ui.direction, page: ui.page,
      });
      const res = await fetch('/api/view?' + params);
      if (!res.ok) return;
      const view = await res.json();
      ui.page = view.page;
      ui.totalPages = view.total_pages;
      const rows = document.getElementById('rows');
      rows.innerHTML = '';
      for (const node of view.items) {
        const tr = document.createElement('tr');
        tr.className = 'row';
        const cells = [
          node.address, node.name || '', node.provider || '',
          node.location ? node.location.country : '', node.version || '', node.status, node.last_seen || '',
        ];
        for (const [i, value] of cells.entries()) {
          const td = document.createElement('td');
          td.textContent = value;
          if (i === 0) td.className = 'mono';
          if (i === 5) td.className = value === 'Online' ? 'ok' : 'off';
          tr.appendChild(td);
        }
        tr.addEventListener('click', () => inspect(node.address));
        rows.appendChild(tr);
      }
      text('pageInfo', 'Page ' + view.page + ' of ' + Math.max(view.total_pages, 1) + ' (' + view.total_items + ' nodes)');
    }

    async function inspect(address) {
      const panel = document.getElementById('inspector');
      panel.style.display = 'block';
      text('inspectTitle', address);
      text('inspectMeta', 'Connecting...');
      const res = await fetch('/api/inspect', {
        method: 'POST', headers: { 'Content-Type': 'application/json' }, body: JSON.stringify({ address }),
      });
      if (!res.ok) { text('inspectMeta', 'Node not found'); return; }
      const data = await res.json();
      const specs = data.stats.specs || {};
      const simulated = data.outcome.kind !== 'real_data';
      text('inspectMeta', (specs.cpu || '-') + ' / ' + (specs.ram || '-') + (simulated ? ' (simulated)' : ''));
      const total = data.stats.metadata.total_bytes;
      const used = data.stats.file_size;
      const pct = total > 0 ? Math.min(100, (used / total) * 100) : 0;
      document.getElementById('storageBar').style.width = pct.toFixed(1) + '%';
      text('storageText', (used / 1e9).toFixed(2) + ' GB of ' + (total / 1e9).toFixed(2) + ' GB');
    }

    async function refreshAll() {
      await fetch('/api/nodes', { method: 'POST' });
      await Promise.all([loadSummary(), loadView()]);
    }

    document.getElementById('search').addEventListener('input', (e) => { ui.search = e.target.value; ui.page = 1; loadView(); });
    document.getElementById('status').addEventListener('change', (e) => { ui.status = e.target.value; ui.page = 1; loadView(); });
    document.getElementById('prev').addEventListener('click', () => { if (ui.page > 1) { ui.page -= 1; loadView(); } });
    document.getElementById('next').addEventListener('click', () => { if (ui.page < ui.totalPages) { ui.page += 1; loadView(); } });
    document.getElementById('refresh').addEventListener('click', refreshAll);
    document.getElementById('closeInspect').addEventListener('click', async () => {
      document.getElementById('inspector').style.display = 'none';
      await fetch('/api/inspect', { method: 'DELETE' });
    });
    document.getElementById('auto').addEventListener('change', async (e) => {
      await fetch('/api/auto-refresh', {
        method: 'POST', headers: { 'Content-Type': 'application/json' }, body: JSON.stringify({ enabled: e.target.checked }),
      });
    });
    for (const th of document.querySelectorAll('th[data-key]')) {
      th.addEventListener('click', () => {
        const key = th.dataset.key;
        ui.direction = ui.sort === key && ui.direction === 'asc' ? 'desc' : 'asc';
        ui.sort = key;
        loadView();
      });
    }

    refreshAll();
    setInterval(() => Promise.all([loadSummary(), loadView()]), 5000);
  </script>
</body>
</html>
"#;
