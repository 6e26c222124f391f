use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, warn};

use crate::dashboard::{DashboardEvent, DashboardState};
use crate::fetch::{Directory, DirectoryFetcher};

pub type SharedDashboard = Arc<Mutex<DashboardState>>;

pub const DEFAULT_REFRESH_MS: u64 = 15_000;

pub fn shared(state: DashboardState) -> SharedDashboard {
    Arc::new(Mutex::new(state))
}

// Swaps the state out, runs one transition and stores the result.
pub fn transition<T>(
    dashboard: &SharedDashboard,
    step: impl FnOnce(DashboardState) -> (DashboardState, T),
) -> Result<T, String> {
    let mut guard = dashboard
        .lock()
        .map_err(|_| "dashboard lock poisoned".to_string())?;
    let (next, output) = step(std::mem::take(&mut *guard));
    *guard = next;
    Ok(output)
}

pub fn dispatch(dashboard: &SharedDashboard, event: DashboardEvent) -> Result<(), String> {
    transition(dashboard, |state| (state.apply(event), ()))
}

pub fn snapshot(dashboard: &SharedDashboard) -> Result<DashboardState, String> {
    dashboard
        .lock()
        .map(|guard| guard.clone())
        .map_err(|_| "dashboard lock poisoned".to_string())
}

#[derive(Clone)]
pub struct Poller {
    dashboard: SharedDashboard,
    fetcher: Arc<DirectoryFetcher>,
    every: Duration,
}

impl Poller {
    pub fn new(dashboard: SharedDashboard, fetcher: Arc<DirectoryFetcher>, every: Duration) -> Self {
        Self {
            dashboard,
            fetcher,
            every,
        }
    }

    pub fn dashboard(&self) -> &SharedDashboard {
        &self.dashboard
    }

    pub fn every(&self) -> Duration {
        self.every
    }

    // The lock is not held across the fetch; a slower, older refresh that
    // lands after a newer one is discarded by the sequence guard.
    pub async fn refresh(&self) -> Result<Directory, String> {
        let sequence = transition(&self.dashboard, DashboardState::begin_refresh)?;
        let directory = self.fetcher.fetch_directory_with_outcome().await;
        let event = DashboardEvent::NodesLoaded {
            sequence,
            directory: directory.clone(),
            fetched_at_unix_ms: unix_now_ms(),
        };
        let applied = transition(&self.dashboard, |state| {
            let next = state.apply(event);
            let applied = next.applied_sequence() == sequence;
            (next, applied)
        })?;
        if !applied {
            debug!(sequence, "discarded stale pod directory");
        }
        Ok(directory)
    }

    // Switching auto refresh back on fetches at once instead of waiting for
    // the next tick. Returns the flag as stored.
    pub fn set_auto_refresh(&self, enabled: bool) -> Result<bool, String> {
        let (was_enabled, now_enabled) = transition(&self.dashboard, |state| {
            let was_enabled = state.auto_refresh();
            let next = state.apply(DashboardEvent::AutoRefreshToggled(enabled));
            let now_enabled = next.auto_refresh();
            (next, (was_enabled, now_enabled))
        })?;
        if now_enabled && !was_enabled {
            debug!("auto refresh re-enabled, refreshing now");
            self.refresh_in_background();
        }
        Ok(now_enabled)
    }

    fn refresh_in_background(&self) {
        let poller = self.clone();
        tokio::spawn(async move {
            if let Err(error) = poller.refresh().await {
                warn!(%error, "auto refresh failed");
            }
        });
    }

    // Refreshes are spawned rather than awaited so a slow upstream never
    // delays the next tick.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(self.every);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match snapshot(&self.dashboard) {
                    Ok(state) if !state.auto_refresh() => continue,
                    Ok(_) => {}
                    Err(error) => {
                        warn!(%error, "auto refresh skipped");
                        continue;
                    }
                }
                self.refresh_in_background();
            }
        })
    }
}

pub fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pnode_scan_simulation::Simulator;
    use pnode_scan_types::FetchOutcome;
    use serde_json::{Value, json};
    use tokio::time::sleep;

    use super::*;
    use crate::fetch::{PodSource, SourceFuture};

    fn pod(address: &str) -> Value {
        json!({
            "address": address,
            "version": "1.0.2",
            "status": "Online",
            "last_seen": "Just now"
        })
    }

    // First call answers slowly with "slow", every later call answers at once with "fast".
    struct SlowThenFast {
        calls: AtomicUsize,
    }

    impl PodSource for SlowThenFast {
        fn fetch_pods(&self) -> SourceFuture<'_, Vec<Value>> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async move {
                if call == 0 {
                    sleep(Duration::from_millis(300)).await;
                    Ok(vec![pod("10.0.0.1:9001")])
                } else {
                    Ok(vec![pod("10.0.0.2:9001")])
                }
            })
        }
    }

    struct Counting {
        calls: AtomicUsize,
    }

    impl PodSource for Counting {
        fn fetch_pods(&self) -> SourceFuture<'_, Vec<Value>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Box::pin(async { Ok(Vec::new()) })
        }
    }

    fn poller_over(source: Arc<dyn PodSource>, every: Duration, auto_refresh: bool) -> Poller {
        let fetcher = DirectoryFetcher::new(source, Arc::new(Simulator::seeded(3)));
        Poller::new(
            shared(DashboardState::new(auto_refresh)),
            Arc::new(fetcher),
            every,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn slower_older_refresh_does_not_overwrite_newer_list() {
        let source = Arc::new(SlowThenFast {
            calls: AtomicUsize::new(0),
        });
        let poller = poller_over(source, Duration::from_secs(15), true);

        let slow = tokio::spawn({
            let poller = poller.clone();
            async move { poller.refresh().await }
        });
        sleep(Duration::from_millis(10)).await;
        let fast = poller.refresh().await.expect("fast refresh");
        assert_eq!(fast.nodes[0].address, "10.0.0.2:9001");

        let slow = slow.await.expect("join").expect("slow refresh");
        assert_eq!(slow.nodes[0].address, "10.0.0.1:9001");

        let state = snapshot(poller.dashboard()).expect("snapshot");
        assert_eq!(state.nodes()[0].address, "10.0.0.2:9001");
        assert_eq!(state.applied_sequence(), 2);
    }

    #[tokio::test]
    async fn refresh_with_empty_upstream_stores_simulated_fleet() {
        let source = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let poller = poller_over(source, Duration::from_secs(15), true);
        let directory = poller.refresh().await.expect("refresh");
        assert_eq!(directory.outcome, FetchOutcome::EmptyUpstream);

        let state = snapshot(poller.dashboard()).expect("snapshot");
        assert_eq!(state.nodes().len(), 58);
        assert!(state.last_updated_unix_ms().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn interval_respects_auto_refresh_toggle() {
        let source = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let poller = poller_over(source.clone(), Duration::from_secs(15), false);
        let handle = poller.clone().spawn();

        sleep(Duration::from_secs(46)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);

        dispatch(poller.dashboard(), DashboardEvent::AutoRefreshToggled(true)).expect("toggle");
        sleep(Duration::from_secs(30)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);

        handle.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn re_enabling_auto_refresh_fetches_without_waiting_for_a_tick() {
        let source = Arc::new(Counting {
            calls: AtomicUsize::new(0),
        });
        let poller = poller_over(source.clone(), Duration::from_secs(15), false);
        let handle = poller.clone().spawn();

        sleep(Duration::from_secs(20)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 0);

        assert!(poller.set_auto_refresh(true).expect("enable"));
        sleep(Duration::from_millis(10)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);
        assert!(
            snapshot(poller.dashboard())
                .expect("snapshot")
                .last_updated_unix_ms()
                .is_some()
        );

        // Already on: no extra fetch.
        assert!(poller.set_auto_refresh(true).expect("enable again"));
        sleep(Duration::from_millis(10)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        assert!(!poller.set_auto_refresh(false).expect("disable"));
        sleep(Duration::from_millis(10)).await;
        assert_eq!(source.calls.load(Ordering::SeqCst), 1);

        handle.abort();
    }
}
