use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::gateway::BackendGateway;
use crate::sync::{Pane, SyncHandle};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// One-shot fetch of the schedule into the shared state.
///
/// Every fetch applies its own result when it resolves, so overlapping
/// fetches settle on whichever response arrived last.
#[derive(Clone)]
pub struct Refresher {
    gateway: Arc<dyn BackendGateway>,
    sync: SyncHandle,
}

impl Refresher {
    pub fn new(gateway: Arc<dyn BackendGateway>, sync: SyncHandle) -> Self {
        Self { gateway, sync }
    }

    /// Spawns a fetch without waiting for it.
    pub fn refresh_now(&self) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            this.fetch_once().await;
        })
    }

    /// Returns `true` when the result was written to the state.
    #[tracing::instrument(skip(self))]
    pub async fn fetch_once(&self) -> bool {
        let result = self.gateway.list_tasks().await;

        let applied = match result {
            Ok(text) => {
                debug!(bytes = text.len(), "loaded task snapshot");
                self.sync.update(|state| {
                    state.display = Pane::Tasks(text);
                    state.last_error = None;
                })
            }
            Err(fault) => {
                warn!(error = %fault, "failed to load tasks");
                self.sync.update(|state| {
                    state.display = Pane::LoadFailed;
                    state.last_error = Some(format!("Error loading tasks: {}", fault.detail()));
                })
            }
        };

        if !applied {
            debug!("page closed before snapshot arrived; result ignored");
        }
        applied
    }
}

/// Drives [`Refresher`] on a fixed period.
///
/// The first tick fires immediately on [`PollingScheduler::start`]. Missed
/// ticks are skipped rather than replayed.
pub struct PollingScheduler {
    refresher: Refresher,
    period: Duration,
    timer: Option<JoinHandle<()>>,
}

impl PollingScheduler {
    pub fn new(refresher: Refresher, period: Duration) -> Self {
        Self {
            refresher,
            period,
            timer: None,
        }
    }

    pub fn refresher(&self) -> &Refresher {
        &self.refresher
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn is_running(&self) -> bool {
        self.timer.as_ref().is_some_and(|timer| !timer.is_finished())
    }

    /// Must be called from within a tokio runtime. Calling it while already
    /// running is a no-op.
    pub fn start(&mut self) {
        if self.is_running() {
            debug!("poller already running");
            return;
        }

        let refresher = self.refresher.clone();
        let period = self.period;
        info!(period_ms = period.as_millis() as u64, "starting task poller");

        self.timer = Some(tokio::spawn(async move {
            let mut ticker = time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut tick: u64 = 0;
            loop {
                ticker.tick().await;
                tick = tick.wrapping_add(1);
                debug!(tick, "poll tick");
                refresher.refresh_now();
            }
        }));
    }

    /// Cancels the timer. Fetches already in flight are left to finish.
    pub fn stop(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
            info!("stopped task poller");
        }
    }
}

impl Drop for PollingScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use super::{PollingScheduler, Refresher};
    use crate::gateway::{BackendGateway, GatewayFault};
    use crate::sync::{Pane, SyncHandle};

    #[derive(Default)]
    struct CountingGateway {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl BackendGateway for CountingGateway {
        async fn list_tasks(&self) -> Result<String, GatewayFault> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.fail {
                return Err(GatewayFault::new("backend offline"));
            }
            Ok(format!("snapshot {n}"))
        }

        async fn submit_command(&self, _command: &str) -> Result<String, GatewayFault> {
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn failed_fetch_sets_marker_and_error() {
        let gateway = Arc::new(CountingGateway {
            fail: true,
            ..CountingGateway::default()
        });
        let sync = SyncHandle::new();
        let refresher = Refresher::new(gateway, sync.clone());

        assert!(refresher.fetch_once().await);
        let state = sync.snapshot();
        assert_eq!(state.display, Pane::LoadFailed);
        assert_eq!(
            state.last_error.as_deref(),
            Some("Error loading tasks: backend offline")
        );
    }

    #[tokio::test]
    async fn detached_state_ignores_late_result() {
        let gateway = Arc::new(CountingGateway::default());
        let sync = SyncHandle::new();
        let refresher = Refresher::new(gateway, sync.clone());
        sync.detach();

        assert!(!refresher.fetch_once().await);
        assert_eq!(sync.snapshot().display, Pane::Loading);
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_immediately_then_every_period() {
        let gateway = Arc::new(CountingGateway::default());
        let sync = SyncHandle::new();
        let refresher = Refresher::new(gateway.clone(), sync.clone());
        let mut poller = PollingScheduler::new(refresher, Duration::from_secs(5));

        poller.start();
        assert!(poller.is_running());
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 2);
        assert_eq!(sync.snapshot().display, Pane::Tasks("snapshot 2".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_cancels_timer() {
        let gateway = Arc::new(CountingGateway::default());
        let refresher = Refresher::new(gateway.clone(), SyncHandle::new());
        let mut poller = PollingScheduler::new(refresher, Duration::from_secs(5));

        poller.start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        poller.stop();
        assert!(!poller.is_running());

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn start_twice_keeps_single_timer() {
        let gateway = Arc::new(CountingGateway::default());
        let refresher = Refresher::new(gateway.clone(), SyncHandle::new());
        let mut poller = PollingScheduler::new(refresher, Duration::from_secs(5));

        poller.start();
        poller.start();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(gateway.calls.load(Ordering::SeqCst), 1);
    }
}
