use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::form::FormFields;
use crate::gateway::BackendGateway;
use crate::poller::{PollingScheduler, Refresher};
use crate::submit::{SubmissionController, SubmitOutcome};
use crate::sync::{SyncHandle, SyncState};

/// The scheduling surface while it is active: form, poller and submission
/// controller wired to one [`SyncHandle`].
///
/// Opening starts the poller; [`TaskPage::close`] (or dropping the page)
/// stops it and detaches the state so late responses are discarded.
pub struct TaskPage {
    pub form: FormFields,
    sync: SyncHandle,
    poller: PollingScheduler,
    controller: SubmissionController,
}

impl TaskPage {
    /// Must be called from within a tokio runtime.
    pub fn open(gateway: Arc<dyn BackendGateway>, period: Duration, form: FormFields) -> Self {
        let sync = SyncHandle::new();
        let refresher = Refresher::new(gateway.clone(), sync.clone());
        let controller = SubmissionController::new(gateway, sync.clone(), refresher.clone());
        let mut poller = PollingScheduler::new(refresher, period);
        poller.start();
        info!(period_ms = period.as_millis() as u64, "task page opened");

        Self {
            form,
            sync,
            poller,
            controller,
        }
    }

    pub fn state(&self) -> SyncState {
        self.sync.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.sync.subscribe()
    }

    pub fn refresh_now(&self) -> JoinHandle<()> {
        self.poller.refresher().refresh_now()
    }

    pub async fn submit(&mut self) -> SubmitOutcome {
        self.controller.submit(&mut self.form).await
    }

    pub fn is_open(&self) -> bool {
        self.sync.is_attached()
    }

    pub fn close(&mut self) {
        if !self.is_open() {
            return;
        }
        self.poller.stop();
        self.sync.detach();
        info!("task page closed");
    }
}

impl Drop for TaskPage {
    fn drop(&mut self) {
        self.close();
    }
}
