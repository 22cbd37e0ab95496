use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::watch;
use tracing::debug;

use crate::status::StatusMessage;

pub const LOADING_MARKER: &str = "Loading tasks...";
pub const LOAD_FAILED_MARKER: &str = "Failed to load tasks.";

/// What the schedule pane shows.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Pane {
    #[default]
    Loading,
    Tasks(String),
    LoadFailed,
}

impl Pane {
    pub fn text(&self) -> &str {
        match self {
            Pane::Loading => LOADING_MARKER,
            Pane::Tasks(text) => text,
            Pane::LoadFailed => LOAD_FAILED_MARKER,
        }
    }
}

/// Client view of the remote schedule plus the submission bookkeeping.
///
/// The poller owns `display` and `last_error`; the submission controller owns
/// `submission_in_flight` and `status`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncState {
    pub display: Pane,
    pub last_error: Option<String>,
    pub submission_in_flight: bool,
    pub status: Option<StatusMessage>,
}

/// Shared container for [`SyncState`].
///
/// Clones refer to the same state. Writes are synchronous closures and never
/// span an await point. After [`SyncHandle::detach`] every write is dropped,
/// so late gateway responses cannot touch a torn-down page.
#[derive(Debug, Clone)]
pub struct SyncHandle {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    tx: watch::Sender<SyncState>,
    attached: AtomicBool,
}

impl Default for SyncHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SyncState::default());
        Self {
            inner: Arc::new(Inner {
                tx,
                attached: AtomicBool::new(true),
            }),
        }
    }

    pub fn snapshot(&self) -> SyncState {
        self.inner.tx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SyncState> {
        self.inner.tx.subscribe()
    }

    pub fn is_attached(&self) -> bool {
        self.inner.attached.load(Ordering::Acquire)
    }

    pub fn detach(&self) {
        if self.inner.attached.swap(false, Ordering::AcqRel) {
            debug!("sync state detached");
        }
    }

    /// Applies `f` and notifies subscribers if anything changed.
    ///
    /// Returns `false` when the handle has been detached and the write was
    /// discarded.
    pub fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut SyncState),
    {
        if !self.is_attached() {
            debug!("discarding write to detached sync state");
            return false;
        }

        self.inner.tx.send_if_modified(|state| {
            let before = state.clone();
            f(state);
            *state != before
        });
        true
    }
}
