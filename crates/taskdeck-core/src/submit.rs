use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::command::CommandString;
use crate::form::{FormError, FormFields};
use crate::gateway::{BackendGateway, GatewayFault};
use crate::poller::Refresher;
use crate::status::StatusMessage;
use crate::sync::SyncHandle;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Validation failed; the gateway was not called.
    Invalid(FormError),
    /// A submission was already in flight; the gateway was not called.
    Busy,
    Added {
        command: CommandString,
        result: String,
    },
    Failed {
        command: CommandString,
        fault: GatewayFault,
    },
}

impl SubmitOutcome {
    pub fn is_added(&self) -> bool {
        matches!(self, SubmitOutcome::Added { .. })
    }
}

/// Turns the form into a backend command and submits it.
#[derive(Clone)]
pub struct SubmissionController {
    gateway: Arc<dyn BackendGateway>,
    sync: SyncHandle,
    refresher: Refresher,
}

/// Clears the in-flight flag when the submission settles, including when the
/// submitting future is dropped mid-call.
struct InFlight<'a> {
    sync: &'a SyncHandle,
}

impl<'a> InFlight<'a> {
    fn begin(sync: &'a SyncHandle) -> Self {
        sync.update(|state| state.submission_in_flight = true);
        Self { sync }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.sync.update(|state| state.submission_in_flight = false);
    }
}

impl SubmissionController {
    pub fn new(gateway: Arc<dyn BackendGateway>, sync: SyncHandle, refresher: Refresher) -> Self {
        Self {
            gateway,
            sync,
            refresher,
        }
    }

    fn publish(&self, message: StatusMessage) {
        self.sync.update(|state| state.status = Some(message));
    }

    #[tracing::instrument(skip(self, form))]
    pub async fn submit(&self, form: &mut FormFields) -> SubmitOutcome {
        let fields = match form.validate() {
            Ok(fields) => fields,
            Err(err) => {
                debug!(error = %err, "rejected submission before gateway call");
                self.publish(StatusMessage::validation(&err));
                return SubmitOutcome::Invalid(err);
            }
        };

        if self.sync.snapshot().submission_in_flight {
            warn!("submission already in flight; ignoring");
            return SubmitOutcome::Busy;
        }

        let command = fields.encode();
        let guard = InFlight::begin(&self.sync);
        self.publish(StatusMessage::in_progress(&command));
        info!(command = %command, "submitting task command");

        let outcome = match self.gateway.submit_command(command.as_str()).await {
            Ok(result) => {
                info!(result = %result, "task command accepted");
                self.publish(StatusMessage::added(&result));
                form.clear_name();
                self.refresher.refresh_now();
                SubmitOutcome::Added { command, result }
            }
            Err(fault) => {
                warn!(error = %fault, detail = %fault.detail(), "task command failed");
                self.publish(StatusMessage::add_failed(fault.detail()));
                SubmitOutcome::Failed { command, fault }
            }
        };

        drop(guard);
        outcome
    }
}
