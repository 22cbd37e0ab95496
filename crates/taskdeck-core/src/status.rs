use std::fmt;

use crate::sync::SyncState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Success,
    Error,
}

/// Latest user-facing outcome of a submission attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub kind: StatusKind,
    pub text: String,
}

impl StatusMessage {
    pub fn validation(reason: impl fmt::Display) -> Self {
        Self::error(format!("Error: {reason}"))
    }

    pub fn in_progress(command: impl fmt::Display) -> Self {
        Self {
            kind: StatusKind::Info,
            text: format!("Adding task: {command}..."),
        }
    }

    pub fn added(result: impl fmt::Display) -> Self {
        Self {
            kind: StatusKind::Success,
            text: format!("Task added: {result}"),
        }
    }

    pub fn add_failed(detail: impl fmt::Display) -> Self {
        Self::error(format!("Error adding task: {detail}"))
    }

    fn error(text: String) -> Self {
        Self {
            kind: StatusKind::Error,
            text,
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == StatusKind::Error
    }
}

impl fmt::Display for StatusMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// What the presentation layer renders from a [`SyncState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusView<'a> {
    pub display: &'a str,
    pub status: Option<&'a StatusMessage>,
    pub status_is_error: bool,
    pub last_error: Option<&'a str>,
    pub submit_enabled: bool,
}

pub fn project(state: &SyncState) -> StatusView<'_> {
    let status = state.status.as_ref();
    StatusView {
        display: state.display.text(),
        status,
        status_is_error: status.is_some_and(StatusMessage::is_error),
        last_error: state.last_error.as_deref(),
        submit_enabled: !state.submission_in_flight,
    }
}
