use async_trait::async_trait;
use thiserror::Error;

/// Failure reported by a gateway call.
///
/// `detail` carries the nested message some transports attach; callers that
/// show the fault to a user should prefer it via [`GatewayFault::detail`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct GatewayFault {
    pub message: String,
    pub detail: Option<String>,
}

impl GatewayFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn detail(&self) -> &str {
        self.detail
            .as_deref()
            .filter(|detail| !detail.trim().is_empty())
            .unwrap_or(&self.message)
    }
}

impl From<anyhow::Error> for GatewayFault {
    fn from(err: anyhow::Error) -> Self {
        Self::new(format!("{err:#}"))
    }
}

/// Access point to the remote task store.
#[async_trait]
pub trait BackendGateway: Send + Sync {
    /// Fully formatted snapshot of every scheduled task.
    async fn list_tasks(&self) -> Result<String, GatewayFault>;

    /// Submits one encoded command line and returns the backend's result text.
    async fn submit_command(&self, command: &str) -> Result<String, GatewayFault>;
}

#[cfg(test)]
mod tests {
    use super::GatewayFault;

    #[test]
    fn detail_prefers_nested_message() {
        let fault = GatewayFault::new("invoke failed").with_detail("parse error");
        assert_eq!(fault.detail(), "parse error");
        assert_eq!(fault.to_string(), "invoke failed");
    }

    #[test]
    fn detail_falls_back_to_message() {
        assert_eq!(GatewayFault::new("parse error").detail(), "parse error");
        let blank = GatewayFault::new("timeout").with_detail("  ");
        assert_eq!(blank.detail(), "timeout");
    }

    #[test]
    fn anyhow_chain_is_flattened() {
        let err = anyhow::anyhow!("disk full").context("failed to save tasks.data");
        let fault = GatewayFault::from(err);
        assert_eq!(fault.message, "failed to save tasks.data: disk full");
    }
}
