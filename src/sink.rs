//! Outbound delivery to the usage collector.
//!
//! The collector exposes one endpoint per sample and one per container
//! termination. Send failures are reported as [`AgentError::SinkUnavailable`]
//! and handled by the dispatcher (log and drop, no retry).

use std::future::Future;
use std::time::Duration;

use crate::error::AgentError;
use crate::event::UsageEvent;

/// Seam between the dispatcher and the collector transport. Implementations
/// must be cheap to clone; each outbound send runs on its own task.
pub trait UsageSink: Clone + Send + Sync + 'static {
    /// Deliver one usage sample, namespaced by host instance id.
    fn send_usage(
        &self,
        instance_id: &str,
        event: &UsageEvent,
    ) -> impl Future<Output = Result<(), AgentError>> + Send;

    /// Notify the collector that a container has finished.
    fn send_finished(&self, container: &str) -> impl Future<Output = Result<(), AgentError>> + Send;
}

/// HTTP collector client.
///
/// POSTs samples to `{base}/instance/{instance_id}/usage` and termination
/// markers to `{base}/container/{container}/finish`.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSink {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { client, base_url }
    }

    /// Client with a send timeout suited to fire-and-forget delivery.
    pub fn default_client() -> Result<reqwest::Client, reqwest::Error> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
    }
}

impl UsageSink for HttpSink {
    async fn send_usage(&self, instance_id: &str, event: &UsageEvent) -> Result<(), AgentError> {
        let url = format!("{}/instance/{}/usage", self.base_url, instance_id);
        self.client
            .post(url)
            .json(event)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    async fn send_finished(&self, container: &str) -> Result<(), AgentError> {
        let url = format!("{}/container/{}/finish", self.base_url, container);
        self.client
            .post(url)
            .body("finished")
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let sink = HttpSink::new(reqwest::Client::new(), "http://collector:8080/");
        assert_eq!(sink.base_url, "http://collector:8080");
    }
}
