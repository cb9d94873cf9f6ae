use crate::config::Config;
use crate::error::{RelayError, Result};
use crate::models::ForwardedEvent;
use tracing::{info, warn};

/// Outbound side of the relay towards the approval service.
pub struct ExternalService {
    client: reqwest::Client,
    url: Option<String>,
}

impl ExternalService {
    pub fn new(config: &Config) -> Result<Self> {
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(config.http_timeout)
                .build()?,
            url: config.external_service_url.clone(),
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.url.is_some()
    }

    pub async fn send(&self, event: &ForwardedEvent) -> Result<()> {
        let Some(url) = &self.url else {
            return Ok(());
        };

        let response = self.client.post(url).json(event).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RelayError::UpstreamRejected {
                status: status.as_u16(),
                body,
            });
        }

        info!(issue_key = %event.issue_key, status = status.as_u16(), "Forwarded to external service");
        Ok(())
    }

    /// Forwarding never fails the Jira callback, errors only end up in the log.
    pub async fn forward(&self, event: &ForwardedEvent) {
        if let Err(e) = self.send(event).await {
            warn!(issue_key = %event.issue_key, error = %e, "Error sending event to external service");
        }
    }
}
