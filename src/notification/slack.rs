//! A client for sending notifications to Slack incoming webhooks.

use crate::core::SlackSender;
use crate::notification::NotificationError;
use crate::secrets::SecretResolver;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::{error, info, instrument};

/// Posts messages to the webhook registered for a Slack channel.
///
/// The webhook is looked up through the `SecretResolver` on every send and is
/// not retained once the request completes.
pub struct WebhookSlackSender {
    resolver: SecretResolver,
    client: reqwest::Client,
}

impl WebhookSlackSender {
    /// Creates a new `WebhookSlackSender` whose requests time out after `timeout`.
    pub fn new(resolver: SecretResolver, timeout: Duration) -> Result<Self, NotificationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NotificationError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { resolver, client })
    }

    /// Posts the payload and maps any non-2xx answer to an error.
    async fn post(&self, webhook_url: &str, message: &str) -> Result<(), NotificationError> {
        let payload = json!({ "text": message });
        let response = match self.client.post(webhook_url).json(&payload).send().await {
            Ok(res) => res,
            Err(e) => {
                error!(error = %e, "HTTP request to Slack failed");
                return Err(NotificationError::Transport(describe_reqwest_error(&e)));
            }
        };

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let text = response.text().await.unwrap_or_default();
        error!(
            status = %status,
            body = %text,
            "Failed to send Slack notification"
        );
        Err(NotificationError::Transport(format!(
            "Slack webhook returned status {}, body: {}",
            status, text
        )))
    }
}

fn describe_reqwest_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("Slack webhook request timed out: {e}")
    } else {
        format!("Slack webhook request failed: {e}")
    }
}

#[async_trait]
impl SlackSender for WebhookSlackSender {
    #[instrument(skip(self, message))]
    async fn send_slack(&self, message: &str, channel: Option<&str>) -> Result<(), NotificationError> {
        let webhook = match self.resolver.resolve(channel).await {
            Ok(webhook) => webhook,
            Err(e) => {
                error!(error = %e, "Could not resolve Slack webhook");
                return Err(e.into());
            }
        };

        self.post(webhook.url(), message).await?;
        info!("Successfully sent message to Slack.");
        Ok(())
    }
}
