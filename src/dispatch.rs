//! The dispatch aggregator: fans one alert out to its requested channels.
//!
//! Every channel is attempted exactly once and independently. Sender errors
//! and panics are captured per channel and reported as `Outcome::Failed`, so
//! nothing raised while handling one channel can stop another from being
//! attempted or escape to the caller.

use crate::config::RecipientsConfig;
use crate::core::{
    AlertKind, AlertRequest, ChannelKind, DispatchResult, EmailMessage, EmailSender, Outcome,
    SlackSender,
};
use crate::formatting::{self, MARKET_DISPLAY_NAME, NOTIFICATION_DISPLAY_NAME};
use crate::internal_metrics::Metrics;
use crate::notification::NotificationError;
use crate::task_manager::TaskManager;
use crate::template::TemplateRenderer;
use futures::future::{join_all, BoxFuture};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Reported for a channel whose processing panicked.
pub const PANIC_REASON: &str = "channel task panicked";

/// Orchestrates formatting and delivery for each requested channel.
pub struct Dispatcher {
    email: Arc<dyn EmailSender>,
    slack: Arc<dyn SlackSender>,
    renderer: TemplateRenderer,
    recipients: RecipientsConfig,
    metrics: Metrics,
}

impl Dispatcher {
    /// Creates a `Dispatcher` from explicit parts.
    pub fn new(
        email: Arc<dyn EmailSender>,
        slack: Arc<dyn SlackSender>,
        renderer: TemplateRenderer,
        recipients: RecipientsConfig,
    ) -> Self {
        Self {
            email,
            slack,
            renderer,
            recipients,
            metrics: Metrics::new(),
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Attempts delivery on every requested channel and reports each outcome.
    pub async fn dispatch(&self, alert: &AlertRequest) -> DispatchResult {
        let started = Instant::now();
        let kind = alert.kind.label();
        self.metrics.increment_alerts_received(kind);

        let timestamp = formatting::alert_timestamp(&chrono::Local::now());
        let attempts = alert.requested_channels().into_iter().map(|channel| {
            let attempt = self.attempt(channel, alert, &timestamp);
            async move {
                let outcome = match AssertUnwindSafe(attempt).catch_unwind().await {
                    Ok(result) => Outcome::from(result),
                    Err(_) => {
                        error!(%channel, kind, "Channel delivery panicked");
                        Outcome::Failed(PANIC_REASON.to_string())
                    }
                };
                (channel, outcome)
            }
        });
        let result = DispatchResult::from_outcomes(join_all(attempts).await);

        for (channel, outcome) in result.iter() {
            self.metrics.record_channel_outcome(*channel, outcome);
            match outcome {
                Outcome::Sent => info!(%channel, kind, "Alert delivered"),
                Outcome::Failed(reason) => warn!(%channel, kind, %reason, "Alert delivery failed"),
            }
        }
        self.metrics.record_dispatch_duration(started.elapsed());

        if result.all_sent() {
            info!(kind, channels = result.len(), "Dispatch completed");
        } else {
            warn!(kind, ?result, "Dispatch completed with failures");
        }
        result
    }

    /// Hands the alert to a background task and returns immediately.
    ///
    /// The outcome is only logged and counted; the caller never observes it.
    pub fn spawn_dispatch(self: &Arc<Self>, alert: AlertRequest, tasks: &TaskManager) {
        let dispatcher = Arc::clone(self);
        tasks.spawn("dispatch", async move {
            dispatcher.dispatch(&alert).await;
        });
    }

    /// Builds the content for one channel and calls its sender.
    fn attempt<'a>(
        &'a self,
        channel: ChannelKind,
        alert: &'a AlertRequest,
        timestamp: &'a str,
    ) -> BoxFuture<'a, Result<(), NotificationError>> {
        async move {
            match channel {
                ChannelKind::Email => {
                    let email = self.email_for(&alert.kind, timestamp).await?;
                    self.email.send_email(&email).await
                }
                ChannelKind::Slack => {
                    let message = slack_message_for(&alert.kind);
                    self.slack.send_slack(&message, alert.channel.as_deref()).await
                }
            }
        }
        .boxed()
    }

    async fn email_for(&self, kind: &AlertKind, timestamp: &str) -> Result<EmailMessage, NotificationError> {
        let missing = || NotificationError::ConfigurationMissing("no recipient configured for this alert");
        let email = match kind {
            AlertKind::Health { issues } => EmailMessage {
                subject: formatting::health_subject(timestamp),
                body: formatting::health_email_body(issues),
                recipient: self.recipients.for_health().ok_or_else(missing)?.to_string(),
                is_html: false,
                display_name: NOTIFICATION_DISPLAY_NAME.to_string(),
            },
            AlertKind::Stock { records } => EmailMessage {
                subject: formatting::stock_subject(timestamp),
                body: self.renderer.render(records).await,
                recipient: self.recipients.for_stock().ok_or_else(missing)?.to_string(),
                is_html: true,
                display_name: MARKET_DISPLAY_NAME.to_string(),
            },
            AlertKind::Generic {
                subject,
                body,
                recipient,
            } => EmailMessage {
                subject: subject.clone(),
                body: body.clone(),
                recipient: recipient
                    .as_deref()
                    .filter(|r| !r.is_empty())
                    .or(self.recipients.fallback())
                    .ok_or_else(missing)?
                    .to_string(),
                is_html: false,
                display_name: NOTIFICATION_DISPLAY_NAME.to_string(),
            },
            AlertKind::Slack { message } => EmailMessage {
                subject: formatting::slack_email_subject(),
                body: message.clone(),
                recipient: self.recipients.fallback().ok_or_else(missing)?.to_string(),
                is_html: false,
                display_name: NOTIFICATION_DISPLAY_NAME.to_string(),
            },
        };
        Ok(email)
    }
}

fn slack_message_for(kind: &AlertKind) -> String {
    match kind {
        AlertKind::Health { issues } => formatting::health_slack_message(issues),
        AlertKind::Stock { records } => formatting::stock_slack_message(records),
        AlertKind::Generic { subject, body, .. } => formatting::generic_slack_message(subject, body),
        AlertKind::Slack { message } => message.clone(),
    }
}
