//! Core domain types and service traits for the dispatcher
//!
//! This module defines the alert requests accepted by the service, the
//! per-channel outcome model, and the trait contracts that the channel senders
//! implement. Everything here is constructed per request and discarded once a
//! dispatch completes.

use crate::notification::NotificationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// A delivery mechanism for a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Email,
    Slack,
}

impl ChannelKind {
    /// The lowercase wire name of the channel.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelKind::Email => "email",
            ChannelKind::Slack => "slack",
        }
    }
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "email" => Ok(ChannelKind::Email),
            "slack" => Ok(ChannelKind::Slack),
            other => Err(other.to_string()),
        }
    }
}

/// A single stock "buy signal" record, used only for rendering.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct StockRecord {
    #[serde(default)]
    pub symbol: String,
    #[serde(default)]
    pub buy_rating: f64,
    #[serde(default)]
    pub overall_sentiment: String,
    /// Free-form drivers; rendered as text.
    #[serde(default)]
    pub key_drivers: serde_json::Value,
    #[serde(default)]
    pub confidence: String,
    #[serde(default)]
    pub summary: String,
}

impl StockRecord {
    /// Renders `key_drivers` as display text.
    ///
    /// Strings are used verbatim, arrays are comma-joined with string elements
    /// unquoted, `null` is empty and anything else is compact JSON.
    pub fn key_drivers_text(&self) -> String {
        match &self.key_drivers {
            serde_json::Value::Null => String::new(),
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Array(items) => items
                .iter()
                .map(|item| match item {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", "),
            other => other.to_string(),
        }
    }
}

/// The payload of an alert, discriminated by kind.
#[derive(Debug, Clone, PartialEq)]
pub enum AlertKind {
    /// One or more services failed a health check.
    Health { issues: Vec<String> },
    /// A batch of stock buy signals.
    Stock { records: Vec<StockRecord> },
    /// A free-form message.
    Generic {
        subject: String,
        body: String,
        recipient: Option<String>,
    },
    /// A raw message destined for a Slack channel.
    Slack { message: String },
}

impl AlertKind {
    /// A short label used in logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            AlertKind::Health { .. } => "health",
            AlertKind::Stock { .. } => "stock",
            AlertKind::Generic { .. } => "generic",
            AlertKind::Slack { .. } => "slack",
        }
    }

    fn default_channel(&self) -> ChannelKind {
        match self {
            AlertKind::Slack { .. } => ChannelKind::Slack,
            _ => ChannelKind::Email,
        }
    }
}

/// An inbound alert request, as handed to the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertRequest {
    pub kind: AlertKind,
    /// Requested channel names; unknown names are ignored.
    pub channels: Option<Vec<String>>,
    /// Slack destination channel name.
    pub channel: Option<String>,
}

impl AlertRequest {
    pub fn new(kind: AlertKind) -> Self {
        Self {
            kind,
            channels: None,
            channel: None,
        }
    }

    pub fn with_channels<I, S>(mut self, channels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.channels = Some(channels.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_slack_channel(mut self, channel: impl Into<String>) -> Self {
        self.channel = Some(channel.into());
        self
    }

    /// Resolves the set of channels this alert should be delivered to.
    ///
    /// Unknown channel names are logged and skipped. When nothing usable was
    /// requested the alert kind's default channel is used.
    pub fn requested_channels(&self) -> BTreeSet<ChannelKind> {
        let mut resolved = BTreeSet::new();
        for name in self.channels.iter().flatten() {
            match name.parse::<ChannelKind>() {
                Ok(kind) => {
                    resolved.insert(kind);
                }
                Err(unknown) => {
                    warn!(channel = %unknown, kind = self.kind.label(), "Ignoring unknown channel kind");
                    metrics::counter!("unknown_channels_total").increment(1);
                }
            }
        }
        if resolved.is_empty() {
            resolved.insert(self.kind.default_channel());
        }
        resolved
    }
}

/// The result of attempting delivery on a single channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "lowercase")]
pub enum Outcome {
    Sent,
    Failed(String),
}

impl Outcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, Outcome::Sent)
    }

    /// Label used for the `outcome` metrics dimension.
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Sent => "sent",
            Outcome::Failed(_) => "failed",
        }
    }
}

impl From<Result<(), NotificationError>> for Outcome {
    fn from(result: Result<(), NotificationError>) -> Self {
        match result {
            Ok(()) => Outcome::Sent,
            Err(e) => Outcome::Failed(e.to_string()),
        }
    }
}

/// Per-channel outcomes of a single dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct DispatchResult {
    outcomes: BTreeMap<ChannelKind, Outcome>,
}

impl DispatchResult {
    pub(crate) fn from_outcomes(outcomes: impl IntoIterator<Item = (ChannelKind, Outcome)>) -> Self {
        Self {
            outcomes: outcomes.into_iter().collect(),
        }
    }

    pub fn get(&self, channel: ChannelKind) -> Option<&Outcome> {
        self.outcomes.get(&channel)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ChannelKind, &Outcome)> {
        self.outcomes.iter()
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// True when every attempted channel reported `Sent`.
    pub fn all_sent(&self) -> bool {
        self.outcomes.values().all(Outcome::is_sent)
    }
}

/// A fully formatted email ready to hand to an `EmailSender`.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailMessage {
    pub subject: String,
    pub body: String,
    pub recipient: String,
    pub is_html: bool,
    /// Display name paired with the configured sender address.
    pub display_name: String,
}

// =============================================================================
// Service Traits
// =============================================================================

/// Delivers a single email.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Sends one message over a freshly opened session.
    ///
    /// # Returns
    /// * `Ok(())` once the server accepted the message
    /// * `Err` for missing configuration, bad addresses or transport failures
    async fn send_email(&self, email: &EmailMessage) -> Result<(), NotificationError>;
}

/// Posts a message to a named Slack channel.
#[async_trait]
pub trait SlackSender: Send + Sync {
    /// Resolves the channel's webhook and posts `message` to it.
    ///
    /// # Returns
    /// * `Ok(())` if the webhook answered with a 2xx status
    /// * `Err` if the channel could not be resolved or the request failed
    async fn send_slack(&self, message: &str, channel: Option<&str>) -> Result<(), NotificationError>;
}
