//! Channel senders that deliver formatted alerts to external services.
//!
//! Each sender owns its own failure domain: the email sender talks SMTP, the
//! Slack sender posts to an incoming webhook, and neither shares state with
//! the other. Both report failures as a `NotificationError`, which the
//! dispatcher turns into a per-channel outcome.
pub mod email;
pub mod slack;

#[cfg(any(test, feature = "test-utils"))]
pub mod fake;

pub use email::SmtpEmailSender;
pub use slack::WebhookSlackSender;

use crate::secrets::SecretError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotificationError {
    /// A required setting is absent; nothing was sent over the network.
    #[error("configuration missing: {0}")]
    ConfigurationMissing(&'static str),

    #[error(transparent)]
    Secret(#[from] SecretError),

    /// The message could not be built (e.g. an unparsable address).
    #[error("invalid message: {0}")]
    Message(String),

    /// SMTP or HTTP delivery failed.
    #[error("transport error: {0}")]
    Transport(String),
}
