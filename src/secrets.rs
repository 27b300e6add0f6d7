//! Resolves Slack channel names to webhook URLs from a mounted secret store.
//!
//! Each channel has one file under the configured root, named exactly after
//! the channel and containing the webhook URL. Nothing is cached: every call
//! re-reads the file so rotated credentials take effect on the next send.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum SecretError {
    #[error("invalid Slack channel name")]
    InvalidChannel,

    #[error("no webhook secret found for channel '{channel}'")]
    NotFound { channel: String },

    #[error("webhook secret for channel '{channel}' is empty")]
    Empty { channel: String },

    #[error("failed to read webhook secret for channel '{channel}': {source}")]
    Io {
        channel: String,
        #[source]
        source: std::io::Error,
    },
}

/// A resolved Slack incoming-webhook URL.
///
/// The URL is a credential, so `Debug` never prints it.
#[derive(Clone, PartialEq, Eq)]
pub struct SlackWebhook(String);

impl SlackWebhook {
    pub fn url(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SlackWebhook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SlackWebhook(<redacted>)")
    }
}

/// Reads per-channel webhook secrets from `<root>/<channel>`.
#[derive(Debug, Clone)]
pub struct SecretResolver {
    root: PathBuf,
}

impl SecretResolver {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolves `channel` to its webhook URL.
    pub async fn resolve(&self, channel: Option<&str>) -> Result<SlackWebhook, SecretError> {
        let channel = validate_channel(channel)?;
        let path = self.root.join(channel);
        debug!(channel, path = %path.display(), "Resolving Slack webhook secret");

        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SecretError::NotFound {
                    channel: channel.to_string(),
                })
            }
            Err(e) => {
                return Err(SecretError::Io {
                    channel: channel.to_string(),
                    source: e,
                })
            }
        };

        let url = contents.trim();
        if url.is_empty() {
            return Err(SecretError::Empty {
                channel: channel.to_string(),
            });
        }
        Ok(SlackWebhook(url.to_string()))
    }
}

/// Rejects empty names and anything that could escape the secret root.
fn validate_channel(channel: Option<&str>) -> Result<&str, SecretError> {
    let channel = channel.map(str::trim).unwrap_or_default();
    if channel.is_empty()
        || channel.starts_with('.')
        || channel.contains(['/', '\\'])
        || channel.contains("..")
    {
        return Err(SecretError::InvalidChannel);
    }
    Ok(channel)
}
