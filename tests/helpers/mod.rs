//! Shared setup for the integration tests.
#![allow(dead_code)]

use anyhow::Result;
use event_dispatcher::{
    app::App,
    config::{Config, RecipientsConfig},
    internal_metrics::Metrics,
    notification::fake::{FakeEmailSender, FakeSlackSender},
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A configuration suitable for tests: ephemeral port, known recipients and
/// a template path that does not exist.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.recipients = RecipientsConfig {
        health: Some("oncall@example.com".to_string()),
        stock: Some("desk@example.com".to_string()),
        default: Some("team@example.com".to_string()),
    };
    config.template.path = "/nonexistent/email-template.html".into();
    config
}

/// Writes a webhook secret for `channel` under `root`.
pub fn write_secret(root: &Path, channel: &str, url: &str) {
    std::fs::write(root.join(channel), format!("{}\n", url)).unwrap();
}

/// A running application backed by fake senders.
pub struct TestApp {
    pub addr: SocketAddr,
    pub email: FakeEmailSender,
    pub slack: FakeSlackSender,
    shutdown_tx: watch::Sender<bool>,
    handle: JoinHandle<Result<()>>,
}

impl TestApp {
    pub async fn spawn() -> Result<Self> {
        Self::spawn_with(test_config()).await
    }

    pub async fn spawn_with(config: Config) -> Result<Self> {
        let email = FakeEmailSender::new();
        let slack = FakeSlackSender::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let app = App::builder(config)
            .email_sender_override(Arc::new(email.clone()))
            .slack_sender_override(Arc::new(slack.clone()))
            .metrics_override(Metrics::new())
            .build(shutdown_rx)
            .await?;
        let addr = app.local_addr();
        let handle = tokio::spawn(app.run());

        Ok(Self {
            addr,
            email,
            slack,
            shutdown_tx,
            handle,
        })
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Signals shutdown and waits for the application to drain.
    pub async fn shutdown(self, timeout: Duration) -> Result<()> {
        self.shutdown_tx.send(true)?;
        tokio::time::timeout(timeout, self.handle).await???;
        Ok(())
    }
}
