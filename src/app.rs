//! The main application logic, decoupled from the entry point.

use crate::{
    api::{self, AppState},
    config::Config,
    core::{EmailSender, SlackSender},
    dispatch::Dispatcher,
    internal_metrics::{Metrics, MetricsBuilder},
    notification::{SmtpEmailSender, WebhookSlackSender},
    secrets::SecretResolver,
    task_manager::TaskManager,
    template::TemplateRenderer,
};
use anyhow::{Context, Result};
use axum::Router;
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{info, instrument};

/// A handle to the bound, not yet serving, application.
pub struct App {
    listener: TcpListener,
    router: Router,
    task_manager: TaskManager,
    shutdown_rx: watch::Receiver<bool>,
    local_addr: SocketAddr,
    metrics_addr: Option<SocketAddr>,
}

impl App {
    /// Creates a new `AppBuilder` to construct an `App`.
    pub fn builder(config: Config) -> AppBuilder {
        AppBuilder::new(config)
    }

    /// The address the HTTP API is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn metrics_addr(&self) -> Option<SocketAddr> {
        self.metrics_addr
    }

    /// Serves requests until the shutdown signal, then waits for every
    /// in-flight dispatch to finish.
    pub async fn run(self) -> Result<()> {
        let mut shutdown_rx = self.shutdown_rx;
        let shutdown = async move {
            let _ = shutdown_rx.wait_for(|stop| *stop).await;
            info!("Shutdown signal received. Draining in-flight dispatches...");
        };

        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .context("HTTP server error")?;

        self.task_manager.shutdown().await;
        info!("All tasks shut down.");
        Ok(())
    }
}

/// Builder for the main application.
///
/// Production senders are created from the configuration unless an override
/// is supplied, which is how the integration tests swap in fakes.
pub struct AppBuilder {
    config: Config,
    email_override: Option<Arc<dyn EmailSender>>,
    slack_override: Option<Arc<dyn SlackSender>>,
    metrics_override: Option<Metrics>,
}

impl AppBuilder {
    /// Creates a new `AppBuilder` with the given configuration.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            email_override: None,
            slack_override: None,
            metrics_override: None,
        }
    }

    /// Overrides the email sender for testing.
    pub fn email_sender_override(mut self, sender: Arc<dyn EmailSender>) -> Self {
        self.email_override = Some(sender);
        self
    }

    /// Overrides the Slack sender for testing.
    pub fn slack_sender_override(mut self, sender: Arc<dyn SlackSender>) -> Self {
        self.slack_override = Some(sender);
        self
    }

    /// Overrides the metrics system for testing.
    pub fn metrics_override(mut self, metrics: Metrics) -> Self {
        self.metrics_override = Some(metrics);
        self
    }

    /// Builds all application components and binds the HTTP listener.
    #[instrument(skip_all)]
    pub async fn build(self, shutdown_rx: watch::Receiver<bool>) -> Result<App> {
        let config = self.config;
        let task_manager = TaskManager::new();

        let (metrics, metrics_server_info) = match self.metrics_override {
            Some(m) => (m, None),
            None => {
                MetricsBuilder::new(config.metrics.clone())
                    .build(shutdown_rx.clone())
                    .await
            }
        };
        let metrics_addr = if let Some((server, addr)) = metrics_server_info {
            info!(%addr, "Metrics server listening");
            task_manager.spawn("MetricsServer", server.run());
            Some(addr)
        } else {
            None
        };

        let email: Arc<dyn EmailSender> = match self.email_override {
            Some(sender) => sender,
            None => Arc::new(SmtpEmailSender::new(config.smtp.clone())),
        };
        let slack: Arc<dyn SlackSender> = match self.slack_override {
            Some(sender) => sender,
            None => Arc::new(WebhookSlackSender::new(
                SecretResolver::new(&config.slack.secret_root),
                Duration::from_secs(config.slack.timeout_seconds),
            )?),
        };

        let dispatcher = Dispatcher::new(
            email,
            slack,
            TemplateRenderer::new(&config.template),
            config.recipients.clone(),
        )
        .with_metrics(metrics);

        let router = api::router(AppState::new(Arc::new(dispatcher), task_manager.clone()));

        let bind_address = config.server.bind_address();
        let listener = TcpListener::bind(&bind_address)
            .await
            .with_context(|| format!("Failed to bind HTTP listener to {}", bind_address))?;
        let local_addr = listener.local_addr()?;
        info!(%local_addr, "HTTP API listening");

        Ok(App {
            listener,
            router,
            task_manager,
            shutdown_rx,
            local_addr,
            metrics_addr,
        })
    }
}
