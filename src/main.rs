//! Stockflow event dispatcher
//!
//! An HTTP service that turns health and stock events into email and Slack
//! notifications.

use anyhow::Result;
use clap::Parser;
use event_dispatcher::{app::App, cli::Cli, config::Config};
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load configuration by layering sources: defaults, file, environment, and CLI args.
    let config = Config::load(&cli).unwrap_or_else(|err| {
        tracing_subscriber::fmt().with_writer(std::io::stderr).init();
        error!("Failed to load configuration: {:#}", err);
        std::process::exit(1);
    });

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Event dispatcher starting up...");

    info!("-------------------- Configuration --------------------");
    info!("Log Level: {}", config.log_level);
    info!("Listen Address: {}", config.server.bind_address());
    info!(
        "SMTP Relay: {}:{}",
        config.smtp.host.as_deref().unwrap_or("<not configured>"),
        config.smtp.port
    );
    info!("SMTP User: {}", config.smtp.login_user());
    info!(
        "SMTP Password: {}",
        if config.smtp.password.is_some() { "<redacted>" } else { "<not configured>" }
    );
    info!("Sender Address: {}", config.smtp.sender_address);
    info!("Template Path: {}", config.template.path.display());
    info!("Escape HTML: {}", config.template.escape_html);
    info!("Slack Secret Root: {}", config.slack.secret_root.display());
    info!(
        "Default Recipient: {}",
        config.recipients.fallback().unwrap_or("<not configured>")
    );
    info!(
        "Metrics: {}",
        if config.metrics.enabled { "Enabled" } else { "Disabled" }
    );
    info!("-------------------------------------------------------");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let app = App::builder(config).build(shutdown_rx).await?;

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for shutdown signal: {}", e);
        }
        info!("Shutdown signal received. Shutting down gracefully...");
        let _ = shutdown_tx.send(true);
    });

    app.run().await?;

    info!("Exiting.");
    Ok(())
}
