//! # Internal Metrics Module
//!
//! Counters and histograms describing dispatch activity, plus the optional
//! Prometheus endpoint that exposes them.
//!
//! ## Components:
//!
//! - **`MetricsBuilder`**: installs the Prometheus recorder and prepares the
//!   metrics server when metrics are enabled in the configuration.
//!
//! - **`Metrics`**: a lightweight, cloneable handle used by the dispatcher to
//!   record outcomes. When no recorder is installed every call is a no-op.
//!
//! - **`MetricsServer`**: (Defined in `server.rs`) An `axum`-based web server
//!   that exposes the `/metrics` endpoint for Prometheus to scrape.

pub mod server;

use crate::config::MetricsConfig;
use crate::core::{ChannelKind, Outcome};
use crate::internal_metrics::server::MetricsServer;
use metrics::{Histogram, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::error;

/// The public API for the metrics system.
#[derive(Clone)]
pub struct Metrics {
    pub dispatch_duration_seconds: Histogram,
}

impl std::fmt::Debug for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Metrics").finish_non_exhaustive()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Creates a new `Metrics` instance and registers descriptions for all
    /// supported metrics with the global recorder.
    pub fn new() -> Self {
        metrics::describe_counter!("alerts_received_total", Unit::Count, "Total number of alerts handed to the dispatcher, labeled by kind.");
        metrics::describe_counter!("channel_sends_total", Unit::Count, "Total number of channel delivery attempts, labeled by channel and outcome.");
        metrics::describe_counter!("unknown_channels_total", Unit::Count, "Total number of requested channel names that were not recognised.");
        metrics::describe_counter!("template_fallbacks_total", Unit::Count, "Total number of stock alerts rendered with the fallback document.");
        metrics::describe_histogram!("dispatch_duration_seconds", Unit::Seconds, "Time taken to attempt every requested channel for one alert.");

        Self {
            dispatch_duration_seconds: metrics::histogram!("dispatch_duration_seconds"),
        }
    }

    pub fn increment_alerts_received(&self, kind: &'static str) {
        metrics::counter!("alerts_received_total", "kind" => kind).increment(1);
    }

    pub fn record_channel_outcome(&self, channel: ChannelKind, outcome: &Outcome) {
        metrics::counter!(
            "channel_sends_total",
            "channel" => channel.as_str(),
            "outcome" => outcome.label()
        )
        .increment(1);
    }

    pub fn record_dispatch_duration(&self, elapsed: Duration) {
        self.dispatch_duration_seconds.record(elapsed.as_secs_f64());
    }
}

/// Builder for the metrics system.
///
/// This builder is responsible for initializing the `PrometheusRecorder`,
/// binding the `MetricsServer` listener, and creating the `Metrics` handle.
pub struct MetricsBuilder {
    config: MetricsConfig,
}

impl MetricsBuilder {
    /// Creates a new `MetricsBuilder` with the given configuration.
    pub fn new(config: MetricsConfig) -> Self {
        Self { config }
    }

    /// Initializes the metrics system and returns a `Metrics` handle and an
    /// optional `MetricsServer` with the address it is bound to.
    ///
    /// If metrics are disabled, or the recorder or listener cannot be set up,
    /// this returns a no-op `Metrics` and `None` for the server.
    pub async fn build(
        self,
        shutdown_rx: watch::Receiver<bool>,
    ) -> (Metrics, Option<(MetricsServer, SocketAddr)>) {
        if !self.config.enabled {
            return (Metrics::new(), None);
        }

        let builder = match PrometheusBuilder::new().set_buckets_for_metric(
            Matcher::Suffix("duration_seconds".to_string()),
            &[0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0],
        ) {
            Ok(builder) => builder,
            Err(e) => {
                error!("Failed to configure Prometheus buckets: {}", e);
                return (Metrics::new(), None);
            }
        };
        let recorder = builder.build_recorder();
        let handle = recorder.handle();

        let listener = match TcpListener::bind(self.config.listen_address).await {
            Ok(listener) => listener,
            Err(e) => {
                error!(
                    "Failed to bind metrics server to {}: {}",
                    self.config.listen_address, e
                );
                return (Metrics::new(), None);
            }
        };

        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(e) => {
                error!("Failed to get local address for metrics server: {}", e);
                return (Metrics::new(), None);
            }
        };

        if let Err(e) = metrics::set_global_recorder(recorder) {
            error!("Failed to install Prometheus recorder: {}", e);
            return (Metrics::new(), None);
        }

        let metrics = Metrics::new();
        let server = MetricsServer::new(listener, handle, shutdown_rx);
        (metrics, Some((server, addr)))
    }
}
