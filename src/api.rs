//! The HTTP surface of the dispatcher.
//!
//! Every alert endpoint parses its body into an `AlertRequest`, hands it to
//! the dispatcher as a background task and answers `202 Accepted` at once.
//! Per-channel outcomes are never part of the response; they only show up in
//! logs and metrics.

use crate::core::{AlertKind, AlertRequest, ChannelKind, StockRecord};
use crate::dispatch::Dispatcher;
use crate::task_manager::TaskManager;
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Shared state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    pub tasks: TaskManager,
}

impl AppState {
    pub fn new(dispatcher: Arc<Dispatcher>, tasks: TaskManager) -> Self {
        Self { dispatcher, tasks }
    }
}

#[derive(Debug, Deserialize)]
pub struct HealthAlertBody {
    pub issues: Vec<String>,
    pub channels: Option<Vec<String>>,
    pub channel: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct StockAlertBody {
    pub stock_list: Vec<StockRecord>,
    pub channels: Option<Vec<String>>,
    pub channel: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SlackAlertBody {
    pub message: String,
    pub channel: String,
}

#[derive(Debug, Deserialize)]
pub struct SendEmailBody {
    pub subject: String,
    pub body: String,
    pub to_email: Option<String>,
    pub channels: Option<Vec<String>>,
    pub channel: Option<String>,
}

/// The acknowledgement returned by every alert endpoint.
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct Ack {
    pub status: String,
    /// The channels that will be attempted.
    pub channels: Vec<ChannelKind>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: String,
}

/// Builds the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/health-alert", post(health_alert))
        .route("/api/v1/email-alert", post(stock_alert))
        .route("/api/v1/slack-alert", post(slack_alert))
        .route("/api/v1/send-email", post(send_email))
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "OK".to_string(),
        timestamp: chrono::Local::now().to_rfc3339(),
    })
}

async fn health_alert(
    State(state): State<AppState>,
    Json(body): Json<HealthAlertBody>,
) -> (StatusCode, Json<Ack>) {
    info!(issues = ?body.issues, "Received health alert request");
    let alert = AlertRequest {
        kind: AlertKind::Health { issues: body.issues },
        channels: body.channels,
        channel: body.channel,
    };
    accept(&state, alert, "Health alert dispatch initiated")
}

async fn stock_alert(
    State(state): State<AppState>,
    Json(body): Json<StockAlertBody>,
) -> (StatusCode, Json<Ack>) {
    info!(records = body.stock_list.len(), "Received stock alert request");
    let alert = AlertRequest {
        kind: AlertKind::Stock {
            records: body.stock_list,
        },
        channels: body.channels,
        channel: body.channel,
    };
    accept(&state, alert, "Stock alert dispatch initiated")
}

async fn slack_alert(
    State(state): State<AppState>,
    Json(body): Json<SlackAlertBody>,
) -> (StatusCode, Json<Ack>) {
    info!(channel = %body.channel, "Received Slack alert request");
    let alert = AlertRequest::new(AlertKind::Slack {
        message: body.message,
    })
    .with_slack_channel(body.channel);
    accept(&state, alert, "Slack alert dispatch initiated")
}

async fn send_email(
    State(state): State<AppState>,
    Json(body): Json<SendEmailBody>,
) -> (StatusCode, Json<Ack>) {
    info!(subject = %body.subject, "Received email request");
    let alert = AlertRequest {
        kind: AlertKind::Generic {
            subject: body.subject,
            body: body.body,
            recipient: body.to_email,
        },
        channels: body.channels,
        channel: body.channel,
    };
    accept(&state, alert, "Email dispatch initiated")
}

/// Schedules the dispatch and builds the acknowledgement.
fn accept(state: &AppState, mut alert: AlertRequest, status: &str) -> (StatusCode, Json<Ack>) {
    let channels: Vec<ChannelKind> = alert.requested_channels().into_iter().collect();
    // Unknown names have been reported once already.
    alert.channels = Some(channels.iter().map(|c| c.as_str().to_string()).collect());
    state.dispatcher.spawn_dispatch(alert, &state.tasks);
    (
        StatusCode::ACCEPTED,
        Json(Ack {
            status: status.to_string(),
            channels,
        }),
    )
}
