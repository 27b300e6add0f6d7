//! Integration tests for the HTTP API.

#[path = "../helpers/mod.rs"]
mod helpers;

use anyhow::Result;
use event_dispatcher::{api::Ack, ChannelKind};
use helpers::TestApp;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_health_endpoint_reports_ok() -> Result<()> {
    let app = TestApp::spawn().await?;

    let res = reqwest::get(app.url("/health")).await?;
    assert_eq!(res.status(), 200);
    let body: Value = res.json().await?;
    assert_eq!(body["status"], "OK");
    assert!(body["timestamp"].as_str().is_some_and(|t| !t.is_empty()));

    app.shutdown(WAIT).await
}

#[tokio::test]
async fn test_health_alert_is_accepted_and_emailed() -> Result<()> {
    let app = TestApp::spawn().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(app.url("/api/v1/health-alert"))
        .json(&json!({ "issues": ["db", "cache"] }))
        .send()
        .await?;
    assert_eq!(res.status(), 202);
    let ack: Ack = res.json().await?;
    assert_eq!(ack.channels, vec![ChannelKind::Email]);

    timeout(WAIT, app.email.wait_for(1)).await?;
    let sent = app.email.sent();
    assert_eq!(sent[0].recipient, "oncall@example.com");
    assert!(sent[0].body.contains("db, cache"));
    assert!(app.slack.posts().is_empty());

    app.shutdown(WAIT).await
}

#[tokio::test]
async fn test_stock_alert_fans_out_to_both_channels() -> Result<()> {
    let app = TestApp::spawn().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(app.url("/api/v1/email-alert"))
        .json(&json!({
            "stock_list": [{
                "symbol": "ACME",
                "buy_rating": 8.5,
                "overall_sentiment": "bullish",
                "key_drivers": ["earnings", "guidance"],
                "confidence": "high",
                "summary": "Strong quarter"
            }],
            "channels": ["email", "slack"],
            "channel": "markets"
        }))
        .send()
        .await?;
    assert_eq!(res.status(), 202);
    let ack: Ack = res.json().await?;
    assert_eq!(ack.channels, vec![ChannelKind::Email, ChannelKind::Slack]);

    timeout(WAIT, app.email.wait_for(1)).await?;
    timeout(WAIT, app.slack.wait_for(1)).await?;

    let email = &app.email.sent()[0];
    assert!(email.is_html);
    assert_eq!(email.recipient, "desk@example.com");

    let post = &app.slack.posts()[0];
    assert_eq!(post.channel.as_deref(), Some("markets"));
    assert!(post.message.contains("ACME"));

    app.shutdown(WAIT).await
}

#[tokio::test]
async fn test_slack_alert_defaults_to_slack_only() -> Result<()> {
    let app = TestApp::spawn().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(app.url("/api/v1/slack-alert"))
        .json(&json!({ "message": "deploy finished", "channel": "ops" }))
        .send()
        .await?;
    assert_eq!(res.status(), 202);
    let ack: Ack = res.json().await?;
    assert_eq!(ack.channels, vec![ChannelKind::Slack]);

    timeout(WAIT, app.slack.wait_for(1)).await?;
    let post = &app.slack.posts()[0];
    assert_eq!(post.message, "deploy finished");
    assert_eq!(post.channel.as_deref(), Some("ops"));
    assert!(app.email.sent().is_empty());

    app.shutdown(WAIT).await
}

#[tokio::test]
async fn test_send_email_uses_explicit_recipient() -> Result<()> {
    let app = TestApp::spawn().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(app.url("/api/v1/send-email"))
        .json(&json!({
            "subject": "Weekly report",
            "body": "All systems nominal.",
            "to_email": "reports@example.com"
        }))
        .send()
        .await?;
    assert_eq!(res.status(), 202);

    timeout(WAIT, app.email.wait_for(1)).await?;
    let email = &app.email.sent()[0];
    assert_eq!(email.subject, "Weekly report");
    assert_eq!(email.recipient, "reports@example.com");
    assert!(!email.is_html);

    app.shutdown(WAIT).await
}

#[tokio::test]
async fn test_unknown_channels_fall_back_to_default() -> Result<()> {
    let app = TestApp::spawn().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(app.url("/api/v1/health-alert"))
        .json(&json!({ "issues": ["db"], "channels": ["pager"] }))
        .send()
        .await?;
    assert_eq!(res.status(), 202);
    let ack: Ack = res.json().await?;
    assert_eq!(ack.channels, vec![ChannelKind::Email]);

    app.shutdown(WAIT).await
}

#[tokio::test]
async fn test_malformed_body_is_rejected() -> Result<()> {
    let app = TestApp::spawn().await?;
    let client = reqwest::Client::new();

    let res = client
        .post(app.url("/api/v1/health-alert"))
        .header("content-type", "application/json")
        .body("{ not json")
        .send()
        .await?;
    assert!(res.status().is_client_error());

    let res = client
        .post(app.url("/api/v1/slack-alert"))
        .json(&json!({ "message": "missing channel" }))
        .send()
        .await?;
    assert!(res.status().is_client_error());

    assert!(app.email.sent().is_empty());
    assert!(app.slack.posts().is_empty());

    app.shutdown(WAIT).await
}

#[tokio::test]
async fn test_channel_failure_does_not_affect_response() -> Result<()> {
    let app = TestApp::spawn().await?;
    app.slack.set_failing(true);
    let client = reqwest::Client::new();

    let res = client
        .post(app.url("/api/v1/health-alert"))
        .json(&json!({ "issues": ["db"], "channels": ["email", "slack"], "channel": "ops" }))
        .send()
        .await?;
    assert_eq!(res.status(), 202);

    timeout(WAIT, app.email.wait_for(1)).await?;
    timeout(WAIT, app.slack.wait_for(1)).await?;

    app.shutdown(WAIT).await
}

#[tokio::test]
async fn test_shutdown_drains_in_flight_dispatches() -> Result<()> {
    let app = TestApp::spawn().await?;
    let client = reqwest::Client::new();

    for i in 0..5 {
        let res = client
            .post(app.url("/api/v1/send-email"))
            .json(&json!({ "subject": format!("msg {}", i), "body": "b" }))
            .send()
            .await?;
        assert_eq!(res.status(), 202);
    }

    let email = app.email.clone();
    app.shutdown(WAIT).await?;
    assert_eq!(email.sent().len(), 5);
    Ok(())
}
