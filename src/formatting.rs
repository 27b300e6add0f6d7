// src/formatting.rs

//! Pure functions that turn alert payloads into channel-specific text.
//!
//! The timestamp is passed in already formatted so every function here is
//! deterministic.

use crate::core::StockRecord;
use chrono::{DateTime, TimeZone};

/// Display name for health, generic and Slack-originated emails.
pub const NOTIFICATION_DISPLAY_NAME: &str = "Stockflow Notification";
/// Display name for stock buy-signal emails.
pub const MARKET_DISPLAY_NAME: &str = "Market Monitor";

const HEALTH_TITLE: &str = "Stockflow Alert: Health Check Failed";
const STOCK_TITLE: &str = "Stockflow Alert: Buy Signal Detected";

/// Formats a timestamp the way alert subjects show it, e.g. `March 04 2025 - 09:30 AM`.
pub fn alert_timestamp<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    at.format("%B %d %Y - %I:%M %p").to_string()
}

pub fn health_subject(timestamp: &str) -> String {
    format!("{} - {}", HEALTH_TITLE, timestamp)
}

/// Plain-text email body listing the failed services.
pub fn health_email_body(issues: &[String]) -> String {
    format!(
        "\nHello,\n\n\
         Stockflow has identified failed health check during routine checks.\n\n\
         Errored Services: {}\n\n\
         Thank you,\n\
         Stockflow\n\n\
         ---\n\n\
         This is an automated message. Please do not reply.\n",
        issues.join(", ")
    )
}

pub fn health_slack_message(issues: &[String]) -> String {
    format!("*{}*\nErrored services: {}", HEALTH_TITLE, issues.join(", "))
}

pub fn stock_subject(timestamp: &str) -> String {
    format!("{} - {}", STOCK_TITLE, timestamp)
}

/// One bullet line per record: `• SYMBOL: rating (sentiment)`.
pub fn stock_slack_message(records: &[StockRecord]) -> String {
    if records.is_empty() {
        return format!("*{}*\nNo buy signals in this batch.", STOCK_TITLE);
    }
    let lines: Vec<String> = records
        .iter()
        .map(|r| format!("• {}: {} ({})", r.symbol, r.buy_rating, r.overall_sentiment))
        .collect();
    format!("*{}*\n{}", STOCK_TITLE, lines.join("\n"))
}

pub fn generic_slack_message(subject: &str, body: &str) -> String {
    format!("*{}*\n{}", subject, body)
}

/// Subject used when a raw Slack message is also delivered by email.
pub fn slack_email_subject() -> String {
    NOTIFICATION_DISPLAY_NAME.to_string()
}
