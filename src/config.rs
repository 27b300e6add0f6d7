//! Configuration management for the dispatcher
//!
//! This module defines the main `Config` struct and its sub-structs,
//! responsible for holding all application settings. It uses the `figment`
//! crate to layer defaults, a TOML file, environment variables and
//! command-line arguments into a single value that is built once at startup
//! and passed to the components that need it.

use crate::cli::Cli;
use anyhow::{bail, Result};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Loaded when no `--config` flag is given and the file exists.
pub const DEFAULT_CONFIG_FILE: &str = "dispatcher.toml";

/// Environment variables understood without the `DISPATCHER_` prefix, and
/// the config key each one maps to.
const LEGACY_ENV_KEYS: &[(&str, &str)] = &[
    ("SMTP_HOST", "smtp.host"),
    ("SMTP_PORT", "smtp.port"),
    ("SMTP_USER", "smtp.user"),
    ("SMTP_PASSWORD", "smtp.password"),
    ("SENDER_ADDR", "smtp.sender_address"),
    ("TEMPLATE_PATH", "template.path"),
    ("HEALTH_ALERT_RECEIVER", "recipients.health"),
    ("STOCK_ALERT_RECEIVER", "recipients.stock"),
    ("DEFAULT_ALERT_RECEIVER", "recipients.default"),
    ("SLACK_SECRET_ROOT", "slack.secret_root"),
    ("LOG_LEVEL", "log_level"),
    ("PORT", "server.port"),
];

/// Keys whose values are always text, even when they look numeric.
const STRING_KEYS: &[&str] = &[
    "smtp.host",
    "smtp.user",
    "smtp.password",
    "smtp.sender_address",
    "recipients.health",
    "recipients.stock",
    "recipients.default",
    "log_level",
];

/// The main configuration struct for the application.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    /// The logging level for the application.
    pub log_level: String,
    /// HTTP listener settings.
    pub server: ServerConfig,
    /// SMTP delivery settings.
    pub smtp: SmtpConfig,
    /// Default recipients per alert kind.
    pub recipients: RecipientsConfig,
    /// Stock alert HTML template.
    pub template: TemplateConfig,
    /// Slack webhook delivery settings.
    pub slack: SlackConfig,
    /// Prometheus metrics endpoint.
    pub metrics: MetricsConfig,
}

/// HTTP listener settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    /// The socket address to bind, as `host:port`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// SMTP delivery settings.
///
/// `host` and `password` are required at send time, not at startup, so the
/// service can run Slack-only.
#[derive(Deserialize, Serialize, Clone, PartialEq)]
pub struct SmtpConfig {
    pub host: Option<String>,
    pub port: u16,
    /// Login user; the sender address is used when unset.
    pub user: Option<String>,
    pub password: Option<String>,
    /// The address messages are sent from.
    pub sender_address: String,
    /// Connection and command timeout.
    pub timeout_seconds: u64,
}

impl SmtpConfig {
    pub fn login_user(&self) -> &str {
        self.user
            .as_deref()
            .filter(|u| !u.is_empty())
            .unwrap_or(&self.sender_address)
    }
}

impl fmt::Debug for SmtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SmtpConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("sender_address", &self.sender_address)
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

/// Default recipients per alert kind; `default` backs up the others.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct RecipientsConfig {
    pub health: Option<String>,
    pub stock: Option<String>,
    pub default: Option<String>,
}

impl RecipientsConfig {
    pub fn for_health(&self) -> Option<&str> {
        self.health.as_deref().or(self.default.as_deref())
    }

    pub fn for_stock(&self) -> Option<&str> {
        self.stock.as_deref().or(self.default.as_deref())
    }

    pub fn fallback(&self) -> Option<&str> {
        self.default.as_deref()
    }
}

/// Stock alert HTML template.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TemplateConfig {
    /// Absolute, or relative to the working directory.
    pub path: PathBuf,
    /// HTML-escape record fields before inserting them into the template.
    pub escape_html: bool,
}

/// Slack webhook delivery settings.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SlackConfig {
    /// Directory holding one webhook URL file per channel name.
    pub secret_root: PathBuf,
    /// Request timeout for webhook POSTs.
    pub timeout_seconds: u64,
}

/// Prometheus metrics endpoint.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub listen_address: SocketAddr,
}

impl Config {
    /// Loads the application configuration.
    ///
    /// Sources are merged in increasing precedence: built-in defaults, the
    /// TOML file, legacy environment variables, `DISPATCHER_`-prefixed
    /// environment variables, and finally command-line arguments.
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        match &cli.config {
            Some(path) => {
                if !path.exists() {
                    bail!("Config file not found at specified path: {}", path.display());
                }
                figment = figment.merge(Toml::file(path));
            }
            None => {
                figment = figment.merge(Toml::file(DEFAULT_CONFIG_FILE));
            }
        }

        figment = merge_env(figment, legacy_env());
        // e.g. DISPATCHER_SMTP__HOST=smtp.example.com
        figment = merge_env(figment, Env::prefixed("DISPATCHER_").split("__"));

        let config: Config = figment.merge(cli.clone()).extract()?;
        Ok(config)
    }
}

/// Merges `env`, then re-merges the `STRING_KEYS` it sets as the raw
/// strings, so values such as `123456` or `0042` are not read as numbers.
fn merge_env(figment: Figment, env: Env) -> Figment {
    let verbatim: Vec<_> = env
        .iter()
        .filter(|(key, _)| STRING_KEYS.contains(&key.as_str()))
        .collect();
    verbatim
        .into_iter()
        .fold(figment.merge(env), |figment, (key, value)| {
            figment.merge(Serialized::default(key.as_str(), value))
        })
}

/// Maps the unprefixed variables in `LEGACY_ENV_KEYS` onto config keys.
fn legacy_env() -> Env {
    Env::raw().filter_map(|key| {
        LEGACY_ENV_KEYS
            .iter()
            .find(|(var, _)| key.as_str().eq_ignore_ascii_case(var))
            .map(|(_, target)| (*target).into())
    })
}

// Provide a default implementation for tests and easy setup.
impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 8001,
            },
            smtp: SmtpConfig {
                host: None,
                port: 587,
                user: None,
                password: None,
                sender_address: "noreply@stockflow.local".to_string(),
                timeout_seconds: 30,
            },
            recipients: RecipientsConfig::default(),
            template: TemplateConfig {
                path: PathBuf::from("templates/email-template.html"),
                escape_html: true,
            },
            slack: SlackConfig {
                secret_root: PathBuf::from("/etc/secrets/slack"),
                timeout_seconds: 10,
            },
            metrics: MetricsConfig {
                enabled: false,
                listen_address: SocketAddr::from(([127, 0, 0, 1], 9090)),
            },
        }
    }
}
