//! Command-Line Interface (CLI) argument parsing.
//!
//! This module defines the command-line arguments for the application using the
//! `clap` crate. These arguments are parsed at startup and then merged with
//! the configuration from the TOML file and environment variables, taking
//! precedence over both.

use clap::Parser;
use figment::{
    value::{Dict, Map, Value},
    Error, Metadata, Profile, Provider,
};
use std::path::PathBuf;

/// Dispatches alerts received over HTTP to email and Slack.
#[derive(Parser, Debug, Clone, Default)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Address the HTTP server binds to.
    #[arg(long, value_name = "IP")]
    pub host: Option<String>,

    /// Port the HTTP server listens on.
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Logging level (error, warn, info, debug, trace).
    #[arg(long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Path to the stock alert HTML template.
    #[arg(long, value_name = "PATH")]
    pub template_path: Option<PathBuf>,

    /// Directory holding one Slack webhook secret per channel.
    #[arg(long, value_name = "DIR")]
    pub secret_root: Option<PathBuf>,

    /// Expose Prometheus metrics.
    #[arg(long)]
    pub metrics: bool,
}

impl Provider for Cli {
    fn metadata(&self) -> Metadata {
        Metadata::named("Command-Line Arguments")
    }

    fn data(&self) -> Result<Map<Profile, Dict>, Error> {
        let mut server = Dict::new();
        if let Some(host) = &self.host {
            server.insert("host".into(), Value::from(host.clone()));
        }
        if let Some(port) = self.port {
            server.insert("port".into(), Value::from(port));
        }

        let mut dict = Dict::new();
        if !server.is_empty() {
            dict.insert("server".into(), Value::from(server));
        }

        if let Some(level) = &self.log_level {
            dict.insert("log_level".into(), Value::from(level.clone()));
        }

        if let Some(path) = &self.template_path {
            let mut template = Dict::new();
            template.insert("path".into(), Value::from(path.display().to_string()));
            dict.insert("template".into(), Value::from(template));
        }

        if let Some(root) = &self.secret_root {
            let mut slack = Dict::new();
            slack.insert("secret_root".into(), Value::from(root.display().to_string()));
            dict.insert("slack".into(), Value::from(slack));
        }

        // A bare flag can only switch metrics on; leaving it off defers to
        // the file and environment.
        if self.metrics {
            let mut metrics = Dict::new();
            metrics.insert("enabled".into(), Value::from(true));
            dict.insert("metrics".into(), Value::from(metrics));
        }

        let mut map = Map::new();
        map.insert(Profile::Default, dict);
        Ok(map)
    }
}
