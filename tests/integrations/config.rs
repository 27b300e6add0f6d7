//! Integration tests for layered configuration loading.

use clap::Parser;
use event_dispatcher::{cli::Cli, config::Config};
use serial_test::serial;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

const MANAGED_VARS: &[&str] = &[
    "SMTP_HOST",
    "SMTP_PORT",
    "SMTP_USER",
    "SMTP_PASSWORD",
    "SENDER_ADDR",
    "TEMPLATE_PATH",
    "HEALTH_ALERT_RECEIVER",
    "STOCK_ALERT_RECEIVER",
    "DEFAULT_ALERT_RECEIVER",
    "SLACK_SECRET_ROOT",
    "LOG_LEVEL",
    "PORT",
    "DISPATCHER_SMTP__HOST",
    "DISPATCHER_SMTP__USER",
    "DISPATCHER_SERVER__PORT",
    "DISPATCHER_RECIPIENTS__STOCK",
];

/// Sets the given variables for the duration of `test_fn`, clearing every
/// managed variable before and after.
fn with_env<F: FnOnce()>(vars: &[(&str, &str)], test_fn: F) {
    for var in MANAGED_VARS {
        std::env::remove_var(var);
    }
    for (key, value) in vars {
        std::env::set_var(key, value);
    }
    test_fn();
    for var in MANAGED_VARS {
        std::env::remove_var(var);
    }
}

/// A helper function to run a test with a temporary config file.
fn with_config_file<F>(toml_content: &str, test_fn: F)
where
    F: FnOnce(PathBuf),
{
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{}", toml_content).unwrap();
    test_fn(file.path().to_path_buf());
}

fn parse(args: &[&str]) -> Cli {
    let mut argv = vec!["event-dispatcher"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap()
}

#[test]
#[serial]
fn test_defaults_without_any_source() {
    with_env(&[], || {
        let config = Config::load(&parse(&[])).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server.bind_address(), "0.0.0.0:8001");
    });
}

#[test]
#[serial]
fn test_load_full_valid_config() {
    let toml_content = r#"
        log_level = "debug"
        [server]
        host = "127.0.0.1"
        port = 9000
        [smtp]
        host = "smtp.example.com"
        port = 2525
        user = "mailer"
        password = "s3cret"
        sender_address = "alerts@example.com"
        [recipients]
        health = "oncall@example.com"
        stock = "desk@example.com"
        default = "team@example.com"
        [template]
        path = "/srv/templates/stock.html"
        escape_html = false
        [slack]
        secret_root = "/run/secrets/slack"
        timeout_seconds = 5
        [metrics]
        enabled = true
        listen_address = "0.0.0.0:9100"
    "#;

    with_env(&[], || {
        with_config_file(toml_content, |path| {
            let config = Config::load(&parse(&["--config", path.to_str().unwrap()])).unwrap();
            assert_eq!(config.log_level, "debug");
            assert_eq!(config.server.bind_address(), "127.0.0.1:9000");
            assert_eq!(config.smtp.host.as_deref(), Some("smtp.example.com"));
            assert_eq!(config.smtp.port, 2525);
            assert_eq!(config.smtp.login_user(), "mailer");
            assert_eq!(config.smtp.password.as_deref(), Some("s3cret"));
            assert_eq!(config.smtp.sender_address, "alerts@example.com");
            assert_eq!(config.smtp.timeout_seconds, 30);
            assert_eq!(config.recipients.for_stock(), Some("desk@example.com"));
            assert_eq!(config.template.path, PathBuf::from("/srv/templates/stock.html"));
            assert!(!config.template.escape_html);
            assert_eq!(config.slack.secret_root, PathBuf::from("/run/secrets/slack"));
            assert_eq!(config.slack.timeout_seconds, 5);
            assert!(config.metrics.enabled);
            assert_eq!(config.metrics.listen_address.port(), 9100);
        });
    });
}

#[test]
#[serial]
fn test_missing_config_file_is_an_error() {
    with_env(&[], || {
        let err = Config::load(&parse(&["--config", "/nonexistent/dispatcher.toml"])).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    });
}

#[test]
#[serial]
fn test_legacy_environment_variables() {
    with_env(
        &[
            ("SMTP_HOST", "legacy.example.com"),
            ("SMTP_PORT", "465"),
            ("SMTP_PASSWORD", "pw"),
            ("SENDER_ADDR", "bot@example.com"),
            ("HEALTH_ALERT_RECEIVER", "oncall@example.com"),
            ("DEFAULT_ALERT_RECEIVER", "team@example.com"),
            ("PORT", "8080"),
        ],
        || {
            let config = Config::load(&parse(&[])).unwrap();
            assert_eq!(config.smtp.host.as_deref(), Some("legacy.example.com"));
            assert_eq!(config.smtp.port, 465);
            assert_eq!(config.smtp.password.as_deref(), Some("pw"));
            assert_eq!(config.smtp.sender_address, "bot@example.com");
            assert_eq!(config.smtp.login_user(), "bot@example.com");
            assert_eq!(config.recipients.for_health(), Some("oncall@example.com"));
            assert_eq!(config.recipients.for_stock(), Some("team@example.com"));
            assert_eq!(config.server.port, 8080);
        },
    );
}

#[test]
#[serial]
fn test_prefixed_environment_overrides_legacy_and_file() {
    let toml_content = r#"
        [smtp]
        host = "file.example.com"
        [recipients]
        stock = "file@example.com"
    "#;

    with_env(
        &[
            ("SMTP_HOST", "legacy.example.com"),
            ("DISPATCHER_SMTP__HOST", "prefixed.example.com"),
            ("DISPATCHER_RECIPIENTS__STOCK", "env@example.com"),
        ],
        || {
            with_config_file(toml_content, |path| {
                let config = Config::load(&parse(&["--config", path.to_str().unwrap()])).unwrap();
                assert_eq!(config.smtp.host.as_deref(), Some("prefixed.example.com"));
                assert_eq!(config.recipients.for_stock(), Some("env@example.com"));
            });
        },
    );
}

#[test]
#[serial]
fn test_cli_arguments_take_precedence() {
    let toml_content = r#"
        log_level = "warn"
        [server]
        port = 9000
    "#;

    with_env(&[("DISPATCHER_SERVER__PORT", "9100")], || {
        with_config_file(toml_content, |path| {
            let config = Config::load(&parse(&[
                "--config",
                path.to_str().unwrap(),
                "--port",
                "9200",
                "--log-level",
                "trace",
                "--secret-root",
                "/tmp/slack",
                "--metrics",
            ]))
            .unwrap();
            assert_eq!(config.server.port, 9200);
            assert_eq!(config.log_level, "trace");
            assert_eq!(config.slack.secret_root, PathBuf::from("/tmp/slack"));
            assert!(config.metrics.enabled);
        });
    });
}

#[test]
#[serial]
fn test_numeric_looking_secrets_stay_strings() {
    with_env(
        &[
            ("SMTP_PASSWORD", "123456"),
            ("DISPATCHER_SMTP__USER", "42"),
            ("DEFAULT_ALERT_RECEIVER", "0042"),
            ("SMTP_PORT", "2525"),
        ],
        || {
            let config = Config::load(&parse(&[])).unwrap();
            assert_eq!(config.smtp.password.as_deref(), Some("123456"));
            assert_eq!(config.smtp.user.as_deref(), Some("42"));
            assert_eq!(config.smtp.login_user(), "42");
            assert_eq!(config.recipients.fallback(), Some("0042"));
            assert_eq!(config.smtp.port, 2525);
        },
    );
}
