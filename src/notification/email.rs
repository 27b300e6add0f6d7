//! An SMTP client for sending alert emails.

use crate::config::SmtpConfig;
use crate::core::{EmailMessage, EmailSender};
use crate::notification::NotificationError;
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::time::Duration;
use tracing::{error, info, instrument};

/// Sends each message over its own STARTTLS session.
///
/// No connection pool is kept: the transport is built for a single send and
/// dropped afterwards, which closes the session on success and failure alike.
pub struct SmtpEmailSender {
    config: SmtpConfig,
}

impl SmtpEmailSender {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    /// Returns the host and password, or fails before any network activity.
    fn credentials(&self) -> Result<(&str, &str), NotificationError> {
        let host = self
            .config
            .host
            .as_deref()
            .filter(|h| !h.is_empty())
            .ok_or(NotificationError::ConfigurationMissing("SMTP host is not set"))?;
        let password = self
            .config
            .password
            .as_deref()
            .filter(|p| !p.is_empty())
            .ok_or(NotificationError::ConfigurationMissing("SMTP password is not set"))?;
        Ok((host, password))
    }

    fn transport(
        &self,
        host: &str,
        password: &str,
    ) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotificationError> {
        let creds = Credentials::new(self.config.login_user().to_string(), password.to_string());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
            .map_err(|e| NotificationError::Transport(format!("failed to create SMTP transport: {e}")))?
            .port(self.config.port)
            .credentials(creds)
            .timeout(Some(Duration::from_secs(self.config.timeout_seconds)))
            .build();
        Ok(transport)
    }
}

/// Builds the MIME message: a single plain-text part, or a
/// `multipart/alternative` carrying the HTML part.
pub(crate) fn build_message(
    sender_address: &str,
    email: &EmailMessage,
) -> Result<Message, NotificationError> {
    let from_address = sender_address
        .parse()
        .map_err(|e| NotificationError::Message(format!("invalid sender address '{sender_address}': {e}")))?;
    let to: Mailbox = email
        .recipient
        .parse()
        .map_err(|e| NotificationError::Message(format!("invalid recipient '{}': {e}", email.recipient)))?;

    let builder = Message::builder()
        .from(Mailbox::new(Some(email.display_name.clone()), from_address))
        .to(to)
        .subject(email.subject.clone());

    let message = if email.is_html {
        builder.multipart(MultiPart::alternative().singlepart(SinglePart::html(email.body.clone())))
    } else {
        builder.header(ContentType::TEXT_PLAIN).body(email.body.clone())
    };
    message.map_err(|e| NotificationError::Message(e.to_string()))
}

#[async_trait]
impl EmailSender for SmtpEmailSender {
    #[instrument(skip(self, email), fields(recipient = %email.recipient, html = email.is_html))]
    async fn send_email(&self, email: &EmailMessage) -> Result<(), NotificationError> {
        let (host, password) = match self.credentials() {
            Ok(creds) => creds,
            Err(e) => {
                error!(error = %e, "SMTP credentials not set");
                return Err(e);
            }
        };

        let message = build_message(&self.config.sender_address, email)?;
        let transport = self.transport(host, password)?;

        info!(host, port = self.config.port, "Connecting to SMTP server");
        match transport.send(message).await {
            Ok(_) => {
                info!(recipient = %email.recipient, "Email sent successfully");
                Ok(())
            }
            Err(e) => {
                error!(recipient = %email.recipient, error = %e, "Failed to send email");
                Err(NotificationError::Transport(e.to_string()))
            }
        }
    }
}
