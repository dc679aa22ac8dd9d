//! Email transport: SMTP via lettre.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{Message, SmtpTransport, Transport as _};
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

use crate::channels::dispatcher::DEFAULT_SEND_TIMEOUT;
use crate::channels::transport::{DeliveryHandle, Transport};
use crate::error::ChannelError;
use crate::workflow::Channel;
use crate::workflow::model::DEFAULT_EMAIL_SUBJECT;

// ── Configuration ───────────────────────────────────────────────────

/// SMTP configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    pub from_address: String,
    /// Socket timeout for the blocking SMTP session. Must stay below the
    /// dispatcher timeout so an abandoned send cannot deliver afterwards.
    pub timeout: Duration,
}

impl SmtpConfig {
    /// Returns `None` if `SMTP_HOST` is not set (channel disabled).
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("SMTP_HOST").ok()?;

        let port: u16 = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(587);

        let username = std::env::var("SMTP_USERNAME").unwrap_or_default();
        let password = SecretString::from(std::env::var("SMTP_PASSWORD").unwrap_or_default());
        let from_address = std::env::var("SMTP_FROM_ADDRESS").unwrap_or_else(|_| username.clone());

        Some(Self {
            host,
            port,
            username,
            password,
            from_address,
            timeout: smtp_timeout_within(DEFAULT_SEND_TIMEOUT),
        })
    }

    /// Clamp the SMTP timeout so it finishes inside `dispatch_timeout`.
    pub fn bounded_by(mut self, dispatch_timeout: Duration) -> Self {
        self.timeout = self.timeout.min(smtp_timeout_within(dispatch_timeout));
        self
    }
}

/// Two thirds of the dispatch budget, leaving room for the connect and
/// spawn overhead around the SMTP conversation.
fn smtp_timeout_within(dispatch_timeout: Duration) -> Duration {
    dispatch_timeout * 2 / 3
}

// ── Transport ───────────────────────────────────────────────────────

/// Outbound email over SMTP (STARTTLS relay).
pub struct EmailTransport {
    config: SmtpConfig,
}

impl EmailTransport {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    fn send_error(reason: String) -> ChannelError {
        ChannelError::SendFailed {
            channel: Channel::Email,
            reason,
        }
    }

    fn smtp_transport(&self) -> Result<SmtpTransport, ChannelError> {
        let creds = Credentials::new(
            self.config.username.clone(),
            self.config.password.expose_secret().to_string(),
        );
        Ok(SmtpTransport::starttls_relay(&self.config.host)
            .map_err(|e| Self::send_error(format!("SMTP relay error: {e}")))?
            .port(self.config.port)
            .credentials(creds)
            .timeout(Some(self.config.timeout))
            .build())
    }

    /// Build the RFC 5322 message. The Message-ID doubles as the delivery handle.
    fn build_message(
        &self,
        to: &str,
        subject: &str,
        body: &str,
        message_id: &str,
    ) -> Result<Message, ChannelError> {
        Message::builder()
            .from(
                self.config
                    .from_address
                    .parse()
                    .map_err(|e| Self::send_error(format!("Invalid from address: {e}")))?,
            )
            .to(to
                .parse()
                .map_err(|e| Self::send_error(format!("Invalid to address: {e}")))?)
            .subject(subject)
            .message_id(Some(message_id.to_string()))
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| Self::send_error(format!("Failed to build email: {e}")))
    }
}

#[async_trait]
impl Transport for EmailTransport {
    fn channel(&self) -> Channel {
        Channel::Email
    }

    fn name(&self) -> &str {
        "smtp"
    }

    async fn send(
        &self,
        recipient: &str,
        content: &str,
        subject: Option<&str>,
    ) -> Result<DeliveryHandle, ChannelError> {
        let domain = self
            .config
            .from_address
            .rsplit_once('@')
            .map(|(_, d)| d)
            .unwrap_or("localhost");
        let message_id = format!("<{}@{}>", Uuid::new_v4(), domain);
        let email = self.build_message(
            recipient,
            subject.unwrap_or(DEFAULT_EMAIL_SUBJECT),
            content,
            &message_id,
        )?;

        let transport = self.smtp_transport()?;

        // lettre's SmtpTransport is blocking
        tokio::task::spawn_blocking(move || transport.send(&email))
            .await
            .map_err(|e| Self::send_error(format!("SMTP task failed: {e}")))?
            .map_err(|e| Self::send_error(format!("SMTP send failed: {e}")))?;

        tracing::info!(recipient = %recipient, "Email sent");
        Ok(DeliveryHandle::new("smtp", message_id))
    }
}
