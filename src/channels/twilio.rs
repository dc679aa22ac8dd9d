//! Twilio Programmable Messaging transport for SMS and WhatsApp.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::channels::transport::{DeliveryHandle, Transport};
use crate::error::ChannelError;
use crate::workflow::Channel;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Twilio account configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: SecretString,
    /// Sender number for SMS.
    pub from_number: String,
    /// Sender number for WhatsApp (without the `whatsapp:` prefix).
    pub whatsapp_from: Option<String>,
}

impl TwilioConfig {
    /// Returns `None` if `TWILIO_ACCOUNT_SID` is not set (channel disabled).
    pub fn from_env() -> Option<Self> {
        let account_sid = std::env::var("TWILIO_ACCOUNT_SID").ok()?;
        let auth_token = SecretString::from(std::env::var("TWILIO_AUTH_TOKEN").unwrap_or_default());
        let from_number = std::env::var("TWILIO_FROM_NUMBER").unwrap_or_default();
        let whatsapp_from = std::env::var("TWILIO_WHATSAPP_FROM").ok();

        Some(Self {
            account_sid,
            auth_token,
            from_number,
            whatsapp_from,
        })
    }
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResource {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: Option<String>,
}

/// Sends SMS or WhatsApp messages through Twilio's Messages resource.
pub struct TwilioTransport {
    config: TwilioConfig,
    channel: Channel,
    client: reqwest::Client,
}

impl TwilioTransport {
    pub fn sms(config: TwilioConfig) -> Self {
        Self {
            config,
            channel: Channel::Sms,
            client: reqwest::Client::new(),
        }
    }

    pub fn whatsapp(config: TwilioConfig) -> Self {
        Self {
            config,
            channel: Channel::Whatsapp,
            client: reqwest::Client::new(),
        }
    }

    fn messages_url(&self) -> String {
        format!(
            "{TWILIO_API_BASE}/Accounts/{}/Messages.json",
            self.config.account_sid
        )
    }

    /// Twilio addresses WhatsApp numbers as `whatsapp:+1555...`.
    fn address(&self, number: &str) -> String {
        match self.channel {
            Channel::Whatsapp => format!("whatsapp:{number}"),
            _ => number.to_string(),
        }
    }

    fn from_address(&self) -> String {
        match self.channel {
            Channel::Whatsapp => {
                let from = self
                    .config
                    .whatsapp_from
                    .as_deref()
                    .unwrap_or(&self.config.from_number);
                self.address(from)
            }
            _ => self.config.from_number.clone(),
        }
    }

    fn send_error(&self, reason: impl Into<String>) -> ChannelError {
        ChannelError::SendFailed {
            channel: self.channel,
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Transport for TwilioTransport {
    fn channel(&self) -> Channel {
        self.channel
    }

    fn name(&self) -> &str {
        "twilio"
    }

    async fn send(
        &self,
        recipient: &str,
        content: &str,
        _subject: Option<&str>,
    ) -> Result<DeliveryHandle, ChannelError> {
        let form = [
            ("To", self.address(recipient)),
            ("From", self.from_address()),
            ("Body", content.to_string()),
        ];

        let resp = self
            .client
            .post(self.messages_url())
            .basic_auth(
                &self.config.account_sid,
                Some(self.config.auth_token.expose_secret()),
            )
            .form(&form)
            .send()
            .await
            .map_err(|e| ChannelError::Http(format!("Twilio request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let reason = match serde_json::from_str::<ErrorResource>(&body) {
                Ok(ErrorResource {
                    code: Some(code),
                    message: Some(message),
                }) => format!("Twilio error {code}: {message}"),
                _ => format!("Twilio API error {status}: {body}"),
            };
            return Err(self.send_error(reason));
        }

        let message: MessageResource = resp
            .json()
            .await
            .map_err(|e| self.send_error(format!("Invalid Twilio response: {e}")))?;

        Ok(DeliveryHandle::new("twilio", message.sid))
    }
}
