//! Facebook Messenger transport: Graph API Send API.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::channels::transport::{DeliveryHandle, Transport};
use crate::error::ChannelError;
use crate::workflow::Channel;

/// Messenger page configuration.
#[derive(Debug, Clone)]
pub struct MessengerConfig {
    pub page_access_token: SecretString,
    pub api_version: String,
}

impl MessengerConfig {
    /// Returns `None` if `MESSENGER_PAGE_ACCESS_TOKEN` is not set (channel disabled).
    pub fn from_env() -> Option<Self> {
        let token = std::env::var("MESSENGER_PAGE_ACCESS_TOKEN").ok()?;
        let api_version =
            std::env::var("MESSENGER_API_VERSION").unwrap_or_else(|_| "v21.0".to_string());
        Some(Self {
            page_access_token: SecretString::from(token),
            api_version,
        })
    }
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    message_id: String,
}

/// Sends text replies to page-scoped user IDs.
pub struct MessengerTransport {
    config: MessengerConfig,
    client: reqwest::Client,
}

impl MessengerTransport {
    pub fn new(config: MessengerConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self) -> String {
        format!(
            "https://graph.facebook.com/{}/me/messages",
            self.config.api_version
        )
    }

    fn request_body(recipient: &str, content: &str) -> serde_json::Value {
        serde_json::json!({
            "recipient": { "id": recipient },
            "messaging_type": "RESPONSE",
            "message": { "text": content }
        })
    }
}

#[async_trait]
impl Transport for MessengerTransport {
    fn channel(&self) -> Channel {
        Channel::Messenger
    }

    fn name(&self) -> &str {
        "messenger"
    }

    async fn send(
        &self,
        recipient: &str,
        content: &str,
        _subject: Option<&str>,
    ) -> Result<DeliveryHandle, ChannelError> {
        let resp = self
            .client
            .post(self.api_url())
            .query(&[("access_token", self.config.page_access_token.expose_secret())])
            .json(&Self::request_body(recipient, content))
            .send()
            .await
            .map_err(|e| ChannelError::Http(format!("Messenger request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                channel: Channel::Messenger,
                reason: format!("Graph API error {status}: {body}"),
            });
        }

        let sent: SendResponse = resp.json().await.map_err(|e| ChannelError::SendFailed {
            channel: Channel::Messenger,
            reason: format!("Invalid Graph API response: {e}"),
        })?;

        Ok(DeliveryHandle::new("messenger", sent.message_id))
    }
}
