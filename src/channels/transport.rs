//! Transport abstraction: one provider-backed sender per channel.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ChannelError;
use crate::workflow::Channel;

/// Opaque provider reference for a delivered message (e.g. a Twilio SID).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryHandle {
    pub provider: String,
    pub id: String,
}

impl DeliveryHandle {
    pub fn new(provider: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for DeliveryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.provider, self.id)
    }
}

/// Trait for channel transports: pure I/O, no validation or templating.
///
/// The dispatcher validates recipients and personalizes content before
/// calling `send`.
#[async_trait]
pub trait Transport: Send + Sync {
    /// The channel this transport delivers on.
    fn channel(&self) -> Channel;

    /// Provider name for logs (e.g. "twilio").
    fn name(&self) -> &str;

    /// Deliver one message. `subject` is only set for email.
    async fn send(
        &self,
        recipient: &str,
        content: &str,
        subject: Option<&str>,
    ) -> Result<DeliveryHandle, ChannelError>;
}
