//! Channel dispatcher: validates, personalizes, then hands off to the
//! channel's transport.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::channels::personalize::personalize;
use crate::channels::recipient::validate_recipient;
use crate::channels::transport::{DeliveryHandle, Transport};
use crate::error::ChannelError;
use crate::workflow::{Channel, Contact};

/// Default per-send timeout.
pub const DEFAULT_SEND_TIMEOUT: Duration = Duration::from_secs(30);

/// Result of a successful dispatch.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub handle: DeliveryHandle,
    /// Content actually sent (after personalization).
    pub personalized_content: String,
}

/// Routes outbound messages to the transport registered for each channel.
pub struct ChannelDispatcher {
    transports: HashMap<Channel, Arc<dyn Transport>>,
    timeout: Duration,
}

impl Default for ChannelDispatcher {
    fn default() -> Self {
        Self::new(DEFAULT_SEND_TIMEOUT)
    }
}

impl ChannelDispatcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            transports: HashMap::new(),
            timeout,
        }
    }

    /// Register a transport, replacing any previous one for its channel.
    pub fn register(&mut self, transport: Arc<dyn Transport>) {
        let channel = transport.channel();
        info!(channel = %channel, provider = transport.name(), "Transport registered");
        if self.transports.insert(channel, transport).is_some() {
            warn!(channel = %channel, "Replaced existing transport");
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.register(transport);
        self
    }

    pub fn has_transport(&self, channel: Channel) -> bool {
        self.transports.contains_key(&channel)
    }

    /// Channels with a registered transport.
    pub fn channels(&self) -> Vec<Channel> {
        let mut channels: Vec<Channel> = self.transports.keys().copied().collect();
        channels.sort();
        channels
    }

    /// Send `content` to `recipient` on `channel`.
    ///
    /// Invalid recipients fail before the transport is touched. When a
    /// contact is supplied, placeholders in the content and subject are
    /// filled from it first.
    pub async fn send(
        &self,
        recipient: &str,
        content: &str,
        channel: Channel,
        subject: Option<&str>,
        contact: Option<&Contact>,
    ) -> Result<Delivery, ChannelError> {
        validate_recipient(channel, recipient)?;

        let transport = self
            .transports
            .get(&channel)
            .ok_or(ChannelError::NoTransport { channel })?;

        let (personalized_content, personalized_subject) = match contact {
            Some(contact) => (
                personalize(content, contact),
                subject.map(|s| personalize(s, contact)),
            ),
            None => (content.to_string(), subject.map(String::from)),
        };

        debug!(
            channel = %channel,
            recipient = %recipient,
            provider = transport.name(),
            personalized = contact.is_some(),
            "Dispatching message"
        );

        let handle = tokio::time::timeout(
            self.timeout,
            transport.send(recipient, &personalized_content, personalized_subject.as_deref()),
        )
        .await
        .map_err(|_| ChannelError::Timeout {
            channel,
            timeout: self.timeout,
        })??;

        info!(channel = %channel, recipient = %recipient, handle = %handle, "Message delivered");

        Ok(Delivery {
            handle,
            personalized_content,
        })
    }
}
