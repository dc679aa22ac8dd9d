//! Recipient address validation per channel.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ChannelError;
use crate::workflow::Channel;

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\+\d{10,15}$").unwrap());

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").unwrap());

/// Page-scoped IDs issued by the Messenger platform.
static PSID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_\-]+$").unwrap());

/// `+` followed by 10–15 digits.
pub fn is_valid_phone(recipient: &str) -> bool {
    PHONE_RE.is_match(recipient)
}

pub fn is_valid_email(recipient: &str) -> bool {
    EMAIL_RE.is_match(recipient)
}

/// Check that `recipient` is addressable on `channel`.
pub fn validate_recipient(channel: Channel, recipient: &str) -> Result<(), ChannelError> {
    let valid = match channel {
        Channel::Sms | Channel::Whatsapp => is_valid_phone(recipient),
        Channel::Email => is_valid_email(recipient),
        Channel::Messenger => PSID_RE.is_match(recipient),
    };

    if valid {
        Ok(())
    } else {
        Err(ChannelError::InvalidRecipient {
            channel,
            recipient: recipient.to_string(),
        })
    }
}
