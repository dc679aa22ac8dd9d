//! Core types for workflows.
//!
//! A workflow is a persisted trigger -> action rule: when an inbound message
//! on one of the trigger channels contains the keyword, send the channel's
//! message template back to the sender (optionally after a delay).

use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Subject used when an email reply is built from a plain-text template.
pub const DEFAULT_EMAIL_SUBJECT: &str = "Re: your message";

/// A messaging transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Sms,
    Whatsapp,
    Email,
    Messenger,
}

impl Channel {
    pub const ALL: [Channel; 4] = [
        Channel::Sms,
        Channel::Whatsapp,
        Channel::Email,
        Channel::Messenger,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Sms => "sms",
            Channel::Whatsapp => "whatsapp",
            Channel::Email => "email",
            Channel::Messenger => "messenger",
        }
    }

}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sms" => Ok(Channel::Sms),
            "whatsapp" => Ok(Channel::Whatsapp),
            "email" => Ok(Channel::Email),
            "messenger" => Ok(Channel::Messenger),
            other => Err(format!("unknown channel: {other}")),
        }
    }
}

/// Lifecycle status. Only active workflows participate in matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    #[default]
    Draft,
    Active,
}

impl fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowStatus::Draft => write!(f, "draft"),
            WorkflowStatus::Active => write!(f, "active"),
        }
    }
}

impl FromStr for WorkflowStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "draft" => Ok(WorkflowStatus::Draft),
            "active" => Ok(WorkflowStatus::Active),
            other => Err(format!("unknown workflow status: {other}")),
        }
    }
}

/// Keyword + channel condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub keyword: String,
    pub channels: BTreeSet<Channel>,
}

impl Trigger {
    pub fn new(keyword: impl Into<String>, channels: impl IntoIterator<Item = Channel>) -> Self {
        Self {
            keyword: keyword.into(),
            channels: channels.into_iter().collect(),
        }
    }

    pub fn listens_on(&self, channel: Channel) -> bool {
        self.channels.contains(&channel)
    }

    /// Substring containment, case-insensitive. `normalized_content` must
    /// already be trimmed and lowercased. A blank keyword never matches.
    pub fn matches_content(&self, normalized_content: &str) -> bool {
        let keyword = self.keyword.trim().to_lowercase();
        !keyword.is_empty() && normalized_content.contains(&keyword)
    }
}

/// Outbound message template for one channel, carrying that channel's
/// payload shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum ChannelMessage {
    Sms { body: String },
    Whatsapp { body: String },
    Email { subject: String, body: String },
    Messenger { body: String },
}

impl ChannelMessage {
    /// Build a plain-text template for `channel`. Email gets the default subject.
    pub fn text(channel: Channel, body: impl Into<String>) -> Self {
        let body = body.into();
        match channel {
            Channel::Sms => ChannelMessage::Sms { body },
            Channel::Whatsapp => ChannelMessage::Whatsapp { body },
            Channel::Email => ChannelMessage::Email {
                subject: DEFAULT_EMAIL_SUBJECT.to_string(),
                body,
            },
            Channel::Messenger => ChannelMessage::Messenger { body },
        }
    }

    pub fn email(subject: impl Into<String>, body: impl Into<String>) -> Self {
        ChannelMessage::Email {
            subject: subject.into(),
            body: body.into(),
        }
    }

    pub fn channel(&self) -> Channel {
        match self {
            ChannelMessage::Sms { .. } => Channel::Sms,
            ChannelMessage::Whatsapp { .. } => Channel::Whatsapp,
            ChannelMessage::Email { .. } => Channel::Email,
            ChannelMessage::Messenger { .. } => Channel::Messenger,
        }
    }

    pub fn body(&self) -> &str {
        match self {
            ChannelMessage::Sms { body }
            | ChannelMessage::Whatsapp { body }
            | ChannelMessage::Email { body, .. }
            | ChannelMessage::Messenger { body } => body,
        }
    }

    pub fn subject(&self) -> Option<&str> {
        match self {
            ChannelMessage::Email { subject, .. } => Some(subject),
            _ => None,
        }
    }
}

/// What happens when a workflow fires.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Delay expression, see [`crate::workflow::parse_delay`].
    #[serde(default = "default_delay")]
    pub delay: String,
    #[serde(default)]
    pub messages: Vec<ChannelMessage>,
}

fn default_delay() -> String {
    "immediate".to_string()
}

impl Action {
    /// The template configured for `channel`, if any.
    pub fn message_for(&self, channel: Channel) -> Option<&ChannelMessage> {
        self.messages.iter().find(|m| m.channel() == channel)
    }
}

/// Who created the workflow. Opaque to the engine.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Owner {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

/// A contact record used for personalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appointment_type: Option<String>,
    /// Any other imported columns, addressable as `{{key}}`. Values keep
    /// their JSON type; only scalars are rendered.
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_json::Value>,
}

impl Contact {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        match key.as_str() {
            "name" => self.name = Some(value),
            "phone" => self.phone = Some(value),
            "email" => self.email = Some(value),
            "appointment_time" => self.appointment_time = Some(value),
            "appointment_type" => self.appointment_type = Some(value),
            _ => {
                self.fields.insert(key, serde_json::Value::String(value));
            }
        }
        self
    }

    /// Look up a field by name, rendered as text. Empty strings, nulls,
    /// arrays and objects count as absent.
    pub fn field(&self, key: &str) -> Option<Cow<'_, str>> {
        let value = match key {
            "name" => self.name.as_deref().map(Cow::Borrowed),
            "phone" => self.phone.as_deref().map(Cow::Borrowed),
            "email" => self.email.as_deref().map(Cow::Borrowed),
            "appointment_time" => self.appointment_time.as_deref().map(Cow::Borrowed),
            "appointment_type" => self.appointment_type.as_deref().map(Cow::Borrowed),
            other => self.fields.get(other).and_then(render_scalar),
        };
        value.filter(|v| !v.is_empty())
    }

    /// Whether this contact is the given sender (phone exact, email case-insensitive).
    pub fn identifies(&self, sender: &str) -> bool {
        let sender = sender.trim();
        self.phone.as_deref().is_some_and(|p| p.trim() == sender)
            || self
                .email
                .as_deref()
                .is_some_and(|e| e.trim().eq_ignore_ascii_case(sender))
    }
}

fn render_scalar(value: &serde_json::Value) -> Option<Cow<'_, str>> {
    match value {
        serde_json::Value::String(s) => Some(Cow::Borrowed(s)),
        serde_json::Value::Number(n) => Some(Cow::Owned(n.to_string())),
        serde_json::Value::Bool(b) => Some(Cow::Owned(b.to_string())),
        _ => None,
    }
}

/// An automation: keyword + channels -> message template(s) + delay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: WorkflowStatus,
    pub trigger: Trigger,
    pub action: Action,
    #[serde(default)]
    pub owner: Owner,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Create a draft workflow.
    pub fn new(name: impl Into<String>, trigger: Trigger, action: Action) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status: WorkflowStatus::Draft,
            trigger,
            action,
            owner: Owner::default(),
            contacts: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn activated(mut self) -> Self {
        self.status = WorkflowStatus::Active;
        self
    }

    pub fn with_contacts(mut self, contacts: Vec<Contact>) -> Self {
        self.contacts = contacts;
        self
    }

    pub fn is_active(&self) -> bool {
        self.status == WorkflowStatus::Active
    }

    /// First contact whose phone or email equals `sender`.
    pub fn contact_for(&self, sender: &str) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.identifies(sender))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_parse_is_case_insensitive() {
        assert_eq!("SMS".parse::<Channel>().unwrap(), Channel::Sms);
        assert_eq!(" WhatsApp ".parse::<Channel>().unwrap(), Channel::Whatsapp);
        assert!("fax".parse::<Channel>().is_err());
        for channel in Channel::ALL {
            assert_eq!(channel.to_string().parse::<Channel>().unwrap(), channel);
        }
    }

    #[test]
    fn message_templates_deserialize_by_channel_tag() {
        let json = serde_json::json!([
            { "channel": "sms", "body": "Thanks!" },
            { "channel": "email", "subject": "Hello", "body": "Thanks by mail" }
        ]);
        let messages: Vec<ChannelMessage> = serde_json::from_value(json).unwrap();
        assert_eq!(messages[0], ChannelMessage::text(Channel::Sms, "Thanks!"));
        assert_eq!(messages[1].subject(), Some("Hello"));
        assert_eq!(messages[1].channel(), Channel::Email);
    }

    #[test]
    fn action_resolves_template_per_channel() {
        let action = Action {
            delay: "immediate".into(),
            messages: vec![
                ChannelMessage::text(Channel::Sms, "sms body"),
                ChannelMessage::email("subj", "mail body"),
            ],
        };
        assert_eq!(action.message_for(Channel::Sms).unwrap().body(), "sms body");
        assert_eq!(action.message_for(Channel::Email).unwrap().body(), "mail body");
        assert!(action.message_for(Channel::Whatsapp).is_none());
    }

    #[test]
    fn text_email_uses_default_subject() {
        let msg = ChannelMessage::text(Channel::Email, "hi");
        assert_eq!(msg.subject(), Some(DEFAULT_EMAIL_SUBJECT));
    }

    #[test]
    fn trigger_keyword_is_substring() {
        let trigger = Trigger::new("DEMO", [Channel::Sms]);
        assert!(trigger.matches_content("please send demo info"));
        assert!(!trigger.matches_content("dem o"));
        assert!(!Trigger::new("  ", [Channel::Sms]).matches_content("anything"));
    }

    #[test]
    fn contact_flattened_fields() {
        let json = serde_json::json!({
            "name": "Jo",
            "phone": "+15551234567",
            "clinic": "Downtown"
        });
        let contact: Contact = serde_json::from_value(json).unwrap();
        assert_eq!(contact.field("name").as_deref(), Some("Jo"));
        assert_eq!(contact.field("clinic").as_deref(), Some("Downtown"));
        assert_eq!(contact.field("missing"), None);
    }

    #[test]
    fn contact_scalar_fields_render_as_text() {
        let json = serde_json::json!({
            "name": "Jo",
            "phone": "+15551234567",
            "age": 42,
            "balance": 12.5,
            "vip": true,
            "notes": null,
            "tags": ["a", "b"],
            "address": { "city": "Lisbon" }
        });
        let contact: Contact = serde_json::from_value(json).unwrap();
        assert_eq!(contact.field("age").as_deref(), Some("42"));
        assert_eq!(contact.field("balance").as_deref(), Some("12.5"));
        assert_eq!(contact.field("vip").as_deref(), Some("true"));
        assert_eq!(contact.field("notes"), None);
        assert_eq!(contact.field("tags"), None);
        assert_eq!(contact.field("address"), None);
    }

    #[test]
    fn contact_identifies_sender() {
        let contact = Contact::named("Jo")
            .with_phone("+15551234567")
            .with_email("Jo@Example.com");
        assert!(contact.identifies("+15551234567"));
        assert!(contact.identifies("jo@example.com"));
        assert!(!contact.identifies("+15550000000"));
    }

    #[test]
    fn workflow_defaults_from_json() {
        let json = serde_json::json!({
            "id": Uuid::new_v4(),
            "status": "active",
            "trigger": { "keyword": "price", "channels": ["sms", "whatsapp"] },
            "action": { "messages": [{ "channel": "sms", "body": "Our prices..." }] }
        });
        let workflow: Workflow = serde_json::from_value(json).unwrap();
        assert!(workflow.is_active());
        assert_eq!(workflow.action.delay, "immediate");
        assert!(workflow.trigger.listens_on(Channel::Whatsapp));
        assert!(workflow.contacts.is_empty());
    }
}
