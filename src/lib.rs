//! Replyflow: keyword-triggered messaging automations over SMS, WhatsApp,
//! email and Messenger.

pub mod channels;
pub mod config;
pub mod error;
pub mod execution;
pub mod pipeline;
pub mod store;
pub mod webhook;
pub mod workflow;
