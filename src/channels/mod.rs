//! Outbound channels: recipient validation, personalization, transports
//! and the dispatcher that ties them together.

pub mod dispatcher;
pub mod email;
pub mod messenger;
pub mod personalize;
pub mod recipient;
pub mod transport;
pub mod twilio;

pub use dispatcher::{ChannelDispatcher, Delivery};
pub use email::{EmailTransport, SmtpConfig};
pub use messenger::{MessengerConfig, MessengerTransport};
pub use personalize::personalize;
pub use recipient::validate_recipient;
pub use transport::{DeliveryHandle, Transport};
pub use twilio::{TwilioConfig, TwilioTransport};
