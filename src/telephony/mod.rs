//! Telephony boundary: webhook events and response markup.

pub mod events;
pub mod twiml;

pub use events::{CallStartEvent, CallStatus, SpeechEvent, StatusEvent, parse_confidence};
pub use twiml::{TelephonyRenderer, TwimlRenderer};
