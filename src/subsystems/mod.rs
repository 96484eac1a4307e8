//! Subsystem modules for the chat session.

pub mod comms;
pub mod relay;
#[cfg(feature = "subsystem-reminders")]
pub mod reminders;
pub mod runtime;
