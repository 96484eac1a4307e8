//! Stirixis: local chat assistant.
//!
//! Login gate over a SQLite user table, then a console chat whose lines are
//! relayed to a local model runner, with minute-granularity reminders.

pub mod config;
pub mod error;
pub mod llm;
pub mod logger;
pub mod session;
pub mod store;
pub mod subsystems;
