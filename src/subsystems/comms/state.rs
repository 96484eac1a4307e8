//! Shared chat-session state: capability boundary for the console.
//!
//! The console receives an `Arc<ChatState>` and is restricted to the typed
//! methods below: it can submit queries, read the user's reminders and post
//! notices, but never touches the worker pool or the store directly.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use crate::error::AppError;
use crate::session::Session;
use crate::store::{self, Database, Reminder};
use crate::subsystems::relay::pool::RelayPool;

/// One entry on the display surface.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChatLine {
    Assistant(String),
    Reminder(String),
    Notice(String),
}

impl fmt::Display for ChatLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChatLine::Assistant(text) => write!(f, "AI: {}", text.trim_end()),
            ChatLine::Reminder(text) => write!(f, "Reminder: {text}"),
            ChatLine::Notice(text) => write!(f, "[{text}]"),
        }
    }
}

pub struct ChatState {
    session: Session,
    store: Arc<Database>,
    pool: RelayPool,
    display: mpsc::Sender<ChatLine>,
}

impl ChatState {
    pub fn new(
        session: Session,
        store: Arc<Database>,
        pool: RelayPool,
        display: mpsc::Sender<ChatLine>,
    ) -> Self {
        Self { session, store, pool, display }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Hand `content` to the relay pool; the reply shows up on the display.
    /// Reminder lines are stored before this returns.
    pub async fn send_message(&self, content: String) {
        debug!(user_id = self.session.user_id, "query submitted");
        self.pool.submit(content).await;
    }

    /// All reminders of the logged-in user, delivered or not.
    pub async fn reminders(&self) -> Result<Vec<Reminder>, AppError> {
        let user_id = self.session.user_id;
        Ok(store::run_blocking(&self.store, move |db| db.reminders_for(user_id)).await?)
    }

    pub async fn notice(&self, text: impl Into<String>) {
        if self.display.send(ChatLine::Notice(text.into())).await.is_err() {
            debug!("display queue closed, notice dropped");
        }
    }

    /// Wait until every submitted query has been answered.
    pub async fn drain(&self) {
        debug!(
            in_flight = self.pool.in_flight(),
            idle_workers = self.pool.idle_workers(),
            "waiting for outstanding replies"
        );
        self.pool.drain().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chat_line_rendering() {
        assert_eq!(ChatLine::Assistant("hi\n\n".into()).to_string(), "AI: hi");
        assert_eq!(ChatLine::Reminder("tea".into()).to_string(), "Reminder: tea");
        assert_eq!(ChatLine::Notice("bye".into()).to_string(), "[bye]");
    }
}
