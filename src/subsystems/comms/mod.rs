//! Comms subsystem: the terminal chat surface.
//!
//! # Architecture
//!
//! After the login gate hands over a [`Session`], [`start`] wires up:
//!
//! - the display queue (`mpsc` of [`ChatLine`]) and the [`printer::Printer`]
//!   that owns stdout for replies and reminders,
//! - the relay worker pool behind an [`Arc<ChatState>`],
//! - the [`pty::PtyChannel`] reading the user's lines,
//! - the reminder poller, when enabled.
//!
//! All of them run as [`Component`]s under one shutdown token.
//!
//! # Non-blocking
//!
//! [`start`] is synchronous: it returns a [`SubsystemHandle`] as soon as the
//! tasks are spawned.  The caller decides when to await it.

pub mod login;
pub mod printer;
pub mod pty;
mod state;

pub use state::{ChatLine, ChatState};

use std::sync::Arc;

use tokio::io::{AsyncBufRead, Lines};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::llm::LlmProvider;
use crate::session::Session;
use crate::store::Database;
use crate::subsystems::relay::ResponseRelay;
use crate::subsystems::relay::pool::RelayPool;
use crate::subsystems::runtime::{Component, SubsystemHandle, spawn_components};

/// Display queue depth; senders wait when the printer falls behind.
const DISPLAY_BUFFER: usize = 64;

pub fn start<R>(
    config: &Config,
    store: Arc<Database>,
    provider: LlmProvider,
    session: Session,
    lines: Lines<R>,
    shutdown: CancellationToken,
) -> SubsystemHandle
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    let (display_tx, display_rx) = mpsc::channel::<ChatLine>(DISPLAY_BUFFER);

    let relay = ResponseRelay::new(store.clone(), provider, session.user_id);
    let pool = RelayPool::new(relay, config.relay.workers, display_tx.clone(), shutdown.clone());

    info!(user_id = session.user_id, workers = config.relay.workers, "starting chat components");

    let mut components: Vec<Box<dyn Component>> = Vec::new();
    components.push(Box::new(printer::Printer::new(display_rx, std::io::stdout())));

    #[cfg(feature = "subsystem-reminders")]
    {
        if config.reminders.enabled {
            info!("loading reminder poller");
            components.push(Box::new(crate::subsystems::reminders::ReminderPoller::new(
                store.clone(),
                session.user_id,
                std::time::Duration::from_secs(config.reminders.poll_interval_secs),
                display_tx.clone(),
            )));
        }
    }

    let state = Arc::new(ChatState::new(session, store, pool, display_tx));
    components.push(Box::new(pty::PtyChannel::new("pty0", state, lines)));

    spawn_components(components, shutdown)
}
