//! PTY (console) chat channel: reads lines, submits them to the relay pool.
//!
//! Replies are not printed here: they arrive asynchronously on the display
//! queue and the printer writes them, so typing never waits on the model.
//! Runs until `/quit`, end of input, or the shutdown token.  On a clean exit
//! it waits for outstanding replies, then cancels the token so the printer
//! and the reminder poller stop with it.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, Lines};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::state::ChatState;
use crate::error::AppError;
use crate::subsystems::runtime::{Component, ComponentFuture};

pub const HELP: &str = "commands: /reminders, /help, /quit";

pub struct PtyChannel<R> {
    channel_id: String,
    state: Arc<ChatState>,
    lines: Lines<R>,
}

impl<R> PtyChannel<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(channel_id: impl Into<String>, state: Arc<ChatState>, lines: Lines<R>) -> Self {
        Self { channel_id: channel_id.into(), state, lines }
    }
}

impl<R> Component for PtyChannel<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    fn id(&self) -> &str {
        &self.channel_id
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        let PtyChannel { channel_id, state, lines } = *self;
        Box::pin(run_pty(channel_id, state, lines, shutdown))
    }
}

async fn run_pty<R>(
    channel_id: String,
    state: Arc<ChatState>,
    mut lines: Lines<R>,
    shutdown: CancellationToken,
) -> Result<(), AppError>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    info!(%channel_id, user = %state.session().username, "pty channel started");
    println!("─────────────────────────────────");
    println!(" Chatting as {}  ({HELP})", state.session().username);
    println!("─────────────────────────────────");

    loop {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => {
                info!("pty channel shutting down");
                return Ok(());
            }

            line = lines.next_line() => {
                match line {
                    Err(e) => {
                        warn!("pty read error: {e}");
                        break;
                    }
                    Ok(None) => {
                        info!("pty stdin closed");
                        break;
                    }
                    Ok(Some(input)) => {
                        let input = input.trim();
                        if input.is_empty() {
                            continue;
                        }
                        match input {
                            "/quit" | "/exit" => break,
                            "/help" => state.notice(HELP).await,
                            "/reminders" => list_reminders(&state).await?,
                            _ => {
                                debug!(input_len = input.len(), "pty received line");
                                state.send_message(input.to_string()).await;
                            }
                        }
                    }
                }
            }
        }
    }

    tokio::select! {
        _ = shutdown.cancelled() => {}
        _ = state.drain() => {}
    }
    shutdown.cancel();
    Ok(())
}

async fn list_reminders(state: &ChatState) -> Result<(), AppError> {
    let reminders = state.reminders().await?;
    if reminders.is_empty() {
        state.notice("no reminders").await;
    }
    for r in reminders {
        let status = if r.notified { "done" } else { "pending" };
        state.notice(format!("{} {status}: {}", r.remind_time, r.message)).await;
    }
    Ok(())
}
