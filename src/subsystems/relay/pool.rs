//! Bounded relay worker pool.
//!
//! Reminder lines are stored inline: they never touch the model, so they
//! are timestamped on arrival and never queue behind a slow model call.
//! Every other query becomes a tracked task that first waits for one of
//! `workers` semaphore permits, then runs [`ResponseRelay::respond`] and
//! pushes the reply onto the display queue.  Cancelling the shutdown token
//! abandons queued and in-flight queries; an abandoned subprocess call kills
//! its child on drop.

use std::sync::Arc;

use chrono::Local;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use super::{ResponseRelay, Route, route};
use crate::error::AppError;
use crate::subsystems::comms::ChatLine;

pub struct RelayPool {
    relay: Arc<ResponseRelay>,
    permits: Arc<Semaphore>,
    display: mpsc::Sender<ChatLine>,
    shutdown: CancellationToken,
    tracker: TaskTracker,
}

impl RelayPool {
    pub fn new(
        relay: ResponseRelay,
        workers: usize,
        display: mpsc::Sender<ChatLine>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            relay: Arc::new(relay),
            permits: Arc::new(Semaphore::new(workers.max(1))),
            display,
            shutdown,
            tracker: TaskTracker::new(),
        }
    }

    /// Relay `query`.  A reminder line is stored and acknowledged before
    /// this returns; a model query is queued and its reply arrives on the
    /// display queue later as [`ChatLine::Assistant`].
    pub async fn submit(&self, query: String) {
        if let Route::Reminder { .. } = route(&query) {
            let reply = self.relay.respond_at(&query, Local::now().naive_local()).await;
            deliver(&self.display, reply).await;
            return;
        }

        let relay = Arc::clone(&self.relay);
        let permits = Arc::clone(&self.permits);
        let display = self.display.clone();
        let shutdown = self.shutdown.clone();

        self.tracker.spawn(async move {
            let _permit = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("queued query dropped on shutdown");
                    return;
                }
                permit = permits.acquire_owned() => match permit {
                    Ok(p) => p,
                    Err(_) => return,
                },
            };

            let reply = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    debug!("in-flight query cancelled");
                    return;
                }
                reply = relay.respond(&query) => reply,
            };

            deliver(&display, reply).await;
        });
    }

    /// Queries submitted and not yet finished (queued or running).
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Permits not currently held by a running query.
    pub fn idle_workers(&self) -> usize {
        self.permits.available_permits()
    }

    /// Stop accepting work and wait for every tracked task to finish.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

async fn deliver(display: &mpsc::Sender<ChatLine>, reply: Result<String, AppError>) {
    let line = match reply {
        Ok(text) => ChatLine::Assistant(text),
        Err(e) => {
            warn!(error = %e, "relay failed");
            ChatLine::Notice(format!("error: {e}"))
        }
    };
    if display.send(line).await.is_err() {
        debug!("display queue closed, reply dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::llm::LlmProvider;
    use crate::llm::providers::{dummy::DummyProvider, subprocess::SubprocessProvider};
    use crate::store::Database;
    use crate::subsystems::relay::REMINDER_ACK;

    struct Fixture {
        pool: RelayPool,
        rx: mpsc::Receiver<ChatLine>,
        shutdown: CancellationToken,
        store: Arc<Database>,
    }

    fn make_pool(provider: LlmProvider, workers: usize) -> Fixture {
        let store = Arc::new(Database::open_in_memory().unwrap());
        store.register("u", "p").unwrap();
        let relay = ResponseRelay::new(store.clone(), provider, 1);
        let (tx, rx) = mpsc::channel(16);
        let shutdown = CancellationToken::new();
        let pool = RelayPool::new(relay, workers, tx, shutdown.clone());
        Fixture { pool, rx, shutdown, store }
    }

    #[cfg(unix)]
    fn sleeper() -> LlmProvider {
        LlmProvider::Subprocess(SubprocessProvider::new(
            "sh".into(),
            vec!["-c".into(), "sleep 10".into()],
            Duration::from_secs(30),
        ))
    }

    #[tokio::test]
    async fn reply_lands_on_display_queue() {
        let Fixture { pool, mut rx, .. } = make_pool(LlmProvider::Dummy(DummyProvider), 2);
        pool.submit("hi".into()).await;
        assert_eq!(rx.recv().await, Some(ChatLine::Assistant("[echo] hi".into())));
    }

    #[tokio::test]
    async fn reminder_lines_are_acknowledged() {
        let Fixture { pool, mut rx, .. } = make_pool(LlmProvider::Dummy(DummyProvider), 1);
        pool.submit("remind me in 2 minutes to stand up".into()).await;
        assert_eq!(rx.recv().await, Some(ChatLine::Assistant(REMINDER_ACK.into())));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn reminder_does_not_wait_for_a_busy_worker() {
        let Fixture { pool, mut rx, shutdown, store } = make_pool(sleeper(), 1);
        pool.submit("long question".into()).await;
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(pool.idle_workers(), 0);

        pool.submit("remind me in 2 minutes".into()).await;
        assert_eq!(store.reminders_for(1).unwrap().len(), 1);
        assert_eq!(rx.try_recv().unwrap(), ChatLine::Assistant(REMINDER_ACK.into()));
        assert_eq!(pool.in_flight(), 1);

        shutdown.cancel();
        pool.drain().await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn workers_bound_concurrency_and_shutdown_cancels() {
        let Fixture { pool, mut rx, shutdown, .. } = make_pool(sleeper(), 1);
        for q in ["a", "b", "c"] {
            pool.submit(q.into()).await;
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(pool.in_flight(), 3);
        assert_eq!(pool.idle_workers(), 0);

        shutdown.cancel();
        tokio::time::timeout(Duration::from_secs(5), pool.drain())
            .await
            .expect("drain should finish after cancel");
        assert_eq!(pool.in_flight(), 0);
        assert!(rx.try_recv().is_err());
    }
}
