//! Reminder poller: delivers a user's due reminders into the chat.
//!
//! Ticks every `interval` (first tick immediately) for as long as the chat
//! session lives.  Each tick formats the current local minute as
//! `YYYY-MM-DD HH:MM`, claims every pending reminder at or before it, and
//! pushes one [`ChatLine::Reminder`] per claimed row.  Claiming flips
//! `notified` inside the store transaction, so each reminder is shown once.
//! A tick that runs late still picks up reminders whose minute it skipped.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDateTime};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::store::{self, Database, REMIND_TIME_FORMAT};
use crate::subsystems::comms::ChatLine;
use crate::subsystems::runtime::{Component, ComponentFuture};

pub struct ReminderPoller {
    store: Arc<Database>,
    user_id: i64,
    interval: Duration,
    display: mpsc::Sender<ChatLine>,
}

impl ReminderPoller {
    pub fn new(
        store: Arc<Database>,
        user_id: i64,
        interval: Duration,
        display: mpsc::Sender<ChatLine>,
    ) -> Self {
        Self { store, user_id, interval, display }
    }

    /// One poll at `now`.  Returns how many reminders were delivered.
    pub async fn poll_at(&self, now: NaiveDateTime) -> Result<usize, AppError> {
        let minute = now.format(REMIND_TIME_FORMAT).to_string();
        let user_id = self.user_id;
        let due = store::run_blocking(&self.store, move |db| {
            db.take_due_reminders(user_id, &minute)
        })
        .await?;

        let count = due.len();
        for r in due {
            debug!(reminder_id = r.id, remind_time = %r.remind_time, "reminder due");
            if self.display.send(ChatLine::Reminder(r.message)).await.is_err() {
                warn!(reminder_id = r.id, "display closed, reminder marked but not shown");
            }
        }
        Ok(count)
    }
}

impl Component for ReminderPoller {
    fn id(&self) -> &str {
        "reminders"
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> ComponentFuture {
        Box::pin(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(user_id = self.user_id, interval_secs = self.interval.as_secs(), "reminder poller started");

            loop {
                tokio::select! {
                    biased;

                    _ = shutdown.cancelled() => break,

                    _ = ticker.tick() => {
                        match self.poll_at(Local::now().naive_local()).await {
                            Ok(0) => {}
                            Ok(n) => info!(delivered = n, "reminders delivered"),
                            // Store hiccups are retried on the next tick.
                            Err(e) => warn!(error = %e, "reminder poll failed"),
                        }
                    }
                }
            }

            debug!("reminder poller stopped");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    use crate::store::RegisterOutcome;

    fn setup() -> (Arc<Database>, i64, mpsc::Receiver<ChatLine>, ReminderPoller) {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let RegisterOutcome::Created(uid) = db.register("u", "p").unwrap() else {
            panic!("register failed");
        };
        let (tx, rx) = mpsc::channel(16);
        let poller = ReminderPoller::new(db.clone(), uid, Duration::from_millis(50), tx);
        (db, uid, rx, poller)
    }

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2030, 6, 1).unwrap().and_hms_opt(h, m, s).unwrap()
    }

    #[tokio::test]
    async fn matching_minute_is_delivered_exactly_once() {
        let (db, uid, mut rx, poller) = setup();
        let id = db.add_reminder(uid, "remind me to drink water", "2030-06-01 12:30").unwrap();

        assert_eq!(poller.poll_at(at(12, 29, 59)).await.unwrap(), 0);
        assert!(!db.reminder(id).unwrap().unwrap().notified);

        assert_eq!(poller.poll_at(at(12, 30, 10)).await.unwrap(), 1);
        assert_eq!(rx.recv().await, Some(ChatLine::Reminder("remind me to drink water".into())));
        assert!(db.reminder(id).unwrap().unwrap().notified);

        assert_eq!(poller.poll_at(at(12, 30, 40)).await.unwrap(), 0);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn late_tick_catches_up() {
        let (db, uid, mut rx, poller) = setup();
        db.add_reminder(uid, "skipped", "2030-06-01 12:30").unwrap();
        assert_eq!(poller.poll_at(at(12, 32, 0)).await.unwrap(), 1);
        assert_eq!(rx.recv().await, Some(ChatLine::Reminder("skipped".into())));
    }

    #[tokio::test]
    async fn run_loop_delivers_past_reminders_and_stops_on_cancel() {
        let (db, uid, mut rx, poller) = setup();
        db.add_reminder(uid, "long overdue", "2000-01-01 00:00").unwrap();

        let shutdown = CancellationToken::new();
        let task = tokio::spawn(Box::new(poller).run(shutdown.clone()));

        let line = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("reminder not delivered");
        assert_eq!(line, Some(ChatLine::Reminder("long overdue".into())));

        shutdown.cancel();
        task.await.unwrap().unwrap();
    }
}
