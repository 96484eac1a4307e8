//! Response relay: turns one chat line into one reply.
//!
//! A line containing `remind me` becomes a reminder row and gets a fixed
//! acknowledgement; the model is not consulted.  Every other line is sent
//! verbatim to the configured [`LlmProvider`] and its text comes back as-is,
//! or as a fixed fallback when the provider times out or fails.
//!
//! [`pool::RelayPool`] runs relay calls on a bounded set of workers so the
//! console never waits on the model.

pub mod pool;

use std::sync::Arc;

use chrono::{Local, NaiveDateTime, TimeDelta};
use tracing::{debug, info, warn};

use crate::error::AppError;
use crate::llm::{LlmProvider, ProviderError};
use crate::store::{self, Database, REMIND_TIME_FORMAT};

/// Substring that routes a line to reminder creation.
pub const REMINDER_TRIGGER: &str = "remind me";
/// Minute offset used when a reminder line carries no number.
pub const DEFAULT_REMINDER_MINUTES: u32 = 1;

pub const REMINDER_ACK: &str = "Okay, I'll remind you.";
pub const TIMEOUT_FALLBACK: &str = "Request timed out.";
pub const FAILURE_FALLBACK: &str = "Request failed.";

/// Where a chat line goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Reminder { minutes: u32 },
    Model,
}

pub fn route(query: &str) -> Route {
    if query.contains(REMINDER_TRIGGER) {
        Route::Reminder {
            minutes: first_number(query).unwrap_or(DEFAULT_REMINDER_MINUTES),
        }
    } else {
        Route::Model
    }
}

/// First run of ASCII digits in `text`, if it fits a `u32`.
fn first_number(text: &str) -> Option<u32> {
    let digits = text.split(|c: char| !c.is_ascii_digit()).find(|tok| !tok.is_empty())?;
    match digits.parse() {
        Ok(n) => Some(n),
        Err(e) => {
            debug!(%digits, error = %e, "minute count out of range, using default");
            None
        }
    }
}

/// `now + minutes`, formatted at minute granularity.
pub fn remind_time(now: NaiveDateTime, minutes: u32) -> Option<String> {
    now.checked_add_signed(TimeDelta::minutes(i64::from(minutes)))
        .map(|at| at.format(REMIND_TIME_FORMAT).to_string())
}

/// Per-session relay: one logged-in user, one provider, the shared store.
#[derive(Clone)]
pub struct ResponseRelay {
    store: Arc<Database>,
    provider: LlmProvider,
    user_id: i64,
}

impl ResponseRelay {
    pub fn new(store: Arc<Database>, provider: LlmProvider, user_id: i64) -> Self {
        Self { store, provider, user_id }
    }

    pub async fn respond(&self, query: &str) -> Result<String, AppError> {
        self.respond_at(query, Local::now().naive_local()).await
    }

    /// [`respond`](Self::respond) with an explicit "now", for reminder math.
    pub async fn respond_at(&self, query: &str, now: NaiveDateTime) -> Result<String, AppError> {
        match route(query) {
            Route::Reminder { minutes } => self.add_reminder(query, now, minutes).await,
            Route::Model => Ok(self.ask_model(query).await),
        }
    }

    async fn add_reminder(
        &self,
        query: &str,
        now: NaiveDateTime,
        minutes: u32,
    ) -> Result<String, AppError> {
        let Some(at) = remind_time(now, minutes) else {
            warn!(minutes, "reminder offset out of range");
            return Ok(FAILURE_FALLBACK.to_string());
        };

        let user_id = self.user_id;
        let message = query.to_string();
        let stored_at = at.clone();
        let id = store::run_blocking(&self.store, move |db| {
            db.add_reminder(user_id, &message, &stored_at)
        })
        .await?;

        info!(reminder_id = id, user_id, remind_time = %at, "reminder set");
        Ok(REMINDER_ACK.to_string())
    }

    async fn ask_model(&self, query: &str) -> String {
        debug!(provider = self.provider.name(), "relaying query to model");
        match self.provider.complete(query).await {
            Ok(text) => text,
            Err(ProviderError::Timeout(secs)) => {
                warn!(timeout_secs = secs, "model request timed out");
                TIMEOUT_FALLBACK.to_string()
            }
            Err(e) => {
                warn!(error = %e, "model request failed");
                FAILURE_FALLBACK.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2030, 12, 31).unwrap().and_hms_opt(h, m, s).unwrap()
    }

    #[test]
    fn routes_on_literal_trigger() {
        assert_eq!(route("please remind me in 5 minutes"), Route::Reminder { minutes: 5 });
        assert_eq!(route("what is rust?"), Route::Model);
        // Literal, case-sensitive substring.
        assert_eq!(route("Remind me in 5 minutes"), Route::Model);
    }

    #[test]
    fn missing_number_defaults_to_one_minute() {
        assert_eq!(route("remind me to call mum"), Route::Reminder { minutes: 1 });
    }

    #[test]
    fn first_number_wins() {
        assert_eq!(route("remind me in 10 minutes, not 20"), Route::Reminder { minutes: 10 });
        assert_eq!(route("remind me in 15min"), Route::Reminder { minutes: 15 });
    }

    #[test]
    fn oversized_number_falls_back_to_default() {
        assert_eq!(route("remind me in 99999999999 minutes"), Route::Reminder { minutes: 1 });
    }

    #[test]
    fn first_number_takes_leading_digit_run() {
        assert_eq!(first_number("at 07:30"), Some(7));
        assert_eq!(first_number("no digits here"), None);
        assert_eq!(first_number("in 4294967296 minutes"), None);
        assert_eq!(first_number("in 4294967295 minutes"), Some(u32::MAX));
    }

    #[test]
    fn remind_time_drops_seconds() {
        assert_eq!(remind_time(at(9, 0, 59), 5).as_deref(), Some("2030-12-31 09:05"));
    }

    #[test]
    fn remind_time_rolls_over_midnight() {
        assert_eq!(remind_time(at(23, 58, 0), 3).as_deref(), Some("2031-01-01 00:01"));
    }

    #[tokio::test]
    async fn dummy_provider_reply_is_relayed() {
        let store = Arc::new(Database::open_in_memory().unwrap());
        let relay = ResponseRelay::new(
            store,
            LlmProvider::Dummy(crate::llm::providers::dummy::DummyProvider),
            1,
        );
        assert_eq!(relay.respond("hello").await.unwrap(), "[echo] hello");
    }
}
