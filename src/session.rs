//! Session gate: register and log in against the credential store.
//!
//! Lookups are exact: no trimming, no case folding, no hashing.

use std::sync::Arc;

use tracing::{debug, info};

use crate::error::AppError;
use crate::store::{self, Database, RegisterOutcome};

/// A logged-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub user_id: i64,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    Created(i64),
    AlreadyExists,
    /// Username or password was empty; the store was not touched.
    MissingFields,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Login {
    LoggedIn(Session),
    Invalid,
}

#[derive(Clone)]
pub struct SessionGate {
    store: Arc<Database>,
}

impl SessionGate {
    pub fn new(store: Arc<Database>) -> Self {
        Self { store }
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<Registration, AppError> {
        if username.is_empty() || password.is_empty() {
            return Ok(Registration::MissingFields);
        }

        let (u, p) = (username.to_string(), password.to_string());
        let outcome = store::run_blocking(&self.store, move |db| db.register(&u, &p)).await?;
        Ok(match outcome {
            RegisterOutcome::Created(id) => {
                info!(user_id = id, %username, "user registered");
                Registration::Created(id)
            }
            RegisterOutcome::AlreadyExists => {
                debug!(%username, "registration rejected: username taken");
                Registration::AlreadyExists
            }
        })
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<Login, AppError> {
        let (u, p) = (username.to_string(), password.to_string());
        let found = store::run_blocking(&self.store, move |db| db.login(&u, &p)).await?;
        Ok(match found {
            Some(user_id) => {
                info!(user_id, %username, "login succeeded");
                Login::LoggedIn(Session { user_id, username: username.to_string() })
            }
            None => {
                debug!(%username, "login failed");
                Login::Invalid
            }
        })
    }
}
