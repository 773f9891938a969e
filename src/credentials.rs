// 🔐 Credential Store - registration and login over a UserStorage backend
// Passwords are stored and compared as given (no hashing).

use crate::db::Event;
use anyhow::Result;
use tracing::{info, warn};

pub const USER_REGISTERED: &str = "user_registered";
pub const LOGIN_SUCCEEDED: &str = "login_succeeded";
pub const LOGIN_FAILED: &str = "login_failed";
pub const PREDICTION: &str = "prediction";

/// Persistent user table.
///
/// `insert_if_absent` must be atomic at the storage boundary: of two
/// concurrent calls for the same username at most one returns `true`.
pub trait UserStorage: Send + Sync {
    fn insert_if_absent(&self, username: &str, password: &str) -> Result<bool>;

    fn find(&self, username: &str) -> Result<Option<String>>;

    fn list(&self) -> Result<Vec<String>>;

    /// Append to the audit trail. Backends without one drop the event.
    fn record_event(&self, _event: &Event) -> Result<()> {
        Ok(())
    }

    fn events_for(&self, _username: &str) -> Result<Vec<Event>> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    Registered,
    AlreadyExists,
}

pub struct CredentialStore<S: UserStorage> {
    storage: S,
}

impl<S: UserStorage> CredentialStore<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn register(&self, username: &str, password: &str) -> Result<RegisterOutcome> {
        if !self.storage.insert_if_absent(username, password)? {
            info!(username, "Registration rejected: username taken");
            return Ok(RegisterOutcome::AlreadyExists);
        }

        info!(username, "Registered user");
        self.record(Event::new(
            USER_REGISTERED,
            "user",
            username,
            serde_json::json!({}),
            username,
        ));
        Ok(RegisterOutcome::Registered)
    }

    /// True iff `username` exists and `password` matches exactly. Empty
    /// fields never match.
    pub fn login(&self, username: &str, password: &str) -> Result<bool> {
        if username.is_empty() || password.is_empty() {
            return Ok(false);
        }

        let ok = self.storage.find(username)?.as_deref() == Some(password);

        if ok {
            info!(username, "Login succeeded");
            self.record(Event::new(LOGIN_SUCCEEDED, "user", username, serde_json::json!({}), username));
        } else {
            warn!(username, "Login failed");
            self.record(Event::new(LOGIN_FAILED, "user", username, serde_json::json!({}), username));
        }

        Ok(ok)
    }

    pub fn list_users(&self) -> Result<Vec<String>> {
        self.storage.list()
    }

    /// Record a rendered verdict against the user who asked for it.
    pub fn record_prediction(&self, username: &str, verdict: &str) {
        self.record(Event::new(
            PREDICTION,
            "user",
            username,
            serde_json::json!({ "verdict": verdict }),
            username,
        ));
    }

    pub fn history(&self, username: &str) -> Result<Vec<Event>> {
        self.storage.events_for(username)
    }

    // Audit failures are logged, never surfaced to the caller.
    fn record(&self, event: Event) {
        if let Err(e) = self.storage.record_event(&event) {
            warn!(error = %e, event_type = %event.event_type, "Failed to record audit event");
        }
    }
}
