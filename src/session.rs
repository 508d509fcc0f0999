//! Writing sessions and their history
use crate::{KeyValueStore, load_json, save_json};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    time::{SystemTime, UNIX_EPOCH},
};

/// Key of the finished sessions, newest first
pub const SESSIONS_KEY: &str = "ram_write_sessions_v1";
/// Key of the session in progress, restored on the next start
pub const CURRENT_SESSION_KEY: &str = "ram_current_session";

/// One continuous period of writing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    /// Milliseconds since unix epoch
    pub start_time: u64,
    pub end_time: Option<u64>,
    pub count: u64,
}

/// Session bookkeeping used by the write controller
pub trait SessionStore {
    /// Begin a new session, replacing the current one
    fn start_session(&mut self);
    /// Count one write, starting a session if there is none
    fn increment_count(&mut self);
    /// Move the current session into history, empty sessions are dropped
    fn end_session(&mut self);
    fn current(&self) -> Option<&Session>;
    /// Finished sessions, newest first
    fn sessions(&self) -> Vec<Session>;
    fn clear_history(&mut self);
}

/// Source of wall clock time in milliseconds since unix epoch
pub type Clock = Box<dyn Fn() -> u64>;

fn system_clock() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis() as u64)
}

/// Session store persisted in a key-value store
pub struct KvSessionStore {
    store: Box<dyn KeyValueStore>,
    current: Option<Session>,
    clock: Clock,
    // disambiguates sessions started within the same millisecond
    serial: u64,
}

impl fmt::Debug for KvSessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KvSessionStore")
            .field("current", &self.current)
            .finish()
    }
}

impl KvSessionStore {
    /// Open store and restore the session in progress if any
    pub fn new(store: Box<dyn KeyValueStore>) -> Self {
        Self::with_clock(store, Box::new(system_clock))
    }

    pub fn with_clock(store: Box<dyn KeyValueStore>, clock: Clock) -> Self {
        let current = load_json::<Option<Session>>(&*store, CURRENT_SESSION_KEY).flatten();
        if let Some(session) = &current {
            tracing::debug!(id = %session.id, count = session.count, "restored ongoing session");
        }
        Self {
            store,
            current,
            clock,
            serial: 0,
        }
    }

    fn persist_current(&mut self) {
        save_json(&mut *self.store, CURRENT_SESSION_KEY, &self.current);
    }
}

impl SessionStore for KvSessionStore {
    fn start_session(&mut self) {
        let now = (self.clock)();
        self.serial += 1;
        self.current = Some(Session {
            id: format!("{}-{}", now, self.serial),
            start_time: now,
            end_time: None,
            count: 0,
        });
        self.persist_current();
    }

    fn increment_count(&mut self) {
        if self.current.is_none() {
            self.start_session();
        }
        if let Some(session) = &mut self.current {
            session.count += 1;
        }
        self.persist_current();
    }

    fn end_session(&mut self) {
        let Some(mut session) = self.current.take() else {
            return;
        };
        self.persist_current();
        if session.count == 0 {
            return;
        }
        session.end_time = Some((self.clock)());
        tracing::debug!(id = %session.id, count = session.count, "session ended");
        let mut sessions = self.sessions();
        sessions.insert(0, session);
        save_json(&mut *self.store, SESSIONS_KEY, &sessions);
    }

    fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    fn sessions(&self) -> Vec<Session> {
        load_json(&*self.store, SESSIONS_KEY).unwrap_or_default()
    }

    fn clear_history(&mut self) {
        save_json(&mut *self.store, SESSIONS_KEY, &Vec::<Session>::new());
    }
}
