use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::observability;

use super::fields::ExtractedFields;

struct Session {
    fields: ExtractedFields,
    touched: Instant,
}

/// Partially filled bookings, per sender, for multi-turn slot filling.
pub struct SessionStore {
    ttl: Duration,
    sessions: DashMap<String, Session>,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: DashMap::new(),
        }
    }

    /// `fresh` merged over what this sender told us before, if that has not
    /// expired.
    pub fn merged(&self, sender: &str, fresh: ExtractedFields) -> ExtractedFields {
        match self.sessions.get(sender) {
            Some(s) if s.touched.elapsed() < self.ttl => s.fields.clone().merge(fresh),
            _ => fresh,
        }
    }

    pub fn remember(&self, sender: &str, fields: ExtractedFields) {
        self.sessions.insert(
            sender.to_string(),
            Session {
                fields,
                touched: Instant::now(),
            },
        );
    }

    pub fn forget(&self, sender: &str) {
        self.sessions.remove(sender);
    }

    /// Drop expired sessions. Returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| s.touched.elapsed() < self.ttl);
        let live = self.sessions.len();
        metrics::gauge!(observability::SESSIONS_ACTIVE).set(live as f64);
        before.saturating_sub(live)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
