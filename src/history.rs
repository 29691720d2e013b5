use crate::session::Session;
use serde_json::Value;
use std::collections::VecDeque;

pub const DEFAULT_CAPACITY: usize = 400;

/// Finalized sessions, oldest first, bounded to `capacity` entries
#[derive(Debug, Clone, PartialEq)]
pub struct SessionHistory {
    sessions: VecDeque<Session>,
    capacity: usize,
}

impl Default for SessionHistory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl SessionHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            sessions: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY)),
            capacity,
        }
    }

    /// Rebuilds from a persisted log. Entries that do not parse are skipped
    /// and only the newest `capacity` entries are kept.
    pub fn from_value(value: &Value, capacity: usize) -> Self {
        let mut history = Self::with_capacity(capacity);
        let Some(items) = value.as_array() else {
            if !value.is_null() {
                tracing::warn!("stored session log is not an array, starting empty");
            }
            return history;
        };

        let mut skipped = 0;
        for item in items {
            match serde_json::from_value::<Session>(item.clone()) {
                Ok(session) => history.push(session),
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::warn!(skipped, "dropped unreadable sessions from the stored log");
        }
        history
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(&self.sessions).unwrap_or_else(|_| Value::Array(Vec::new()))
    }

    /// Appends, evicting the oldest entry first when full
    pub fn push(&mut self, session: Session) {
        if self.sessions.len() >= self.capacity {
            if let Some(evicted) = self.sessions.pop_front() {
                tracing::debug!(session = %evicted.session_id, "history full, evicted oldest session");
            }
        }
        self.sessions.push_back(session);
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    pub fn clear(&mut self) {
        self.sessions.clear();
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &Session> {
        self.sessions.iter()
    }

    pub fn latest(&self) -> Option<&Session> {
        self.sessions.back()
    }

    pub fn get(&self, session_id: &str) -> Option<&Session> {
        self.sessions.iter().find(|s| s.session_id == session_id)
    }
}
