//! Per-session chat history
//!
//! Records are kept per caller-supplied session key in time order. The
//! replay window walks from the newest record backward and stops at the first
//! record that pushes the running character count over the limit or is older
//! than the age limit; that record and everything before it fall outside.

use crate::llm::adapters::Role;
use crate::llm::reply::record::{char_len, now_millis, ChatRecord, RecordHandle};
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard};

/// Optional bounds on the replay window
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowLimits {
    /// Maximum summed character count
    pub max_char: Option<usize>,
    /// Maximum record age in seconds
    pub max_time: Option<f64>,
}

impl WindowLimits {
    pub fn new(max_char: Option<usize>, max_time: Option<f64>) -> Self {
        Self { max_char, max_time }
    }

    /// Fill unset bounds from `defaults`
    pub fn or(self, defaults: WindowLimits) -> Self {
        Self {
            max_char: self.max_char.or(defaults.max_char),
            max_time: self.max_time.or(defaults.max_time),
        }
    }
}

/// A record to append; time defaults to now and role to user
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub time: Option<i64>,
    pub role: Option<Role>,
    pub content: String,
}

impl HistoryEntry {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            time: None,
            role: None,
            content: content.into(),
        }
    }

    pub fn at(mut self, time: i64) -> Self {
        self.time = Some(time);
        self
    }

    pub fn role(mut self, role: Role) -> Self {
        self.role = Some(role);
        self
    }

    fn into_record(self, now: i64) -> ChatRecord {
        ChatRecord {
            time: self.time.unwrap_or(now),
            role: self.role.unwrap_or(Role::User),
            name: None,
            len: char_len(&self.content),
            content: Some(self.content),
            usage: None,
            web: None,
            think: None,
        }
    }
}

impl From<&str> for HistoryEntry {
    fn from(content: &str) -> Self {
        Self::new(content)
    }
}

impl From<String> for HistoryEntry {
    fn from(content: String) -> Self {
        Self::new(content)
    }
}

/// Chat histories keyed by session
#[derive(Debug)]
pub struct HistoryWindow<K> {
    sessions: Mutex<HashMap<K, Vec<RecordHandle>>>,
    defaults: WindowLimits,
}

impl<K> Default for HistoryWindow<K> {
    fn default() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            defaults: WindowLimits::default(),
        }
    }
}

impl<K: Eq + Hash + Clone> HistoryWindow<K> {
    pub fn new(defaults: WindowLimits) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            defaults,
        }
    }

    pub fn defaults(&self) -> WindowLimits {
        self.defaults
    }

    fn sessions(&self) -> MutexGuard<'_, HashMap<K, Vec<RecordHandle>>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Append records, restore time order, then delete what falls outside the window
    pub fn append<E: Into<HistoryEntry>>(
        &self,
        index: &K,
        entries: impl IntoIterator<Item = E>,
        limits: WindowLimits,
    ) {
        let now = now_millis();
        {
            let mut sessions = self.sessions();
            let history = sessions.entry(index.clone()).or_default();
            history.extend(
                entries
                    .into_iter()
                    .map(|entry| RecordHandle::new(entry.into().into_record(now))),
            );
            history.sort_by_key(RecordHandle::time);
        }
        self.window_at(index, limits, true, now);
    }

    /// Append already-shared records as they are
    pub fn push_handles(&self, index: &K, handles: impl IntoIterator<Item = RecordHandle>) {
        self.sessions()
            .entry(index.clone())
            .or_default()
            .extend(handles);
    }

    /// Records inside the window as of now
    pub fn window(&self, index: &K, limits: WindowLimits, delete: bool) -> Vec<ChatRecord> {
        self.window_at(index, limits, delete, now_millis())
    }

    /// Records inside the window as of `now` (ms)
    ///
    /// With `delete` the records outside are dropped from storage; otherwise
    /// they are only left out of the result.
    pub fn window_at(
        &self,
        index: &K,
        limits: WindowLimits,
        delete: bool,
        now: i64,
    ) -> Vec<ChatRecord> {
        let limits = limits.or(self.defaults);
        let mut sessions = self.sessions();
        let Some(history) = sessions.get_mut(index) else {
            return Vec::new();
        };

        let start = cut_point(history, limits, now);
        if delete && start > 0 {
            history.drain(..start);
            history.iter().map(RecordHandle::snapshot).collect()
        } else {
            history[start..].iter().map(RecordHandle::snapshot).collect()
        }
    }

    /// Every stored record of a session
    pub fn records(&self, index: &K) -> Vec<ChatRecord> {
        self.sessions()
            .get(index)
            .map(|history| history.iter().map(RecordHandle::snapshot).collect())
            .unwrap_or_default()
    }

    pub fn len(&self, index: &K) -> usize {
        self.sessions().get(index).map(Vec::len).unwrap_or(0)
    }

    pub fn is_empty(&self, index: &K) -> bool {
        self.len(index) == 0
    }
}

/// Index of the oldest record still inside the window
fn cut_point(history: &[RecordHandle], limits: WindowLimits, now: i64) -> usize {
    let mut chars = 0usize;
    for (i, handle) in history.iter().enumerate().rev() {
        let (time, len) = {
            let record = handle.lock();
            (record.time, record.len)
        };
        chars += len;
        let over_char = limits.max_char.is_some_and(|max| chars > max);
        let over_time = limits
            .max_time
            .is_some_and(|max| (now - time) as f64 > max * 1000.0);
        if over_char || over_time {
            return i + 1;
        }
    }
    0
}
