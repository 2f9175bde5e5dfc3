//! Chat records
//!
//! One conversation turn plus the vendor-reported extras (usage, citations,
//! reasoning text).

use crate::llm::adapters::Role;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

/// Current time in milliseconds since the Unix epoch
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

/// Character count (not bytes)
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Token usage reported by the vendor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounters {
    pub input: u64,
    pub output: u64,
    pub total: u64,
    /// Reasoning tokens, only reported by thinking models
    pub output_think: Option<u64>,
}

/// One web search citation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebCitation {
    pub site: Option<String>,
    pub icon: Option<String>,
    pub index: i64,
    pub url: String,
    pub title: String,
}

/// One conversation turn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRecord {
    /// Milliseconds since the Unix epoch
    pub time: i64,
    pub role: Role,
    pub name: Option<String>,
    /// `None` only while a streamed reply is still being assembled
    pub content: Option<String>,
    /// Character count of `content`
    pub len: usize,
    pub usage: Option<UsageCounters>,
    pub web: Option<Vec<WebCitation>>,
    pub think: Option<String>,
}

impl ChatRecord {
    /// Record stamped now with the given role and content
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            time: now_millis(),
            role,
            name: None,
            len: char_len(&content),
            content: Some(content),
            usage: None,
            web: None,
            think: None,
        }
    }

    /// User turn stamped now
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Assistant turn stamped now
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn with_time(mut self, time: i64) -> Self {
        self.time = time;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Content or the empty string
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }
}

/// Shared, mutable reference to a record
///
/// A streamed reply is written by its cursors while the same record already
/// sits in the session history; both sides hold a clone of this handle.
#[derive(Debug, Clone)]
pub struct RecordHandle(Arc<Mutex<ChatRecord>>);

impl RecordHandle {
    pub fn new(record: ChatRecord) -> Self {
        Self(Arc::new(Mutex::new(record)))
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, ChatRecord> {
        self.0.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of the record as it is right now
    pub fn snapshot(&self) -> ChatRecord {
        self.lock().clone()
    }

    /// Mutate the record in place
    pub fn update<R>(&self, f: impl FnOnce(&mut ChatRecord) -> R) -> R {
        f(&mut self.lock())
    }

    pub fn time(&self) -> i64 {
        self.lock().time
    }

    pub fn len(&self) -> usize {
        self.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<ChatRecord> for RecordHandle {
    fn from(record: ChatRecord) -> Self {
        Self::new(record)
    }
}
