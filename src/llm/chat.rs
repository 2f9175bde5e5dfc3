//! Qwen chat
//!
//! Orchestrates one chat turn:
//! - replay window from the session history (trimmed on read)
//! - system description, history and the new user turn go out as messages
//! - the reply is parsed eagerly, or wrapped into cursors when streaming
//! - user and reply records are appended to the session history
//! - the request log row is written once the reply is complete

use crate::llm::adapters::qwen::RequestOptions;
use crate::llm::adapters::{AdapterError, ChatMessage, QwenAdapter, Role};
use crate::llm::history::{HistoryWindow, WindowLimits};
use crate::llm::reply::{
    assemble_stream, extract_record, now_millis, ChatRecord, CompletionHook, RecordHandle,
    StreamError, StreamReply,
};
use crate::request_log::{self, QwenRequestRow, RequestLog};
use std::hash::Hash;
use std::sync::Arc;
use tracing::{debug, warn};

/// Instruction put in front of text to polish
pub const POLISH_PREFIX: &str =
    "润色冒号后的内容（注意！只返回润色后的内容正文，之后会直接整段使用）：";

/// Chat errors
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("Request log error: {0}")]
    RequestLog(#[from] request_log::Error),
}

/// Per-call chat options
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatOptions {
    /// Extra system description, appended to the configured one
    pub system: Option<String>,
    pub web: bool,
    pub web_mark: bool,
    /// Deep thinking; requires `stream`
    pub think: bool,
    pub stream: bool,
    /// Overrides for the history window bounds
    pub limits: WindowLimits,
}

/// Reply of one chat turn
#[derive(Debug)]
pub enum ChatReply {
    Complete(ChatRecord),
    Stream(StreamReply),
}

impl ChatReply {
    /// Drain any cursors and return the final record
    pub fn into_record(self) -> Result<ChatRecord, StreamError> {
        match self {
            ChatReply::Complete(record) => Ok(record),
            ChatReply::Stream(reply) => {
                for fragment in reply.think {
                    fragment?;
                }
                for fragment in reply.text {
                    fragment?;
                }
                Ok(reply.record.snapshot())
            }
        }
    }
}

/// Qwen chat client with per-session history
#[derive(Debug)]
pub struct QwenChat<K = String> {
    adapter: QwenAdapter,
    system: Option<String>,
    history: HistoryWindow<K>,
    request_log: Option<Arc<RequestLog>>,
}

impl<K: Eq + Hash + Clone> QwenChat<K> {
    pub fn new(adapter: QwenAdapter) -> Self {
        Self {
            adapter,
            system: None,
            history: HistoryWindow::new(WindowLimits::default()),
            request_log: None,
        }
    }

    /// Set the system description sent with every request
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Set default history window bounds
    pub fn with_history_limits(mut self, limits: WindowLimits) -> Self {
        self.history = HistoryWindow::new(limits);
        self
    }

    /// Record every completed request
    pub fn with_request_log(mut self, log: Arc<RequestLog>) -> Self {
        self.request_log = Some(log);
        self
    }

    pub fn adapter(&self) -> &QwenAdapter {
        &self.adapter
    }

    pub fn history(&self) -> &HistoryWindow<K> {
        &self.history
    }

    fn system_text(&self, extra: Option<&str>) -> Option<String> {
        match (self.system.as_deref(), extra) {
            (Some(base), Some(extra)) => Some(format!("{}{}", base, extra)),
            (Some(base), None) => Some(base.to_string()),
            (None, Some(extra)) => Some(extra.to_string()),
            (None, None) => None,
        }
    }

    /// Chat with the model
    ///
    /// With `index` the turn is recorded in that session's history and the
    /// history window is replayed as context.
    pub fn chat(
        &self,
        text: &str,
        index: Option<&K>,
        options: &ChatOptions,
    ) -> Result<ChatReply, ChatError> {
        if text.is_empty() {
            return Err(ChatError::InvalidInput("text must not be empty".to_string()));
        }
        if options.think && !options.stream {
            return Err(ChatError::InvalidInput(
                "think requires stream".to_string(),
            ));
        }

        let history = match index {
            Some(index) => self.history.window(index, options.limits, true),
            None => Vec::new(),
        };

        let mut messages = Vec::with_capacity(history.len() + 2);
        if let Some(system) = self.system_text(options.system.as_deref()) {
            messages.push(ChatMessage::new(Role::System, system));
        }
        messages.extend(
            history
                .iter()
                .map(|record| ChatMessage::new(record.role, record.text())),
        );
        messages.push(ChatMessage::user(text));
        let user_record = ChatRecord::user(text);

        let request_options = RequestOptions {
            web: options.web,
            web_mark: options.web_mark,
            think: options.think,
            stream: options.stream,
        };
        debug!(
            history = history.len(),
            stream = options.stream,
            think = options.think,
            "qwen chat"
        );

        let request_time = now_millis();
        if options.stream {
            let lines = self.adapter.request_stream(&messages, request_options)?;
            let row = QwenRequestRow::pending(
                request_time,
                now_millis(),
                messages,
                self.adapter.model(),
            );
            let reply = assemble_stream(lines, self.completion_hook(row))?;
            if let Some(index) = index {
                self.history
                    .push_handles(index, [RecordHandle::new(user_record), reply.record.clone()]);
            }
            return Ok(ChatReply::Stream(reply));
        }

        let response = self.adapter.request(&messages, request_options)?;
        let response_time = now_millis();
        let record = extract_record(&response);

        if let Some(log) = &self.request_log {
            let row = QwenRequestRow::pending(
                request_time,
                response_time,
                messages,
                self.adapter.model(),
            )
            .complete(&record);
            log.insert_qwen_request(&row)?;
        }
        if let Some(index) = index {
            self.history.push_handles(
                index,
                [RecordHandle::new(user_record), RecordHandle::new(record.clone())],
            );
        }
        Ok(ChatReply::Complete(record))
    }

    fn completion_hook(&self, row: QwenRequestRow) -> Option<CompletionHook> {
        let log = Arc::clone(self.request_log.as_ref()?);
        Some(Box::new(move |record: &ChatRecord| {
            if let Err(err) = log.insert_qwen_request(&row.complete(record)) {
                warn!(error = %err, "failed to record streamed qwen request");
            }
        }))
    }

    /// Polish text, returning only the polished body
    pub fn polish(&self, text: &str) -> Result<String, ChatError> {
        let prompt = format!("{}{}", POLISH_PREFIX, text);
        let record = self
            .chat(&prompt, None, &ChatOptions::default())?
            .into_record()?;
        Ok(record.text().trim().to_string())
    }
}
