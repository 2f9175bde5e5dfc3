//! Chat with vendor language models
//!
//! - `adapters`: request building and transports
//! - `reply`: record extraction and stream assembly
//! - `history`: per-session history windows
//! - `chat`: Qwen chat orchestration

pub mod adapters;
pub mod chat;
pub mod history;
pub mod reply;

pub use adapters::{AdapterError, ChatMessage, QwenAdapter, RequestOptions, Role};
pub use chat::{ChatError, ChatOptions, ChatReply, QwenChat, POLISH_PREFIX};
pub use history::{HistoryEntry, HistoryWindow, WindowLimits};
pub use reply::{ChatRecord, RecordHandle, StreamError, StreamReply, UsageCounters, WebCitation};
