//! Reply assembly
//!
//! Uniform [`ChatRecord`]s from full responses and from SSE streams.

pub mod extract;
pub mod record;
pub mod stream;

pub use extract::extract_record;
pub use record::{char_len, now_millis, ChatRecord, RecordHandle, UsageCounters, WebCitation};
pub use stream::{assemble_stream, CompletionHook, StreamError, StreamReply, TextCursor, ThinkCursor};
