//! vendorchat: synchronous clients for Qwen and Baidu AI services
//!
//! The Qwen side assembles streamed replies into records with separate
//! text and thinking cursors and keeps a bounded per-session history.
//! The Baidu side covers ERNIE chat, translation, image and voice jobs.
//! Every exchange can be written to a SQLite request log.

pub mod baidu;
pub mod cli;
pub mod config;
pub mod llm;
pub mod request_log;

pub use baidu::{BaiduClient, BaiduError, ErnieChat, ImageGenerator, Translator, VoiceSynthesizer};
pub use config::{Config, ConfigError};
pub use llm::{ChatError, ChatOptions, ChatReply, ChatRecord, HistoryWindow, QwenChat, StreamReply};
pub use request_log::RequestLog;
