//! Baidu AI services
//!
//! - `auth`: OAuth token cache and shared request plumbing
//! - `chat`: ERNIE chat
//! - `translate`: Fanyi translation (signed requests)
//! - `image`: text-to-image jobs
//! - `voice`: text-to-voice jobs and direct synthesis
//! - `poll`: polling loop for async jobs

pub mod auth;
pub mod chat;
pub mod image;
pub mod poll;
pub mod translate;
pub mod voice;

use crate::llm::adapters::AdapterError;
use crate::request_log;

pub use auth::BaiduClient;
pub use chat::{Character, ErnieChat};
pub use image::ImageGenerator;
pub use poll::{poll_until, JobError, PollPolicy, PollStatus};
pub use translate::{Lang, SourceLang, Translator};
pub use voice::{VoiceParams, VoiceSynthesizer};

/// Baidu client errors
#[derive(Debug, thiserror::Error)]
pub enum BaiduError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Adapter(#[from] AdapterError),

    #[error(transparent)]
    Job(#[from] JobError),

    #[error("Request log error: {0}")]
    RequestLog(#[from] request_log::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
