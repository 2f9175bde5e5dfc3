//! Vendor adapters
//!
//! Request building and error normalization for vendor chat HTTP APIs,
//! over a pluggable synchronous transport.

pub mod factory;
pub mod qwen;
pub mod transport;
pub mod transport_fake;
pub mod transport_types;
pub mod transport_ureq;

use serde::{Deserialize, Serialize};

// Re-export common types
pub use factory::{create_qwen_adapter, resolve_env_var};
pub use qwen::{QwenAdapter, RequestOptions};
pub use transport::{AdapterError, SyncTransport, Transport};

/// Message role (universal subset across providers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System message (sets behavior/context)
    System,
    /// User message (human input)
    User,
    /// Assistant message (model response)
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Single outgoing message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_serializes_role_lowercase() {
        let json = serde_json::to_value(ChatMessage::system("be brief")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "system", "content": "be brief"}));
    }
}
