//! ERNIE chat
//!
//! Baidu `completions_pro` chat with a configurable system character and a
//! per-session history window.

use crate::baidu::auth::BaiduClient;
use crate::baidu::BaiduError;
use crate::llm::adapters::{AdapterError, ChatMessage};
use crate::llm::history::{HistoryWindow, WindowLimits};
use crate::llm::reply::{char_len, ChatRecord, RecordHandle};
use rand::seq::SliceRandom;
use serde_json::{json, Value as JsonValue};
use std::hash::Hash;
use tracing::warn;

/// ERNIE chat endpoint
pub const ERNIE_URL: &str =
    "https://aip.baidubce.com/rpc/2.0/ai_custom/v1/wenxinworkshop/chat/completions_pro";

/// Vendor error code for "system role not supported"
pub const SYSTEM_UNSUPPORTED: i64 = 336104;

/// Default history window: 30 minutes, 400 characters
pub const DEFAULT_LIMITS: WindowLimits = WindowLimits {
    max_char: Some(400),
    max_time: Some(1800.0),
};

/// Tones picked from by [`ErnieChat::modify`]
pub const CHARACTERS: &[&str] = &[
    "善良", "淳厚", "淳朴", "豁达", "开朗", "体贴", "活跃", "慈祥", "仁慈", "温和",
    "温存", "和蔼", "和气", "直爽", "耿直", "憨直", "敦厚", "正直", "爽直", "率直",
    "刚直", "正派", "刚正", "纯正", "廉政", "清廉", "自信", "信心", "新年", "相信",
    "老实", "谦恭", "谦虚", "谦逊", "自谦", "谦和", "坚强", "顽强", "建议", "刚毅",
    "刚强", "倔强", "强悍", "减震", "坚定", "坚韧", "坚决", "坚忍", "勇敢", "勇猛",
    "勤劳", "勤恳", "勤奋", "勤勉", "勤快", "勤俭", "辛勤", "刻苦", "节约", "狂妄",
    "骄横", "骄纵", "窘态", "窘迫", "困窘", "难堪", "害羞", "羞涩", "赧然", "无语",
    "羞赧",
];

/// System character for one call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Character {
    /// The client's configured character
    #[default]
    Default,
    Custom(String),
    /// Send no system field
    Disabled,
}

/// ERNIE chat client
#[derive(Debug)]
pub struct ErnieChat<K = String> {
    client: BaiduClient,
    character: Option<String>,
    history: HistoryWindow<K>,
}

fn is_system_unsupported(err: &AdapterError) -> bool {
    err.vendor_payload()
        .and_then(|payload| payload.get("error_code"))
        .and_then(JsonValue::as_i64)
        == Some(SYSTEM_UNSUPPORTED)
}

impl<K: Eq + Hash + Clone> ErnieChat<K> {
    pub fn new(client: BaiduClient) -> Self {
        Self {
            client,
            character: None,
            history: HistoryWindow::new(DEFAULT_LIMITS),
        }
    }

    pub fn with_character(mut self, character: impl Into<String>) -> Self {
        self.character = Some(character.into());
        self
    }

    /// Configured system character
    pub fn character(&self) -> Option<&str> {
        self.character.as_deref()
    }

    pub fn with_history_limits(mut self, limits: WindowLimits) -> Self {
        self.history = HistoryWindow::new(limits.or(DEFAULT_LIMITS));
        self
    }

    pub fn client(&self) -> &BaiduClient {
        &self.client
    }

    pub fn history(&self) -> &HistoryWindow<K> {
        &self.history
    }

    fn resolve_character(&self, character: &Character) -> Option<String> {
        match character {
            Character::Default => self.character.clone(),
            Character::Custom(text) => Some(text.clone()),
            Character::Disabled => None,
        }
    }

    /// History messages for `index`; the character counts against the char limit
    fn history_messages(&self, index: &K, system: Option<&str>) -> Vec<ChatMessage> {
        let mut limits = self.history.defaults();
        if let (Some(max_char), Some(system)) = (limits.max_char, system) {
            limits.max_char = Some(max_char.saturating_sub(char_len(system)));
        }
        self.history
            .window(index, limits, false)
            .iter()
            .map(|record| ChatMessage::new(record.role, record.text()))
            .collect()
    }

    fn send(&self, messages: &[ChatMessage], system: Option<&str>) -> Result<String, AdapterError> {
        let mut body = json!({ "messages": messages });
        if let Some(system) = system {
            body["system"] = json!(system);
        }
        let response = self.client.post_json(ERNIE_URL, &body)?;
        response
            .get("result")
            .and_then(JsonValue::as_str)
            .map(str::to_string)
            .ok_or_else(|| AdapterError::InvalidResponse("missing result".to_string()))
    }

    /// Chat with ERNIE
    ///
    /// A "system role unsupported" error is retried once without the
    /// character.
    pub fn chat(
        &self,
        text: &str,
        character: Character,
        index: Option<&K>,
    ) -> Result<String, BaiduError> {
        if text.is_empty() {
            return Err(BaiduError::InvalidInput("text must not be empty".to_string()));
        }
        let mut system = self.resolve_character(&character);

        let mut messages = match index {
            Some(index) => self.history_messages(index, system.as_deref()),
            None => Vec::new(),
        };
        messages.push(ChatMessage::user(text));

        let result = match self.send(&messages, system.as_deref()) {
            Err(err) if system.is_some() && is_system_unsupported(&err) => {
                warn!("ernie rejected the system character, retrying without it");
                system = None;
                self.send(&messages, None)?
            }
            other => other?,
        };

        self.client
            .record_call(json!({ "messages": messages, "character": system }));
        if let Some(index) = index {
            self.history.push_handles(
                index,
                [
                    RecordHandle::new(ChatRecord::user(text)),
                    RecordHandle::new(ChatRecord::assistant(result.as_str())),
                ],
            );
        }
        Ok(result)
    }

    /// Rewrite text in a randomly picked tone
    pub fn modify(&self, text: &str) -> Result<String, BaiduError> {
        let tone = CHARACTERS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or("温和");
        let prompt = format!("用{}的语气，润色以下这句话\n{}", tone, text);
        self.chat(&prompt, Character::Default, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::baidu::auth::tests::{fake_client, token_reply};
    use crate::llm::adapters::transport::FakeReply;

    fn result(text: &str) -> FakeReply {
        FakeReply::Json(json!({"id": "as-1", "result": text}))
    }

    fn bodies(chat: &ErnieChat<String>) -> Vec<JsonValue> {
        chat.client()
            .transport()
            .as_fake()
            .unwrap()
            .requests()
            .iter()
            .filter(|request| request.url == ERNIE_URL)
            .map(|request| request.json_body().unwrap())
            .collect()
    }

    #[test]
    fn test_chat_sends_character_and_token() {
        let chat: ErnieChat<String> =
            ErnieChat::new(fake_client(vec![token_reply(), result("你好")])).with_character("老师");
        assert_eq!(chat.chat("hi", Character::Default, None).unwrap(), "你好");

        let requests = chat.client().transport().as_fake().unwrap().requests();
        assert_eq!(requests[1].query_value("access_token"), Some("tok-1"));
        let body = &bodies(&chat)[0];
        assert_eq!(body["system"], "老师");
        assert_eq!(body["messages"][0]["content"], "hi");
    }

    #[test]
    fn test_system_unsupported_retried_once_without_system() {
        let chat: ErnieChat<String> = ErnieChat::new(fake_client(vec![
            token_reply(),
            FakeReply::Json(json!({"error_code": 336104, "error_msg": "system unsupported"})),
            result("ok"),
        ]))
        .with_character("老师");
        assert_eq!(chat.chat("hi", Character::Default, None).unwrap(), "ok");

        let bodies = bodies(&chat);
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[0]["system"], "老师");
        assert!(bodies[1].get("system").is_none());
    }

    #[test]
    fn test_other_vendor_errors_not_retried() {
        let chat: ErnieChat<String> = ErnieChat::new(fake_client(vec![
            token_reply(),
            FakeReply::Json(json!({"error_code": 336003, "error_msg": "bad"})),
            result("never"),
        ]))
        .with_character("老师");
        assert!(chat.chat("hi", Character::Default, None).is_err());
        assert_eq!(bodies(&chat).len(), 1);
    }

    #[test]
    fn test_no_retry_without_character() {
        let chat: ErnieChat<String> = ErnieChat::new(fake_client(vec![
            token_reply(),
            FakeReply::Json(json!({"error_code": 336104})),
            result("never"),
        ]));
        assert!(chat.chat("hi", Character::Default, None).is_err());
        assert_eq!(bodies(&chat).len(), 1);
    }

    #[test]
    fn test_history_replayed_with_character_budget() {
        let chat: ErnieChat<String> = ErnieChat::new(fake_client(vec![
            token_reply(),
            result("0123456789"),
            result("second"),
        ]))
        .with_character("abcde")
        .with_history_limits(WindowLimits::new(Some(20), None));
        let index = "u1".to_string();
        chat.chat("first", Character::Default, Some(&index)).unwrap();
        chat.chat("next", Character::Default, Some(&index)).unwrap();

        // budget 20 - 5 = 15: "0123456789" (10) fits, adding "first" (5) fits exactly
        let body = &bodies(&chat)[1];
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0]["content"], "first");
        assert_eq!(messages[1]["role"], "assistant");
        assert_eq!(chat.history().len(&index), 4);
    }

    #[test]
    fn test_modify_prompt() {
        let chat: ErnieChat<String> =
            ErnieChat::new(fake_client(vec![token_reply(), result("改好了")]));
        assert_eq!(chat.modify("原句").unwrap(), "改好了");
        let prompt = bodies(&chat)[0]["messages"][0]["content"]
            .as_str()
            .unwrap()
            .to_string();
        assert!(prompt.starts_with('用'));
        assert!(prompt.ends_with("的语气，润色以下这句话\n原句"));
    }
}
