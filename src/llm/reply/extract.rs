//! Field extraction from Qwen response JSON
//!
//! Works on both full responses and single SSE event payloads; the shapes are
//! the same.

use crate::llm::adapters::Role;
use crate::llm::reply::record::{char_len, now_millis, ChatRecord, UsageCounters, WebCitation};
use serde_json::Value as JsonValue;

/// JSON payload of an SSE data line, or `None` for keep-alives and comments
pub fn data_payload(line: &str) -> Option<&str> {
    if line.starts_with("data:{") || line.starts_with("data: {") {
        Some(line[5..].trim())
    } else {
        None
    }
}

fn first_message(json: &JsonValue) -> Option<&JsonValue> {
    json.get("output")?.get("choices")?.get(0)?.get("message")
}

fn non_empty(value: Option<&JsonValue>) -> Option<String> {
    value
        .and_then(JsonValue::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Reply text; absent or empty is `None`
pub fn extract_text(json: &JsonValue) -> Option<String> {
    non_empty(first_message(json)?.get("content"))
}

/// Deep-thinking text; absent or empty is `None`
pub fn extract_think(json: &JsonValue) -> Option<String> {
    non_empty(first_message(json)?.get("reasoning_content"))
}

/// Usage counters; `None` unless input, output and total are all reported
pub fn extract_usage(json: &JsonValue) -> Option<UsageCounters> {
    let usage = json.get("usage")?;
    Some(UsageCounters {
        input: usage.get("input_tokens")?.as_u64()?,
        output: usage.get("output_tokens")?.as_u64()?,
        total: usage.get("total_tokens")?.as_u64()?,
        output_think: usage
            .get("output_tokens_details")
            .and_then(|details| details.get("reasoning_tokens"))
            .and_then(JsonValue::as_u64),
    })
}

/// Web search citations; an empty list is `None`
pub fn extract_web(json: &JsonValue) -> Option<Vec<WebCitation>> {
    let results = json
        .get("output")?
        .get("search_info")?
        .get("search_results")?
        .as_array()?;
    let citations: Vec<WebCitation> = results
        .iter()
        .map(|item| WebCitation {
            site: non_empty(item.get("site_name")),
            icon: non_empty(item.get("icon")),
            index: item.get("index").and_then(JsonValue::as_i64).unwrap_or(0),
            url: item
                .get("url")
                .and_then(JsonValue::as_str)
                .unwrap_or_default()
                .to_string(),
            title: item
                .get("title")
                .and_then(JsonValue::as_str)
                .unwrap_or_default()
                .to_string(),
        })
        .collect();
    if citations.is_empty() {
        None
    } else {
        Some(citations)
    }
}

/// Complete assistant record from one response
pub fn extract_record(json: &JsonValue) -> ChatRecord {
    let content = extract_text(json);
    ChatRecord {
        time: now_millis(),
        role: Role::Assistant,
        name: None,
        len: content.as_deref().map(char_len).unwrap_or(0),
        content,
        usage: extract_usage(json),
        web: extract_web(json),
        think: extract_think(json),
    }
}
