//! Fake transport for testing
//!
//! Replays scripted replies instead of real HTTP calls and records every
//! request it was handed.

use crate::llm::adapters::transport_types::{
    AdapterError, HttpRequest, HttpResponse, LineStream, SyncTransport,
};
use serde_json::Value as JsonValue;
use std::collections::VecDeque;
use std::sync::Mutex;

/// One scripted reply
#[derive(Debug, Clone)]
pub enum FakeReply {
    /// 200 response with a JSON body
    Json(JsonValue),
    /// Response with arbitrary status, content type and body
    Raw {
        status: u16,
        content_type: String,
        body: Vec<u8>,
    },
    /// Streamed body, one entry per line
    Stream(Vec<String>),
    /// Network failure
    Error(String),
}

/// Fake transport for testing (replays scripted replies in order)
#[derive(Debug, Default)]
pub struct FakeTransport {
    replies: Mutex<VecDeque<FakeReply>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl FakeTransport {
    /// Create fake transport with the given replies
    pub fn new(replies: impl IntoIterator<Item = FakeReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Create fake transport answering once with a JSON body
    pub fn with_json(body: JsonValue) -> Self {
        Self::new([FakeReply::Json(body)])
    }

    /// Create fake transport answering once with a streamed body
    pub fn with_stream<S: Into<String>>(lines: impl IntoIterator<Item = S>) -> Self {
        Self::new([FakeReply::Stream(
            lines.into_iter().map(Into::into).collect(),
        )])
    }

    /// Create fake transport that returns a network error
    pub fn with_error(msg: &str) -> Self {
        Self::new([FakeReply::Error(msg.to_string())])
    }

    /// Queue another reply
    pub fn push(&self, reply: FakeReply) {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(reply);
        }
    }

    /// Requests seen so far
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    /// Replies not consumed yet
    pub fn remaining(&self) -> usize {
        self.replies.lock().map(|r| r.len()).unwrap_or(0)
    }

    fn next(&self, request: &HttpRequest) -> Result<FakeReply, AdapterError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.replies
            .lock()
            .map_err(|_| AdapterError::Network("fake transport poisoned".to_string()))?
            .pop_front()
            .ok_or_else(|| AdapterError::Network("no scripted reply left".to_string()))
    }
}

impl SyncTransport for FakeTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, AdapterError> {
        match self.next(request)? {
            FakeReply::Json(body) => Ok(HttpResponse {
                status: 200,
                content_type: "application/json".to_string(),
                body: body.to_string().into_bytes(),
            }),
            FakeReply::Raw {
                status,
                content_type,
                body,
            } => Ok(HttpResponse {
                status,
                content_type,
                body,
            }),
            FakeReply::Stream(lines) => Ok(HttpResponse {
                status: 200,
                content_type: "text/event-stream".to_string(),
                body: lines.join("\n").into_bytes(),
            }),
            FakeReply::Error(msg) => Err(AdapterError::Network(msg)),
        }
    }

    fn send_stream(&self, request: &HttpRequest) -> Result<LineStream, AdapterError> {
        match self.next(request)? {
            FakeReply::Stream(lines) => Ok(Box::new(lines.into_iter().map(Ok))),
            FakeReply::Json(body) => {
                Ok(Box::new(std::iter::once(Ok(body.to_string()))))
            }
            FakeReply::Raw { status, body, .. } => {
                if !(200..300).contains(&status) {
                    return Err(AdapterError::from_error_body(status, &body));
                }
                let text = String::from_utf8_lossy(&body).into_owned();
                let lines: Vec<String> = text.lines().map(str::to_string).collect();
                Ok(Box::new(lines.into_iter().map(Ok)))
            }
            FakeReply::Error(msg) => Err(AdapterError::Network(msg)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fake_transport_basic() {
        let transport = FakeTransport::with_json(json!({"ok": true}));
        let response = transport.send(&HttpRequest::get("http://test")).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.json().unwrap()["ok"], true);
        assert_eq!(transport.requests().len(), 1);
    }

    #[test]
    fn test_fake_transport_with_error() {
        let transport = FakeTransport::with_error("test error");
        let result = transport.send(&HttpRequest::get("http://test"));
        assert!(matches!(result, Err(AdapterError::Network(_))));
    }

    #[test]
    fn test_fake_transport_stream() {
        let transport = FakeTransport::with_stream(["line1", "line2", "line3"]);
        let lines: Vec<String> = transport
            .send_stream(&HttpRequest::get("http://test"))
            .unwrap()
            .map(Result::unwrap)
            .collect();
        assert_eq!(lines, vec!["line1", "line2", "line3"]);
    }

    #[test]
    fn test_fake_transport_exhausted() {
        let transport = FakeTransport::new([]);
        assert!(transport.send(&HttpRequest::get("http://test")).is_err());
    }

    #[test]
    fn test_fake_transport_stream_error_status() {
        let transport = FakeTransport::new([FakeReply::Raw {
            status: 401,
            content_type: "application/json".to_string(),
            body: br#"{"code":"InvalidApiKey"}"#.to_vec(),
        }]);
        let result = transport.send_stream(&HttpRequest::get("http://test"));
        assert!(matches!(result, Err(AdapterError::Vendor(_))));
    }

    #[test]
    fn test_adapter_error_display() {
        let err = AdapterError::Network("test".to_string());
        assert_eq!(format!("{}", err), "Network error: test");

        let err = AdapterError::Http {
            status: 404,
            message: "not found".to_string(),
        };
        assert_eq!(format!("{}", err), "HTTP error 404: not found");
    }
}
