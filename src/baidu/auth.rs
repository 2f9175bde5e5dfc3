//! Baidu AIP client base
//!
//! Holds the API credentials, caches the OAuth access token and keeps a log
//! of calls made through it.

use crate::llm::adapters::transport::{
    HttpRequest, HttpResponse, SyncTransport, Transport, UreqTransport,
};
use crate::llm::adapters::AdapterError;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

/// OAuth token endpoint
pub const TOKEN_URL: &str = "https://aip.baidubce.com/oauth/2.0/token";

/// Default token lifetime before refresh
pub const DEFAULT_TOKEN_VALID_SECONDS: u64 = 43200;

#[derive(Debug)]
struct CachedToken {
    value: String,
    fetched: Instant,
}

/// One call made through the client
#[derive(Debug, Clone, PartialEq)]
pub struct CallRecord {
    pub time: DateTime<Utc>,
    pub data: JsonValue,
}

/// Baidu AIP client
#[derive(Debug)]
pub struct BaiduClient {
    api_key: String,
    secret_key: String,
    token_valid: Duration,
    transport: Transport,
    token: Mutex<Option<CachedToken>>,
    /// Device id sent with direct synthesis requests
    cuid: String,
    started: DateTime<Utc>,
    calls: Mutex<Vec<CallRecord>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl BaiduClient {
    /// Create client with the real transport
    pub fn new(api_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        Self::with_transport(api_key, secret_key, Transport::Real(UreqTransport::new()))
    }

    /// Create client with custom transport (for testing)
    pub fn with_transport(
        api_key: impl Into<String>,
        secret_key: impl Into<String>,
        transport: Transport,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            secret_key: secret_key.into(),
            token_valid: Duration::from_secs(DEFAULT_TOKEN_VALID_SECONDS),
            transport,
            token: Mutex::new(None),
            cuid: uuid::Uuid::new_v4().to_string(),
            started: Utc::now(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_token_valid_seconds(mut self, seconds: u64) -> Self {
        self.token_valid = Duration::from_secs(seconds);
        self
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn cuid(&self) -> &str {
        &self.cuid
    }

    /// Access token, fetched again once older than the validity window
    pub fn token(&self) -> Result<String, AdapterError> {
        let mut cached = lock(&self.token);
        if let Some(token) = cached.as_ref() {
            if token.fetched.elapsed() < self.token_valid {
                return Ok(token.value.clone());
            }
        }

        debug!("fetching baidu access token");
        let request = HttpRequest::post_form(TOKEN_URL, Vec::<(String, String)>::new())
            .query("grant_type", "client_credentials")
            .query("client_id", &self.api_key)
            .query("client_secret", &self.secret_key);
        let response = self.send_json(&request)?;
        let value = response
            .get("access_token")
            .and_then(JsonValue::as_str)
            .ok_or_else(|| AdapterError::InvalidResponse("missing access_token".to_string()))?
            .to_string();

        *cached = Some(CachedToken {
            value: value.clone(),
            fetched: Instant::now(),
        });
        Ok(value)
    }

    /// Send and return the response, surfacing `error_code` payloads
    pub fn send_raw(&self, request: &HttpRequest) -> Result<HttpResponse, AdapterError> {
        let response = self.transport.send(request)?;
        if response.is_json() {
            if let Ok(json) = response.json() {
                if json.get("error_code").is_some() {
                    return Err(AdapterError::Vendor(json));
                }
            }
        }
        if response.status >= 400 {
            return Err(AdapterError::from_error_body(response.status, &response.body));
        }
        Ok(response)
    }

    /// Send and decode a JSON response
    pub fn send_json(&self, request: &HttpRequest) -> Result<JsonValue, AdapterError> {
        let response = self.send_raw(request)?;
        if !response.is_json() {
            return Err(AdapterError::UnexpectedContentType(response.content_type));
        }
        response.json()
    }

    /// POST a JSON body to an AIP endpoint with the access token attached
    pub fn post_json(&self, url: &str, body: &JsonValue) -> Result<JsonValue, AdapterError> {
        let request = HttpRequest::post_json(url, body).query("access_token", self.token()?);
        debug!(url, "baidu request");
        self.send_json(&request)
    }

    /// Fetch a result file (image, audio)
    pub fn download(&self, url: &str) -> Result<Vec<u8>, AdapterError> {
        Ok(self.send_raw(&HttpRequest::get(url))?.body)
    }

    /// Remember a call
    pub fn record_call(&self, data: JsonValue) {
        lock(&self.calls).push(CallRecord {
            time: Utc::now(),
            data,
        });
    }

    pub fn calls(&self) -> Vec<CallRecord> {
        lock(&self.calls).clone()
    }

    /// Seconds since the last recorded call, or since construction
    pub fn interval(&self) -> f64 {
        let last = lock(&self.calls)
            .last()
            .map(|call| call.time)
            .unwrap_or(self.started);
        (Utc::now() - last).num_milliseconds() as f64 / 1000.0
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::llm::adapters::transport::{FakeReply, FakeTransport};
    use serde_json::json;

    pub(crate) fn token_reply() -> FakeReply {
        FakeReply::Json(json!({"access_token": "tok-1", "expires_in": 2592000}))
    }

    pub(crate) fn fake_client(replies: Vec<FakeReply>) -> BaiduClient {
        BaiduClient::with_transport("ak", "sk", Transport::Fake(FakeTransport::new(replies)))
    }

    #[test]
    fn test_token_cached() {
        let client = fake_client(vec![token_reply()]);
        assert_eq!(client.token().unwrap(), "tok-1");
        assert_eq!(client.token().unwrap(), "tok-1");

        let requests = client.transport().as_fake().unwrap().requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].url, TOKEN_URL);
        assert_eq!(requests[0].query_value("grant_type"), Some("client_credentials"));
        assert_eq!(requests[0].query_value("client_id"), Some("ak"));
        assert_eq!(requests[0].query_value("client_secret"), Some("sk"));
    }

    #[test]
    fn test_token_refreshed_when_expired() {
        let client = fake_client(vec![
            token_reply(),
            FakeReply::Json(json!({"access_token": "tok-2"})),
        ])
        .with_token_valid_seconds(0);
        assert_eq!(client.token().unwrap(), "tok-1");
        assert_eq!(client.token().unwrap(), "tok-2");
    }

    #[test]
    fn test_error_code_is_vendor_error() {
        let client = fake_client(vec![FakeReply::Json(
            json!({"error_code": 110, "error_msg": "Access token invalid"}),
        )]);
        let err = client.token().unwrap_err();
        assert_eq!(err.vendor_payload().unwrap()["error_code"], 110);
    }

    #[test]
    fn test_interval_resets_on_call() {
        let client = fake_client(vec![]);
        assert!(client.interval() >= 0.0);
        client.record_call(json!({"text": "hi"}));
        assert!(client.interval() < 5.0);
        assert_eq!(client.calls().len(), 1);
    }
}
