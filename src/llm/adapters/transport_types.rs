//! Transport types
//!
//! Request/response shapes and errors shared by every transport.

use serde_json::Value as JsonValue;

/// Adapter errors
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    /// Network error (connection refused, timeout, etc.)
    #[error("Network error: {0}")]
    Network(String),

    /// HTTP error (non-2xx status without a vendor JSON payload)
    #[error("HTTP error {status}: {message}")]
    Http { status: u16, message: String },

    /// Vendor reported an error inside a JSON body
    #[error("Vendor error: {0}")]
    Vendor(JsonValue),

    /// Vendor answered with something other than JSON
    #[error("Unexpected content type: {0}")]
    UnexpectedContentType(String),

    /// Invalid response from provider
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(String),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(String),
}

impl AdapterError {
    /// Build the error for a failed status, keeping a JSON body as vendor payload.
    pub fn from_error_body(status: u16, body: &[u8]) -> Self {
        match serde_json::from_slice::<JsonValue>(body) {
            Ok(json) if json.is_object() => AdapterError::Vendor(json),
            _ => AdapterError::Http {
                status,
                message: String::from_utf8_lossy(body).trim().to_string(),
            },
        }
    }

    /// Vendor payload, if this is a vendor error
    pub fn vendor_payload(&self) -> Option<&JsonValue> {
        match self {
            AdapterError::Vendor(payload) => Some(payload),
            _ => None,
        }
    }
}

impl From<std::io::Error> for AdapterError {
    fn from(err: std::io::Error) -> Self {
        AdapterError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        AdapterError::Json(err.to_string())
    }
}

impl From<ureq::Error> for AdapterError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(code, _response) => AdapterError::Http {
                status: code,
                message: format!("{}", code),
            },
            ureq::Error::Transport(err) => AdapterError::Network(err.to_string()),
        }
    }
}

/// HTTP method subset used by vendor APIs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Request payload
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    /// Serialized JSON document
    Json(String),
    /// `application/x-www-form-urlencoded` fields
    Form(Vec<(String, String)>),
}

/// One outgoing HTTP request
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: RequestBody,
}

impl HttpRequest {
    /// GET request without body
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: RequestBody::Empty,
        }
    }

    /// POST request with a JSON body
    pub fn post_json(url: impl Into<String>, body: &JsonValue) -> Self {
        Self {
            method: Method::Post,
            url: url.into(),
            query: Vec::new(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: RequestBody::Json(body.to_string()),
        }
    }

    /// POST request with form fields
    pub fn post_form<K, V>(url: impl Into<String>, fields: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            method: Method::Post,
            url: url.into(),
            query: Vec::new(),
            headers: vec![(
                "Content-Type".to_string(),
                "application/x-www-form-urlencoded".to_string(),
            )],
            body: RequestBody::Form(
                fields
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Add a query parameter
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Set a header, replacing an existing one with the same name
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(&key));
        self.headers.push((key, value.into()));
        self
    }

    /// Look up a header value (case-insensitive)
    pub fn header_value(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    /// Look up a query parameter
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Parsed JSON body, if this request carries one
    pub fn json_body(&self) -> Option<JsonValue> {
        match &self.body {
            RequestBody::Json(body) => serde_json::from_str(body).ok(),
            _ => None,
        }
    }

    /// Form field value, if this request carries a form
    pub fn form_value(&self, key: &str) -> Option<&str> {
        match &self.body {
            RequestBody::Form(fields) => fields
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str()),
            _ => None,
        }
    }
}

/// Fully read HTTP response
#[derive(Debug, Clone, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Raw `Content-Type` header value (may carry parameters)
    pub content_type: String,
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Whether the body is declared as JSON
    pub fn is_json(&self) -> bool {
        self.content_type.starts_with("application/json")
    }

    /// Body decoded as UTF-8 (lossy)
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Body parsed as JSON
    pub fn json(&self) -> Result<JsonValue, AdapterError> {
        Ok(serde_json::from_slice(&self.body)?)
    }
}

/// Lazy, single-pass sequence of response lines
pub type LineStream = Box<dyn Iterator<Item = Result<String, AdapterError>> + Send>;

/// Synchronous HTTP transport
///
/// Abstraction over HTTP client to enable testing with FakeTransport.
pub trait SyncTransport: Send + Sync {
    /// Send request and return the full response, whatever its status
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, AdapterError>;

    /// Send request and return the response body as a lazy line stream
    ///
    /// Fails before yielding anything when the status is not 2xx.
    fn send_stream(&self, request: &HttpRequest) -> Result<LineStream, AdapterError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_json_becomes_vendor() {
        let err = AdapterError::from_error_body(400, br#"{"code":"InvalidParameter"}"#);
        assert_eq!(
            err.vendor_payload().unwrap()["code"],
            "InvalidParameter"
        );
    }

    #[test]
    fn test_error_body_text_becomes_http() {
        let err = AdapterError::from_error_body(502, b"Bad Gateway\n");
        match err {
            AdapterError::Http { status, message } => {
                assert_eq!(status, 502);
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_header_replaces_same_name() {
        let request = HttpRequest::post_json("http://test", &serde_json::json!({}))
            .header("content-type", "text/plain");
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.header_value("Content-Type"), Some("text/plain"));
    }

    #[test]
    fn test_response_is_json_with_charset() {
        let response = HttpResponse {
            status: 200,
            content_type: "application/json; charset=utf-8".to_string(),
            body: b"{}".to_vec(),
        };
        assert!(response.is_json());
    }
}
