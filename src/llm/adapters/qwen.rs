//! Qwen adapter
//!
//! Alibaba DashScope text-generation API. Non-streaming calls return the
//! decoded JSON response; streaming calls return the raw SSE lines for the
//! reply assembler.

use crate::llm::adapters::transport::{
    HttpRequest, HttpResponse, LineStream, SyncTransport, Transport, UreqTransport,
};
use crate::llm::adapters::{AdapterError, ChatMessage};
use serde_json::{json, Value as JsonValue};
use tracing::debug;

/// DashScope text-generation endpoint
pub const QWEN_URL: &str =
    "https://dashscope.aliyuncs.com/api/v1/services/aigc/text-generation/generation";

/// Default model
pub const QWEN_MODEL: &str = "qwen-turbo-latest";

/// Citation marker format requested when `web_mark` is on
pub const CITATION_FORMAT: &str = "[ref_<number>]";

/// Per-request switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
    /// Enable web search
    pub web: bool,
    /// Put citation markers into the reply text
    pub web_mark: bool,
    /// Enable deep thinking (streaming only)
    pub think: bool,
    pub stream: bool,
}

/// Qwen adapter
#[derive(Debug)]
pub struct QwenAdapter {
    url: String,
    model: String,
    api_key: String,
    /// Reply randomness in `[0, 1]`
    randomness: f64,
    transport: Transport,
}

impl QwenAdapter {
    /// Create adapter with the real transport
    pub fn new(api_key: impl Into<String>, randomness: f64) -> Result<Self, AdapterError> {
        Self::with_transport(
            api_key,
            randomness,
            Transport::Real(UreqTransport::new()),
        )
    }

    /// Create adapter with custom transport (for testing)
    pub fn with_transport(
        api_key: impl Into<String>,
        randomness: f64,
        transport: Transport,
    ) -> Result<Self, AdapterError> {
        if !(0.0..=1.0).contains(&randomness) {
            return Err(AdapterError::Configuration(format!(
                "randomness must be within [0, 1], got {}",
                randomness
            )));
        }
        Ok(Self {
            url: QWEN_URL.to_string(),
            model: QWEN_MODEL.to_string(),
            api_key: api_key.into(),
            randomness,
            transport,
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn randomness(&self) -> f64 {
        self.randomness
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    /// Sampling temperature, kept strictly below the vendor maximum of 2
    fn temperature(&self) -> f64 {
        let temperature = self.randomness * 2.0;
        if temperature >= 2.0 {
            1.99
        } else {
            temperature
        }
    }

    /// Build request body
    pub fn build_body(&self, messages: &[ChatMessage], options: RequestOptions) -> JsonValue {
        let mut parameters = json!({
            "result_format": "message",
            "temperature": self.temperature(),
            "presence_penalty": self.randomness * 4.0 - 2.0,
            "enable_search": options.web,
            "enable_thinking": options.think,
        });
        if options.web {
            parameters["search_options"] = json!({
                "enable_source": true,
                "enable_citation": options.web_mark,
                "citation_format": CITATION_FORMAT,
                "forced_search": false,
                "search_strategy": "max",
                "prepend_search_result": false,
                "enable_search_extension": true,
            });
        }
        if options.stream {
            parameters["incremental_output"] = json!(true);
        }

        json!({
            "model": self.model,
            "input": {"messages": messages},
            "parameters": parameters,
            "stream": options.stream,
        })
    }

    /// Build the full HTTP request
    pub fn build_request(&self, messages: &[ChatMessage], options: RequestOptions) -> HttpRequest {
        let request = HttpRequest::post_json(&self.url, &self.build_body(messages, options))
            .header("Authorization", format!("Bearer {}", self.api_key));
        if options.stream {
            request.header("X-DashScope-SSE", "enable")
        } else {
            request
        }
    }

    /// Non-streaming call; `options.stream` is ignored
    pub fn request(
        &self,
        messages: &[ChatMessage],
        options: RequestOptions,
    ) -> Result<JsonValue, AdapterError> {
        let options = RequestOptions {
            stream: false,
            ..options
        };
        let request = self.build_request(messages, options);
        debug!(model = %self.model, messages = messages.len(), "qwen request");
        let response = self.transport.send(&request)?;
        check_response(&response)
    }

    /// Streaming call; `options.stream` is forced on
    pub fn request_stream(
        &self,
        messages: &[ChatMessage],
        options: RequestOptions,
    ) -> Result<LineStream, AdapterError> {
        let options = RequestOptions {
            stream: true,
            ..options
        };
        let request = self.build_request(messages, options);
        debug!(model = %self.model, messages = messages.len(), "qwen stream request");
        self.transport.send_stream(&request)
    }
}

/// Decode a non-streaming response, surfacing vendor errors
pub fn check_response(response: &HttpResponse) -> Result<JsonValue, AdapterError> {
    if !response.is_json() {
        if response.status >= 400 {
            return Err(AdapterError::Http {
                status: response.status,
                message: response.text(),
            });
        }
        return Err(AdapterError::UnexpectedContentType(
            response.content_type.clone(),
        ));
    }
    let json = response.json()?;
    if json.get("code").is_some() || response.status >= 400 {
        return Err(AdapterError::Vendor(json));
    }
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::adapters::transport::{FakeReply, FakeTransport};

    fn adapter(randomness: f64) -> QwenAdapter {
        QwenAdapter::with_transport(
            "sk-test",
            randomness,
            Transport::Fake(FakeTransport::default()),
        )
        .unwrap()
    }

    #[test]
    fn test_randomness_range() {
        for bad in [-0.01, 1.01, f64::NAN, f64::INFINITY] {
            let result = QwenAdapter::with_transport(
                "k",
                bad,
                Transport::Fake(FakeTransport::default()),
            );
            assert!(matches!(result, Err(AdapterError::Configuration(_))));
        }
        for good in [0.0, 0.5, 1.0] {
            assert!(QwenAdapter::with_transport(
                "k",
                good,
                Transport::Fake(FakeTransport::default())
            )
            .is_ok());
        }
    }

    #[test]
    fn test_temperature_capped() {
        let body = adapter(1.0).build_body(&[], RequestOptions::default());
        assert_eq!(body["parameters"]["temperature"], 1.99);
        assert_eq!(body["parameters"]["presence_penalty"], 2.0);

        let body = adapter(0.5).build_body(&[], RequestOptions::default());
        assert_eq!(body["parameters"]["temperature"], 1.0);
        assert_eq!(body["parameters"]["presence_penalty"], 0.0);
    }

    #[test]
    fn test_build_body_web_and_stream() {
        let options = RequestOptions {
            web: true,
            web_mark: true,
            think: true,
            stream: true,
        };
        let body = adapter(0.5).build_body(&[ChatMessage::user("hi")], options);
        let parameters = &body["parameters"];
        assert_eq!(parameters["result_format"], "message");
        assert_eq!(parameters["enable_search"], true);
        assert_eq!(parameters["search_options"]["enable_citation"], true);
        assert_eq!(parameters["search_options"]["citation_format"], CITATION_FORMAT);
        assert_eq!(parameters["enable_thinking"], true);
        assert_eq!(parameters["incremental_output"], true);
        assert_eq!(body["stream"], true);
        assert_eq!(body["input"]["messages"][0]["role"], "user");
        assert_eq!(body["model"], QWEN_MODEL);
    }

    #[test]
    fn test_build_body_without_web_has_no_search_options() {
        let body = adapter(0.5).build_body(&[], RequestOptions::default());
        assert_eq!(body["parameters"]["enable_search"], false);
        assert!(body["parameters"].get("search_options").is_none());
        assert!(body["parameters"].get("incremental_output").is_none());
    }

    #[test]
    fn test_stream_request_headers() {
        let request = adapter(0.5).build_request(
            &[],
            RequestOptions {
                stream: true,
                ..Default::default()
            },
        );
        assert_eq!(request.header_value("Authorization"), Some("Bearer sk-test"));
        assert_eq!(request.header_value("X-DashScope-SSE"), Some("enable"));
        assert_eq!(request.header_value("Content-Type"), Some("application/json"));
    }

    #[test]
    fn test_vendor_code_is_error() {
        let qwen = QwenAdapter::with_transport(
            "k",
            0.5,
            Transport::Fake(FakeTransport::with_json(
                serde_json::json!({"code": "InvalidApiKey", "message": "bad key"}),
            )),
        )
        .unwrap();
        let err = qwen.request(&[], RequestOptions::default()).unwrap_err();
        assert_eq!(err.vendor_payload().unwrap()["code"], "InvalidApiKey");
    }

    #[test]
    fn test_non_json_content_type_is_error() {
        let qwen = QwenAdapter::with_transport(
            "k",
            0.5,
            Transport::Fake(FakeTransport::new([FakeReply::Raw {
                status: 200,
                content_type: "text/html".to_string(),
                body: b"<html/>".to_vec(),
            }])),
        )
        .unwrap();
        match qwen.request(&[], RequestOptions::default()) {
            Err(AdapterError::UnexpectedContentType(ct)) => assert_eq!(ct, "text/html"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
