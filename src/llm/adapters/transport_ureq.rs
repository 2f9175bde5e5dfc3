//! Real HTTP transport using ureq
//!
//! Synchronous blocking HTTP client for vendor adapters.

use crate::llm::adapters::transport_types::{
    AdapterError, HttpRequest, HttpResponse, LineStream, RequestBody, SyncTransport,
};
use std::io::{BufRead, BufReader, Read};
use std::time::Duration;
use tracing::debug;

/// Real HTTP transport using ureq
///
/// Plain requests get one deadline for the whole exchange. Streamed
/// requests only bound the connect and each read, so a reply may keep
/// arriving for longer than the timeout as long as it never stalls.
#[derive(Debug)]
pub struct UreqTransport {
    /// Timeout in seconds for requests
    timeout: u64,
    agent: ureq::Agent,
    stream_agent: ureq::Agent,
}

impl UreqTransport {
    /// Create new transport with default timeout (60s)
    pub fn new() -> Self {
        Self::with_timeout(60)
    }

    /// Create transport with custom timeout
    pub fn with_timeout(timeout_secs: u64) -> Self {
        let timeout = Duration::from_secs(timeout_secs);
        Self {
            timeout: timeout_secs,
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            stream_agent: ureq::AgentBuilder::new()
                .timeout_connect(timeout)
                .timeout_read(timeout)
                .build(),
        }
    }

    /// Issue the request; non-2xx statuses come back as responses, not errors.
    fn call(&self, request: &HttpRequest, stream: bool) -> Result<ureq::Response, AdapterError> {
        debug!(
            method = request.method.as_str(),
            url = %request.url,
            timeout = self.timeout,
            stream,
            "http request"
        );
        let agent = if stream { &self.stream_agent } else { &self.agent };
        let mut call = agent.request(request.method.as_str(), &request.url);
        for (key, value) in &request.query {
            call = call.query(key, value);
        }
        for (key, value) in &request.headers {
            call = call.set(key, value);
        }

        let result = match &request.body {
            RequestBody::Empty => call.call(),
            RequestBody::Json(body) => call.send_string(body),
            RequestBody::Form(fields) => {
                let pairs: Vec<(&str, &str)> = fields
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect();
                call.send_form(&pairs)
            }
        };

        match result {
            Ok(response) => Ok(response),
            Err(ureq::Error::Status(_, response)) => Ok(response),
            Err(err) => Err(err.into()),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl SyncTransport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, AdapterError> {
        let response = self.call(request, false)?;
        let status = response.status();
        let content_type = response.header("Content-Type").unwrap_or("").to_string();

        let mut body = Vec::new();
        response.into_reader().read_to_end(&mut body)?;
        debug!(status, body_len = body.len(), "http response");

        Ok(HttpResponse {
            status,
            content_type,
            body,
        })
    }

    fn send_stream(&self, request: &HttpRequest) -> Result<LineStream, AdapterError> {
        let response = self.call(request, true)?;
        let status = response.status();
        debug!(status, "http stream opened");

        if !(200..300).contains(&status) {
            let mut body = Vec::new();
            response.into_reader().read_to_end(&mut body)?;
            return Err(AdapterError::from_error_body(status, &body));
        }

        let lines = BufReader::new(response.into_reader())
            .lines()
            .map(|line| line.map_err(AdapterError::from));
        Ok(Box::new(lines))
    }
}
