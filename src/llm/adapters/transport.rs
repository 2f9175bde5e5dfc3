//! HTTP transport for vendor adapters
//!
//! Provides synchronous HTTP client with streaming support.
//! Uses ureq for blocking I/O.

pub use crate::llm::adapters::transport_fake::{FakeReply, FakeTransport};
pub use crate::llm::adapters::transport_types::{
    AdapterError, HttpRequest, HttpResponse, LineStream, Method, RequestBody, SyncTransport,
};
pub use crate::llm::adapters::transport_ureq::UreqTransport;

/// Concrete transport enum
///
/// Wraps all transport types, avoiding dyn compatibility issues.
#[derive(Debug)]
pub enum Transport {
    Real(UreqTransport),
    Fake(FakeTransport),
}

impl Transport {
    /// Scripted transport, if this is one (test inspection)
    pub fn as_fake(&self) -> Option<&FakeTransport> {
        match self {
            Transport::Fake(t) => Some(t),
            Transport::Real(_) => None,
        }
    }
}

impl SyncTransport for Transport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, AdapterError> {
        match self {
            Transport::Real(t) => t.send(request),
            Transport::Fake(t) => t.send(request),
        }
    }

    fn send_stream(&self, request: &HttpRequest) -> Result<LineStream, AdapterError> {
        match self {
            Transport::Real(t) => t.send_stream(request),
            Transport::Fake(t) => t.send_stream(request),
        }
    }
}

impl Default for Transport {
    fn default() -> Self {
        Transport::Real(UreqTransport::new())
    }
}

impl From<FakeTransport> for Transport {
    fn from(t: FakeTransport) -> Self {
        Transport::Fake(t)
    }
}
