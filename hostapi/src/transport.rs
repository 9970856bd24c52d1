//! Network transport abstraction for the request bridge.
//!
//! The bridge decodes a `RequestDescriptor` from guest memory and hands it to
//! an `HttpTransport`. The transport blocks until the exchange completes.
//!
//! Implementations:
//! - `StaticTransport` (this crate) — canned responses for testing
//! - `ReqwestTransport` (`zina-sandbox`) — blocking reqwest client

use crate::types::{RequestDescriptor, ResponseEnvelope};

/// Why a request produced no response.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{url}: {reason}")]
pub struct TransportError {
    pub url: String,
    pub reason: String,
}

impl TransportError {
    pub fn new(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reason: reason.into(),
        }
    }
}

/// Blocking HTTP exchange.
///
/// `execute` must not return before the request has completed or failed.
/// Any HTTP status, including 4xx/5xx, is a successful exchange; `Err` is
/// reserved for exchanges that produced no response at all.
pub trait HttpTransport: Send + Sync {
    fn execute(&self, request: &RequestDescriptor) -> Result<ResponseEnvelope, TransportError>;
}
