//! Canned-response transport for testing.
//!
//! `StaticTransport` answers requests from a route table keyed by method and
//! URL, and records every request it sees so tests can assert on what the
//! guest sent. Unrouted requests fail like an unreachable host.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::transport::{HttpTransport, TransportError};
use crate::types::{RequestDescriptor, ResponseEnvelope};

#[derive(Debug, Clone)]
enum Route {
    Respond(ResponseEnvelope),
    Fail(String),
}

/// In-memory `HttpTransport` with a fixed route table.
#[derive(Debug, Default)]
pub struct StaticTransport {
    routes: BTreeMap<(String, String), Route>,
    seen: Mutex<Vec<RequestDescriptor>>,
}

impl StaticTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `method url` with `status` and `body`.
    pub fn respond(mut self, method: &str, url: &str, status: u16, body: &str) -> Self {
        self.routes.insert(
            (method.to_ascii_uppercase(), url.to_string()),
            Route::Respond(ResponseEnvelope::new(status, body)),
        );
        self
    }

    /// Fail `method url` as a network error with `reason`.
    pub fn fail(mut self, method: &str, url: &str, reason: &str) -> Self {
        self.routes.insert(
            (method.to_ascii_uppercase(), url.to_string()),
            Route::Fail(reason.to_string()),
        );
        self
    }

    /// Requests received so far, in order.
    pub fn requests(&self) -> Vec<RequestDescriptor> {
        match self.seen.lock() {
            Ok(seen) => seen.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl HttpTransport for StaticTransport {
    fn execute(&self, request: &RequestDescriptor) -> Result<ResponseEnvelope, TransportError> {
        match self.seen.lock() {
            Ok(mut seen) => seen.push(request.clone()),
            Err(poisoned) => poisoned.into_inner().push(request.clone()),
        }
        let key = (request.method.clone(), request.url.clone());
        match self.routes.get(&key) {
            Some(Route::Respond(envelope)) => Ok(envelope.clone()),
            Some(Route::Fail(reason)) => Err(TransportError::new(&request.url, reason.clone())),
            None => Err(TransportError::new(&request.url, "connection refused")),
        }
    }
}
