//! Blocking HTTP transport backed by `reqwest::blocking`.
//!
//! The guest has one thread and no way to wait on a future, so every request
//! runs to completion on the calling thread. Must not be used from inside an
//! async runtime: `reqwest::blocking` panics there.

use reqwest::blocking::Client;
use reqwest::Method;

use zina_hostapi::{
    HttpConfig, HttpTransport, RequestDescriptor, ResponseEnvelope, TransportError,
};

/// Production `HttpTransport`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new(config: &HttpConfig) -> Result<Self, TransportError> {
        let mut builder = Client::builder();
        // reqwest's blocking client defaults to a 30s timeout; `None` means none.
        builder = builder.timeout(config.timeout);
        let client = builder
            .build()
            .map_err(|e| TransportError::new("", format!("client setup failed: {e}")))?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn execute(&self, request: &RequestDescriptor) -> Result<ResponseEnvelope, TransportError> {
        let fail = |e: &dyn std::fmt::Display| TransportError::new(&request.url, e.to_string());

        let method = Method::from_bytes(request.method.as_bytes()).map_err(|e| fail(&e))?;
        let sends_body = !(request.body.is_empty() && matches!(method, Method::GET | Method::HEAD));

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in request.headers() {
            builder = builder.header(name, value);
        }
        if sends_body {
            builder = builder.body(request.body.clone());
        }

        let response = builder.send().map_err(|e| fail(&e))?;
        let status = response.status().as_u16();
        let bytes = response.bytes().map_err(|e| fail(&e))?;
        Ok(ResponseEnvelope::new(
            status,
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    }
}
