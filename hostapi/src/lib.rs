//! `zina-hostapi` — interface types for the Zina host bridge.
//!
//! This crate defines what the sandboxed module can ask of its host, without
//! depending on the WASM runtime. It provides:
//!
//! - `HostApi` trait — the operations behind each `zina_host` import
//! - `HttpTransport` trait — blocking network exchange
//! - `StaticTransport` — in-memory `HttpTransport` for testing
//! - `HostEnvironment` trait — filesystem capability check
//! - Request, response, notification and mount records
//! - `HostError` and the reserved guest `StatusCode` values

pub mod error;
pub mod types;
pub mod transport;
pub mod static_transport;
pub mod environment;
pub mod traits;

// Re-export commonly used types at the crate root.
pub use error::{HostError, MountError, StatusCode};
pub use types::{
    HttpConfig, MountDescriptor, ReadNotification, RequestDescriptor, ResponseEnvelope,
    CONTENT_TYPE_HEADER, MOUNT_POINT,
};
pub use transport::{HttpTransport, TransportError};
pub use static_transport::StaticTransport;
pub use environment::{
    FilesystemCapability, HostEnvironment, MountOutcome, NativeEnvironment, RestrictedEnvironment,
};
pub use traits::HostApi;
