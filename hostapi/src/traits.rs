//! Host API trait — the services the sandboxed module can call.
//!
//! Each method corresponds to a function imported by the guest under the
//! `zina_host` module. The trait works with decoded Rust values; pointer
//! validation, string decoding and arena marshalling happen in the sandbox
//! linker, not here.

use crate::environment::MountOutcome;
use crate::error::HostError;
use crate::types::{ReadNotification, RequestDescriptor, ResponseEnvelope};

/// Host-side implementation of the bridge services.
pub trait HostApi {
    // ── Request bridge ──

    /// Issue `request` and block until it completes.
    ///
    /// Never fails: a request that produced no response yields an envelope
    /// with `StatusCode::NetworkFailure` and an empty body.
    fn http_request(&mut self, request: &RequestDescriptor) -> ResponseEnvelope;

    // ── Notification builder ──

    /// Read-receipt notification stamped with the current instant.
    fn make_read_notification(&self) -> ReadNotification;

    // ── Filesystem ──

    /// Mount the host filesystem at `/axolotl` if the environment has one.
    ///
    /// Errors are fatal startup failures.
    fn mount_filesystem(&mut self) -> Result<MountOutcome, HostError>;

    /// Read a whole file through the mount.
    fn read_file(&self, virtual_path: &str) -> Result<Vec<u8>, HostError>;

    /// Create or truncate a file through the mount.
    fn write_file(&self, virtual_path: &str, data: &[u8]) -> Result<(), HostError>;

    /// Remove a file through the mount.
    fn unlink_file(&self, virtual_path: &str) -> Result<(), HostError>;

    // ── Logging ──

    /// Forward a guest log line to the host logger.
    fn log(&self, level: i32, message: &str);
}
