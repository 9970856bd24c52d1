//! `zina-sandbox` — Wasmtime host bridge for a sandboxed native module.
//!
//! The guest cannot perform I/O. This crate runs it inside Wasmtime and
//! exposes a small set of blocking host services under the `zina_host`
//! import module:
//!
//! - **Request bridge:** `http_request` issues a blocking HTTP call
//! - **Notification builder:** `make_read_notification` returns the
//!   read-receipt JSON
//! - **Filesystem mount:** `mount_filesystem` binds the host working
//!   directory at `/axolotl`, with `fs_read` / `fs_write` / `fs_unlink`
//! - **Boundary arena:** every returned string is a nul-terminated buffer in
//!   guest memory, live until the guest calls `buffer_release`
//! - **Logging:** `log` forwards guest messages to `tracing`
//!
//! The primary entry point is [`Sandbox::run`].

pub mod error;
pub mod config;
pub mod memory;
pub mod vfs;
pub mod http;
pub mod host_impl;
pub mod validation;
pub mod linker;
pub mod runtime;

pub use error::SandboxError;
pub use config::SandboxConfig;
pub use host_impl::{HostServices, HostState};
pub use http::ReqwestTransport;
pub use runtime::{RunOutcome, Sandbox, Session};
pub use vfs::MountState;
