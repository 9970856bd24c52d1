//! Shared test helpers for integration tests.
//!
//! Provides host service builders, a sandbox factory, and WAT snippets for
//! guests that exercise the `zina_host` imports. Guests keep their results
//! at fixed addresses so tests can read them back through a `Session`.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;

use zina_hostapi::{NativeEnvironment, RestrictedEnvironment, StaticTransport};
use zina_sandbox::{HostServices, Sandbox, SandboxConfig};

/// Where guests store the status written by `http_request`.
pub const STATUS_SLOT: i32 = 256;
/// Where guests store the first returned handle.
pub const HANDLE_SLOT: i32 = 260;
/// Where guests store a second returned handle.
pub const HANDLE_SLOT_2: i32 = 264;
/// Where guests store the length written by `fs_read`.
pub const LEN_SLOT: i32 = 268;

/// Every `zina_host` import, under the names the guest snippets call.
pub const IMPORTS: &str = r#"
    (import "zina_host" "http_request" (func $http (param i32 i32 i32 i32) (result i32)))
    (import "zina_host" "make_read_notification" (func $notify (result i32)))
    (import "zina_host" "mount_filesystem" (func $mount))
    (import "zina_host" "buffer_release" (func $release (param i32) (result i32)))
    (import "zina_host" "fs_read" (func $fs_read (param i32 i32) (result i32)))
    (import "zina_host" "fs_write" (func $fs_write (param i32 i32 i32) (result i32)))
    (import "zina_host" "fs_unlink" (func $fs_unlink (param i32) (result i32)))
    (import "zina_host" "log" (func $log (param i32 i32) (result i32)))
"#;

/// Wrap `body` (data segments and functions) into a guest module with all
/// imports and a one-page memory.
pub fn guest(body: &str) -> String {
    guest_with_memory("(memory (export \"memory\") 1)", body)
}

pub fn guest_with_memory(memory: &str, body: &str) -> String {
    format!("(module {IMPORTS} {memory} {body})")
}

pub fn load_sandbox(wat: &str) -> Sandbox {
    Sandbox::new(wat.as_bytes(), SandboxConfig::default()).expect("guest should validate")
}

pub fn load_sandbox_with_config(wat: &str, config: SandboxConfig) -> Sandbox {
    Sandbox::new(wat.as_bytes(), config).expect("guest should validate")
}

/// Services with a canned transport and no filesystem.
pub fn restricted(transport: &Arc<StaticTransport>) -> HostServices {
    HostServices::new(transport.clone(), Arc::new(RestrictedEnvironment))
}

/// Services with a canned transport and a filesystem rooted at `root`.
pub fn native(transport: &Arc<StaticTransport>, root: &Path) -> HostServices {
    HostServices::new(transport.clone(), Arc::new(NativeEnvironment::new(root)))
}

pub fn no_network() -> Arc<StaticTransport> {
    Arc::new(StaticTransport::new())
}

/// Escape `s` for a WAT string literal.
pub fn wat_string(s: &str) -> String {
    let mut out = String::new();
    for b in s.bytes() {
        match b {
            b'"' | b'\\' => out.push_str(&format!("\\{}", b as char)),
            0x20..=0x7e => out.push(b as char),
            _ => out.push_str(&format!("\\{:02x}", b)),
        }
    }
    out
}

/// A guest whose `zina_main` issues one request from the given strings and
/// stores status at `STATUS_SLOT` and the body handle at `HANDLE_SLOT`.
/// `release_body` releases that handle.
pub fn request_guest(url: &str, method: &str, body: &str) -> String {
    guest(&format!(
        r#"
        (data (i32.const 1024) "{url}\00")
        (data (i32.const 2048) "{method}\00")
        (data (i32.const 3072) "{body}\00")
        (func (export "zina_main") (result i32)
            (i32.store (i32.const {HANDLE_SLOT})
                (call $http (i32.const 1024) (i32.const 2048) (i32.const 3072) (i32.const {STATUS_SLOT})))
            (i32.const 0))
        (func (export "release_body") (result i32)
            (call $release (i32.load (i32.const {HANDLE_SLOT}))))
        "#,
        url = wat_string(url),
        method = wat_string(method),
        body = wat_string(body),
    ))
}
