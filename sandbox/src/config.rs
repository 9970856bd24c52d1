//! Sandbox configuration.

use zina_hostapi::HttpConfig;

/// Configuration for the WASM sandbox.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Maximum linear memory pages (1 page = 64 KiB).
    /// Default: 256 pages = 16 MiB.
    pub max_memory_pages: u32,

    /// Wasmtime fuel limit (instruction metering).
    /// Bounds guest compute; a blocked host call does not consume fuel.
    pub fuel_limit: u64,

    /// Longest string, in bytes, the host will decode from guest memory.
    pub max_string_len: usize,

    /// Blocking HTTP transport settings.
    pub http: HttpConfig,

    /// Forward guest `log` calls to `tracing`.
    pub enable_guest_logs: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_memory_pages: 256,       // 16 MiB
            fuel_limit: 100_000_000,
            max_string_len: 1024 * 1024, // 1 MiB
            http: HttpConfig::default(),
            enable_guest_logs: true,
        }
    }
}
