//! Sandbox error types.

use zina_hostapi::MountError;

/// Top-level error type for the sandbox crate.
#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    /// Wasmtime engine, compilation, or instantiation error.
    #[error("wasmtime error: {0}")]
    Wasmtime(#[from] anyhow::Error),

    /// Module validation failed (missing exports, bad imports, etc.).
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Host services could not be constructed.
    #[error("host setup failed: {0}")]
    HostSetup(String),

    /// Memory setup failed (no memory export, initial grow failure).
    #[error("memory error: {0}")]
    MemoryError(String),

    /// The boundary arena could not grow guest memory.
    #[error("boundary allocation of {requested} bytes failed")]
    OutOfMemory { requested: usize },

    /// The filesystem mount failed during guest startup.
    #[error("filesystem mount failed: {0}")]
    MountFailed(MountError),

    /// The guest passed a status or length slot outside its memory.
    #[error("guest passed an out-of-bounds output pointer")]
    BadPointer,

    /// Fuel exhausted during execution.
    #[error("fuel exhausted (instruction limit)")]
    FuelExhausted,

    /// WASM guest trapped.
    #[error("guest trapped: {0}")]
    GuestTrapped(String),
}
