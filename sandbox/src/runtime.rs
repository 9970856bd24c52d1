//! Sandbox runtime — Wasmtime engine, module loading, and guest execution.
//!
//! The `Sandbox` struct is the main entry point. It loads a WASM module,
//! validates its ABI, and provides `run` for executing the guest against a
//! set of injected host services. `Session` is the same instance held open
//! for embedders that drive individual exports.

use std::path::Path;

use wasmtime::{Config, Engine, Instance, Linker, Memory, Module, Store, Trap};

use zina_hostapi::HostError;

use crate::config::SandboxConfig;
use crate::error::SandboxError;
use crate::host_impl::{HostServices, HostState};
use crate::linker::register_host_functions;
use crate::memory::{self, BoundaryArena, HOST_ALLOC_PAGES, PAGE_SIZE};
use crate::validation::{validate_module, ENTRY_POINT};
use crate::vfs::MountState;

/// What a completed guest run left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    /// Value returned by `zina_main`.
    pub exit_code: i32,
    /// Final state of the guest's filesystem view.
    pub mount_state: MountState,
    /// Arena buffers the guest never released.
    pub live_buffers: usize,
}

/// The host bridge sandbox.
///
/// Loads and validates a WASM module, then runs it by creating a fresh
/// Wasmtime instance per call (the "process" whose lifetime bounds the
/// mount and the arena).
pub struct Sandbox {
    engine: Engine,
    module: Module,
    config: SandboxConfig,
}

impl Sandbox {
    /// Create a new sandbox from WASM bytecode (or WAT text).
    pub fn new(wasm_bytes: &[u8], config: SandboxConfig) -> Result<Self, SandboxError> {
        let engine = create_engine()?;
        let module = Module::new(&engine, wasm_bytes)?;
        validate_module(&module)?;
        Ok(Self {
            engine,
            module,
            config,
        })
    }

    /// Load from a `.wasm` file path.
    pub fn from_file(path: &Path, config: SandboxConfig) -> Result<Self, SandboxError> {
        let engine = create_engine()?;
        let module = Module::from_file(&engine, path)?;
        validate_module(&module)?;
        Ok(Self {
            engine,
            module,
            config,
        })
    }

    pub fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Run the guest's `zina_main` with `services` wired into its imports.
    ///
    /// Every bridged call the guest makes blocks this thread until it
    /// completes. The instance is discarded afterwards.
    pub fn run(&self, services: HostServices) -> Result<RunOutcome, SandboxError> {
        let mut session = self.instantiate(services)?;
        let exit_code = session.call(ENTRY_POINT)?;
        let outcome = session.outcome(exit_code);
        if outcome.live_buffers > 0 {
            tracing::debug!(live = outcome.live_buffers, "guest left buffers unreleased");
        }
        Ok(outcome)
    }

    /// Instantiate the guest without running it.
    ///
    /// Links the host functions, then reserves the boundary arena above the
    /// guest's initial memory.
    pub fn instantiate(&self, services: HostServices) -> Result<Session, SandboxError> {
        let host_state = HostState::new(services, &self.config);

        let mut store = Store::new(&self.engine, host_state);
        store.limiter(|state| &mut state.limits);
        store.set_fuel(self.config.fuel_limit)?;

        let mut linker = Linker::new(&self.engine);
        register_host_functions(&mut linker)?;

        let instance = linker.instantiate(&mut store, &self.module)?;

        let memory = instance
            .get_memory(&mut store, "memory")
            .ok_or_else(|| SandboxError::MemoryError("no memory export".into()))?;

        let current_pages = memory.size(&store);
        memory
            .grow(&mut store, HOST_ALLOC_PAGES)
            .map_err(|e| SandboxError::MemoryError(format!("initial grow: {}", e)))?;

        let arena_base = (current_pages as usize) * PAGE_SIZE;
        let arena_capacity = (HOST_ALLOC_PAGES as usize) * PAGE_SIZE;
        store.data_mut().arena = BoundaryArena::new(arena_base, arena_capacity);

        Ok(Session {
            store,
            instance,
            memory,
        })
    }
}

/// A live guest instance.
///
/// Lets an embedder drive individual guest exports and inspect guest memory
/// between calls.
pub struct Session {
    store: Store<HostState>,
    instance: Instance,
    memory: Memory,
}

impl Session {
    /// Call a `() -> i32` guest export.
    pub fn call(&mut self, export: &str) -> Result<i32, SandboxError> {
        let func = self
            .instance
            .get_typed_func::<(), i32>(&mut self.store, export)?;
        handle_trap(func.call(&mut self.store, ()))
    }

    /// Read an i32 from guest memory.
    pub fn read_i32(&self, ptr: i32) -> Result<i32, SandboxError> {
        memory::read_i32(self.memory.data(&self.store), ptr).map_err(|_| SandboxError::BadPointer)
    }

    /// Bytes of a live arena buffer, terminator included.
    pub fn read_buffer(&self, handle: i32) -> Result<Vec<u8>, SandboxError> {
        let len = self
            .store
            .data()
            .arena
            .len_of(handle as u32)
            .ok_or_else(|| SandboxError::MemoryError(format!("no live buffer at {}", handle)))?;
        memory::read_bytes(self.memory.data(&self.store), handle, len as i32)
            .map_err(|_| SandboxError::BadPointer)
    }

    /// Decode a nul-terminated string in guest memory.
    pub fn read_c_string(&self, ptr: i32) -> Result<String, SandboxError> {
        let max_len = self.store.data().max_string_len;
        memory::read_c_string(self.memory.data(&self.store), ptr, max_len)
            .map_err(|e| SandboxError::MemoryError(e.to_string()))
    }

    pub fn host_state(&self) -> &HostState {
        self.store.data()
    }

    /// Snapshot of the run so far, given the entry point's return value.
    pub fn outcome(&self, exit_code: i32) -> RunOutcome {
        let state = self.store.data();
        RunOutcome {
            exit_code,
            mount_state: state.mount_state().clone(),
            live_buffers: state.arena.live_count(),
        }
    }
}

/// Create a Wasmtime engine for a single-threaded, fuel-metered guest.
fn create_engine() -> Result<Engine, SandboxError> {
    let mut wasm_config = Config::new();

    // Fuel metering — bounds guest compute between bridged calls
    wasm_config.consume_fuel(true);

    // The guest has one thread of control
    wasm_config.wasm_threads(false);

    Ok(Engine::new(&wasm_config)?)
}

/// Handle a guest function call result, converting traps to SandboxError.
///
/// Host functions trap with a `HostError`; it is recovered here so fatal
/// bridge conditions stay distinguishable from guest faults.
fn handle_trap<R>(result: Result<R, anyhow::Error>) -> Result<R, SandboxError> {
    result.map_err(classify_trap)
}

fn classify_trap(err: anyhow::Error) -> SandboxError {
    if let Some(host) = err.downcast_ref::<HostError>() {
        return match host {
            HostError::OutOfMemory { requested } => SandboxError::OutOfMemory {
                requested: *requested,
            },
            HostError::Mount(mount) => SandboxError::MountFailed(mount.clone()),
            HostError::BadPointer => SandboxError::BadPointer,
            other => SandboxError::GuestTrapped(other.to_string()),
        };
    }
    if let Some(Trap::OutOfFuel) = err.downcast_ref::<Trap>() {
        return SandboxError::FuelExhausted;
    }
    SandboxError::GuestTrapped(format!("{:#}", err))
}
