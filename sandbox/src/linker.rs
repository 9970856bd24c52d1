//! Host function registration via Wasmtime linker.
//!
//! Registers the `zina_host` functions with the Wasmtime `Linker`.
//! Each function:
//! 1. Extracts memory and `HostState` from the Caller
//! 2. Validates output slots (an unusable slot traps)
//! 3. Decodes nul-terminated string arguments (bad input returns a status)
//! 4. Calls the matching `HostApi` operation
//! 5. Marshals results back through the boundary arena
//!
//! Fatal conditions (`HostError::is_fatal`) are returned as errors, which
//! Wasmtime turns into guest traps; the runtime recovers the `HostError` from
//! the trap.

use wasmtime::{Caller, Linker, Memory};

use zina_hostapi::{HostApi, HostError, RequestDescriptor, StatusCode};

use crate::error::SandboxError;
use crate::host_impl::HostState;
use crate::memory;

/// Import module name the guest links against.
pub const HOST_MODULE: &str = "zina_host";

/// Get the guest's exported memory from a Caller.
fn get_memory(caller: &mut Caller<'_, HostState>) -> anyhow::Result<Memory> {
    caller
        .get_export("memory")
        .and_then(|e| e.into_memory())
        .ok_or_else(|| HostError::Internal("guest exports no memory".into()).into())
}

/// Decode a nul-terminated string argument.
fn read_string(
    caller: &Caller<'_, HostState>,
    mem: &Memory,
    ptr: i32,
) -> Result<String, HostError> {
    let max_len = caller.data().max_string_len;
    memory::read_c_string(mem.data(caller), ptr, max_len)
}

/// Copy `bytes` plus a terminator into a fresh arena buffer; return its handle.
///
/// Failure to grow memory is fatal.
fn marshal(
    caller: &mut Caller<'_, HostState>,
    mem: &Memory,
    bytes: &[u8],
) -> Result<i32, HostError> {
    let buf = memory::terminated(bytes);
    let mem_size = mem.data_size(&*caller);
    let reservation = caller.data().arena.reserve(buf.len(), mem_size);

    if reservation.grow_pages > 0 && mem.grow(&mut *caller, reservation.grow_pages).is_err() {
        return Err(HostError::OutOfMemory {
            requested: buf.len(),
        });
    }

    memory::write_bytes(mem.data_mut(&mut *caller), reservation.ptr as i32, &buf)?;
    Ok(caller.data_mut().arena.commit(reservation) as i32)
}

fn write_status(
    caller: &mut Caller<'_, HostState>,
    mem: &Memory,
    slot: i32,
    status: i32,
) -> Result<(), HostError> {
    memory::write_i32(mem.data_mut(&mut *caller), slot, status)
}

/// Register all `zina_host` functions with the linker.
pub fn register_host_functions(linker: &mut Linker<HostState>) -> Result<(), SandboxError> {
    register_http_request(linker)?;
    register_make_read_notification(linker)?;
    register_mount_filesystem(linker)?;
    register_buffer_release(linker)?;
    register_fs_read(linker)?;
    register_fs_write(linker)?;
    register_fs_unlink(linker)?;
    register_log(linker)?;
    Ok(())
}

// ── Request bridge ──

fn register_http_request(linker: &mut Linker<HostState>) -> Result<(), SandboxError> {
    linker.func_wrap(
        HOST_MODULE,
        "http_request",
        |mut caller: Caller<'_, HostState>,
         url_ptr: i32,
         method_ptr: i32,
         body_ptr: i32,
         status_out: i32|
         -> anyhow::Result<i32> {
            let mem = get_memory(&mut caller)?;

            // Without a status slot there is nowhere to report anything.
            memory::validate_range(mem.data_size(&caller), status_out, 4)?;

            let decoded = (|| {
                let url = read_string(&caller, &mem, url_ptr)?;
                let method = read_string(&caller, &mem, method_ptr)?;
                let body = read_string(&caller, &mem, body_ptr)?;
                RequestDescriptor::new(url, &method, body).ok_or_else(HostError::invalid_input)
            })();

            let request = match decoded {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(error = %e, "rejected http_request with undecodable input");
                    write_status(&mut caller, &mem, status_out, StatusCode::InvalidInput.as_i32())?;
                    return Ok(0);
                }
            };

            // Blocks until the exchange completes.
            let envelope = caller.data_mut().http_request(&request);

            write_status(&mut caller, &mem, status_out, envelope.status_code)?;
            Ok(marshal(&mut caller, &mem, envelope.body.as_bytes())?)
        },
    )?;
    Ok(())
}

// ── Notification builder ──

fn register_make_read_notification(linker: &mut Linker<HostState>) -> Result<(), SandboxError> {
    linker.func_wrap(
        HOST_MODULE,
        "make_read_notification",
        |mut caller: Caller<'_, HostState>| -> anyhow::Result<i32> {
            let mem = get_memory(&mut caller)?;
            let json = caller
                .data()
                .make_read_notification()
                .to_json()
                .map_err(|e| HostError::Internal(format!("notification encoding: {e}")))?;
            Ok(marshal(&mut caller, &mem, json.as_bytes())?)
        },
    )?;
    Ok(())
}

// ── Filesystem ──

fn register_mount_filesystem(linker: &mut Linker<HostState>) -> Result<(), SandboxError> {
    linker.func_wrap(
        HOST_MODULE,
        "mount_filesystem",
        |mut caller: Caller<'_, HostState>| -> anyhow::Result<()> {
            caller.data_mut().mount_filesystem()?;
            Ok(())
        },
    )?;
    Ok(())
}

fn register_fs_read(linker: &mut Linker<HostState>) -> Result<(), SandboxError> {
    linker.func_wrap(
        HOST_MODULE,
        "fs_read",
        |mut caller: Caller<'_, HostState>, path_ptr: i32, len_out: i32| -> anyhow::Result<i32> {
            let mem = get_memory(&mut caller)?;
            memory::validate_range(mem.data_size(&caller), len_out, 4)?;

            let contents = read_string(&caller, &mem, path_ptr)
                .and_then(|path| caller.data().read_file(&path))
                .and_then(|bytes| Ok((memory::guest_len(bytes.len())?, bytes)));

            match contents {
                Ok((len, bytes)) => {
                    let handle = marshal(&mut caller, &mem, &bytes)?;
                    write_status(&mut caller, &mem, len_out, len)?;
                    Ok(handle)
                }
                Err(e) => {
                    tracing::debug!(error = %e, "fs_read failed");
                    write_status(&mut caller, &mem, len_out, e.to_status())?;
                    Ok(0)
                }
            }
        },
    )?;
    Ok(())
}

fn register_fs_write(linker: &mut Linker<HostState>) -> Result<(), SandboxError> {
    linker.func_wrap(
        HOST_MODULE,
        "fs_write",
        |mut caller: Caller<'_, HostState>,
         path_ptr: i32,
         data_ptr: i32,
         data_len: i32|
         -> i32 {
            let mem = match get_memory(&mut caller) {
                Ok(m) => m,
                Err(_) => return StatusCode::IoError.as_i32(),
            };

            let result = read_string(&caller, &mem, path_ptr).and_then(|path| {
                let data = memory::read_bytes(mem.data(&caller), data_ptr, data_len)
                    .map_err(|_| HostError::invalid_input())?;
                caller.data().write_file(&path, &data)
            });

            match result {
                Ok(()) => StatusCode::Ok.as_i32(),
                Err(e) => {
                    tracing::debug!(error = %e, "fs_write failed");
                    e.to_status()
                }
            }
        },
    )?;
    Ok(())
}

fn register_fs_unlink(linker: &mut Linker<HostState>) -> Result<(), SandboxError> {
    linker.func_wrap(
        HOST_MODULE,
        "fs_unlink",
        |mut caller: Caller<'_, HostState>, path_ptr: i32| -> i32 {
            let mem = match get_memory(&mut caller) {
                Ok(m) => m,
                Err(_) => return StatusCode::IoError.as_i32(),
            };

            let result = read_string(&caller, &mem, path_ptr)
                .and_then(|path| caller.data().unlink_file(&path));

            match result {
                Ok(()) => StatusCode::Ok.as_i32(),
                Err(e) => e.to_status(),
            }
        },
    )?;
    Ok(())
}

// ── Boundary memory management ──

fn register_buffer_release(linker: &mut Linker<HostState>) -> Result<(), SandboxError> {
    linker.func_wrap(
        HOST_MODULE,
        "buffer_release",
        |mut caller: Caller<'_, HostState>, handle: i32| -> i32 {
            match caller.data_mut().arena.release(handle as u32) {
                Ok(_) => StatusCode::Ok.as_i32(),
                Err(e) => {
                    tracing::warn!(handle, "release of unknown buffer handle");
                    e.to_status()
                }
            }
        },
    )?;
    Ok(())
}

// ── Logging ──

fn register_log(linker: &mut Linker<HostState>) -> Result<(), SandboxError> {
    linker.func_wrap(
        HOST_MODULE,
        "log",
        |mut caller: Caller<'_, HostState>, level: i32, msg_ptr: i32| -> i32 {
            let mem = match get_memory(&mut caller) {
                Ok(m) => m,
                Err(_) => return StatusCode::IoError.as_i32(),
            };

            match read_string(&caller, &mem, msg_ptr) {
                Ok(message) => {
                    caller.data().log(level, &message);
                    StatusCode::Ok.as_i32()
                }
                Err(e) => e.to_status(),
            }
        },
    )?;
    Ok(())
}
