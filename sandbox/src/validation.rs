//! WASM module validation — ABI compatibility checks.
//!
//! Validates that a compiled module can run against the host bridge before
//! it is accepted. Checks:
//!
//! 1. `memory` and `zina_main` exported, with the right types
//! 2. All imports are functions from the `zina_host` module
//! 3. No WASI imports
//! 4. Every import names a host function with a matching signature

use wasmtime::{ExternType, FuncType, Module, ValType};

use crate::error::SandboxError;
use crate::linker::HOST_MODULE;

/// Guest entry point, `() -> i32`.
pub const ENTRY_POINT: &str = "zina_main";

/// Host functions: (name, i32 param count, i32 result count).
const HOST_FUNCTIONS: &[(&str, usize, usize)] = &[
    ("http_request", 4, 1),
    ("make_read_notification", 0, 1),
    ("mount_filesystem", 0, 0),
    ("buffer_release", 1, 1),
    ("fs_read", 2, 1),
    ("fs_write", 3, 1),
    ("fs_unlink", 1, 1),
    ("log", 2, 1),
];

fn is_i32(vt: &ValType) -> bool {
    matches!(vt, ValType::I32)
}

/// True if `ty` is `(i32 x params) -> (i32 x results)`.
fn has_i32_signature(ty: &FuncType, params: usize, results: usize) -> bool {
    let p: Vec<ValType> = ty.params().collect();
    let r: Vec<ValType> = ty.results().collect();
    p.len() == params && p.iter().all(is_i32) && r.len() == results && r.iter().all(is_i32)
}

/// Validate that a module meets the host bridge ABI.
pub fn validate_module(module: &Module) -> Result<(), SandboxError> {
    validate_exports(module)?;
    validate_imports(module)?;
    Ok(())
}

fn validate_exports(module: &Module) -> Result<(), SandboxError> {
    let has_memory = module
        .exports()
        .any(|e| e.name() == "memory" && matches!(e.ty(), ExternType::Memory(_)));
    if !has_memory {
        return Err(SandboxError::ValidationError(
            "module must export 'memory'".into(),
        ));
    }

    let export = module
        .exports()
        .find(|e| e.name() == ENTRY_POINT)
        .ok_or_else(|| {
            SandboxError::ValidationError(format!("missing required export '{}'", ENTRY_POINT))
        })?;

    match export.ty() {
        ExternType::Func(ft) if has_i32_signature(&ft, 0, 1) => Ok(()),
        ExternType::Func(_) => Err(SandboxError::ValidationError(format!(
            "export '{}' must have signature () -> i32",
            ENTRY_POINT
        ))),
        _ => Err(SandboxError::ValidationError(format!(
            "export '{}' must be a function",
            ENTRY_POINT
        ))),
    }
}

fn validate_imports(module: &Module) -> Result<(), SandboxError> {
    for import in module.imports() {
        let module_name = import.module();

        if module_name.starts_with("wasi") {
            return Err(SandboxError::ValidationError(format!(
                "WASI import not allowed: {}::{}",
                module_name,
                import.name()
            )));
        }

        if module_name != HOST_MODULE {
            return Err(SandboxError::ValidationError(format!(
                "import from unknown module '{}' (only '{}' allowed): {}",
                module_name,
                HOST_MODULE,
                import.name()
            )));
        }

        let func_ty = match import.ty() {
            ExternType::Func(ft) => ft,
            _ => {
                return Err(SandboxError::ValidationError(format!(
                    "non-function import not allowed: {}::{}",
                    module_name,
                    import.name()
                )));
            }
        };

        let &(_, params, results) = HOST_FUNCTIONS
            .iter()
            .find(|(name, _, _)| *name == import.name())
            .ok_or_else(|| {
                SandboxError::ValidationError(format!(
                    "unknown host function: {}::{}",
                    module_name,
                    import.name()
                ))
            })?;

        if !has_i32_signature(&func_ty, params, results) {
            return Err(SandboxError::ValidationError(format!(
                "import '{}' has wrong signature: expected {} i32 params and {} i32 results",
                import.name(),
                params,
                results
            )));
        }
    }

    Ok(())
}
