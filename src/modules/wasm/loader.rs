// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Reading, validating and compiling WASM handler modules.

use super::application::WasmApplication;
use super::detector::detect_encoding;
use super::error::{WasmError, WasmResult};
use crate::config::consts::MAX_WASM_MODULE_SIZE;
use crate::config::WasmConfig;
use crate::context::Isolate;
use crate::errors::HostError;
use crate::modules::{LoadedModule, ModuleLoader, ModuleSource};
use crate::observability::messages::module::{WasmModuleCompiled, WasmModuleRejected};
use crate::observability::messages::StructuredLog;
use std::path::Path;
use std::sync::Arc;
use wasmtime::{ExternType, FuncType, Module};

const MEMORY_EXPORT: &str = "memory";
const ALLOCATE_EXPORT: &str = "allocate";
const DEALLOCATE_EXPORT: &str = "deallocate";

/// Loads `.wasm` handler modules onto the tenant's engine.
#[derive(Debug, Clone)]
pub struct WasmModuleLoader {
    max_module_bytes: usize,
}

impl Default for WasmModuleLoader {
    fn default() -> Self {
        Self::new(MAX_WASM_MODULE_SIZE)
    }
}

impl WasmModuleLoader {
    pub fn new(max_module_bytes: usize) -> Self {
        Self { max_module_bytes }
    }

    pub fn from_config(config: &WasmConfig) -> Self {
        Self::new(config.get_max_module_bytes())
    }

    fn read_bytes(&self, path: &Path) -> WasmResult<Vec<u8>> {
        let bytes = std::fs::read(path)?;
        if bytes.len() > self.max_module_bytes {
            return Err(WasmError::TooLarge {
                size: bytes.len(),
                limit: self.max_module_bytes,
            });
        }
        Ok(bytes)
    }

    fn compile(&self, isolate: &Isolate, source: &ModuleSource) -> WasmResult<LoadedModule> {
        let bytes = self.read_bytes(source.path())?;
        if !detect_encoding(&bytes)?.is_core() {
            return Err(WasmError::UnsupportedEncoding(
                "Component Model binaries cannot be loaded as handlers".to_string(),
            ));
        }

        let module = Module::new(isolate.engine(), &bytes)?;
        let mut loaded = LoadedModule::new(source.clone());
        let mut handlers = 0;

        for export in module.exports() {
            match export.ty() {
                ExternType::Func(func) if is_handler_signature(&func) => {
                    let application = WasmApplication::new(
                        isolate.engine().clone(),
                        module.clone(),
                        export.name(),
                        source.module_id(),
                        isolate.fuel(),
                    );
                    loaded.define_handler(export.name(), Arc::new(application));
                    handlers += 1;
                }
                ExternType::Func(_) => loaded.define_value(export.name(), "function"),
                ExternType::Memory(_) => loaded.define_value(export.name(), "memory"),
                ExternType::Global(_) => loaded.define_value(export.name(), "global"),
                _ => loaded.define_value(export.name(), "export"),
            }
        }

        if handlers > 0 {
            require_abi_exports(&module)?;
        }

        WasmModuleCompiled {
            module_path: &source.path().display().to_string(),
            size_bytes: bytes.len(),
            handlers,
        }
        .log();
        Ok(loaded)
    }
}

impl ModuleLoader for WasmModuleLoader {
    fn load(&self, isolate: &mut Isolate, source: &ModuleSource) -> Result<LoadedModule, HostError> {
        self.compile(isolate, source).map_err(|error| {
            WasmModuleRejected {
                module_path: &source.path().display().to_string(),
                reason: &error.to_string(),
            }
            .log();
            source.load_error(error)
        })
    }
}

/// `(i32, i32, i32) -> i32`
fn is_handler_signature(func: &FuncType) -> bool {
    func.params().len() == 3
        && func.params().all(|p| p.is_i32())
        && func.results().len() == 1
        && func.results().all(|r| r.is_i32())
}

fn require_abi_exports(module: &Module) -> WasmResult<()> {
    match module.get_export(MEMORY_EXPORT) {
        Some(ExternType::Memory(_)) => {}
        _ => return Err(WasmError::Abi("module must export 'memory'".to_string())),
    }

    let allocate_ok = matches!(
        module.get_export(ALLOCATE_EXPORT),
        Some(ExternType::Func(func))
            if func.params().len() == 1
                && func.params().all(|p| p.is_i32())
                && func.results().len() == 1
                && func.results().all(|r| r.is_i32())
    );
    if !allocate_ok {
        return Err(WasmError::Abi(
            "module must export 'allocate' with signature (i32) -> i32".to_string(),
        ));
    }

    let deallocate_ok = matches!(
        module.get_export(DEALLOCATE_EXPORT),
        Some(ExternType::Func(func))
            if func.params().len() == 2
                && func.params().all(|p| p.is_i32())
                && func.results().len() == 0
    );
    if !deallocate_ok {
        return Err(WasmError::Abi(
            "module must export 'deallocate' with signature (i32, i32) -> ()".to_string(),
        ));
    }
    Ok(())
}
