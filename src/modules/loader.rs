// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::context::Isolate;
use crate::errors::HostError;
use crate::modules::wasm::WasmModuleLoader;
use crate::modules::{LoadedModule, ModuleSource, NativeRegistry};

/// Loads a module into a tenant's isolate.
///
/// Implementations fail with [`HostError::ModuleLoad`] (see
/// [`ModuleSource::load_error`]).
pub trait ModuleLoader: Send + Sync {
    fn load(&self, isolate: &mut Isolate, source: &ModuleSource) -> Result<LoadedModule, HostError>;
}

/// Sends `.wasm` modules to the WASM loader and everything else to the native
/// registry.
pub struct DispatchLoader {
    native: NativeRegistry,
    wasm: WasmModuleLoader,
}

impl DispatchLoader {
    pub fn new(native: NativeRegistry, wasm: WasmModuleLoader) -> Self {
        Self { native, wasm }
    }

    pub fn native(&self) -> &NativeRegistry {
        &self.native
    }
}

impl Default for DispatchLoader {
    fn default() -> Self {
        Self::new(NativeRegistry::new(), WasmModuleLoader::default())
    }
}

impl ModuleLoader for DispatchLoader {
    fn load(&self, isolate: &mut Isolate, source: &ModuleSource) -> Result<LoadedModule, HostError> {
        if source.is_wasm() && !self.native.contains(source.module_id()) {
            self.wasm.load(isolate, source)
        } else {
            self.native.load(isolate, source)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TenantId;
    use crate::handler::Body;
    use wasmtime::Engine;

    fn isolate() -> Isolate {
        Isolate::new(TenantId::from("t"), Engine::default())
    }

    #[test]
    fn test_registered_wasm_id_stays_native() {
        let native = NativeRegistry::new().with_module("fake.wasm", |module| {
            module.handler_fn("application", |_environ, start_response| {
                start_response.set_response("200 OK", vec![], None)?;
                Ok(Body::empty())
            });
            Ok(())
        });
        let loader = DispatchLoader::new(native, WasmModuleLoader::default());
        let source = ModuleSource::new("fake.wasm", "/nowhere/fake.wasm");

        let module = loader.load(&mut isolate(), &source).unwrap();
        assert!(module.handler("application").is_ok());
    }

    #[test]
    fn test_wasm_ids_go_to_wasm_loader() {
        let loader = DispatchLoader::default();
        let source = ModuleSource::new("gone.wasm", "/nowhere/gone.wasm");

        match loader.load(&mut isolate(), &source) {
            Err(HostError::ModuleLoad { module_id, cause }) => {
                assert_eq!(module_id, "gone.wasm");
                assert!(cause.starts_with("I/O error"), "{cause}");
            }
            _ => panic!("expected a module load error"),
        }
    }

    #[test]
    fn test_other_ids_go_to_native_registry() {
        let loader = DispatchLoader::default();
        let source = ModuleSource::new("app.py", "/nowhere/app.py");

        match loader.load(&mut isolate(), &source) {
            Err(HostError::ModuleLoad { cause, .. }) => {
                assert_eq!(cause, "no native module registered under this id");
            }
            _ => panic!("expected a module load error"),
        }
    }
}
