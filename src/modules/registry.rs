// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::context::{Isolate, StopSignal, TenantId};
use crate::environ::Environ;
use crate::errors::{AppError, HostError};
use crate::handler::{Application, Body, StartResponse};
use crate::modules::{LoadedModule, ModuleLoader, ModuleSource};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

type ModuleFactory = dyn Fn(&mut ModuleBuilder<'_>) -> Result<(), String> + Send + Sync;

/// What a native module factory gets to work with while its module loads.
pub struct ModuleBuilder<'a> {
    isolate: &'a mut Isolate,
    module: LoadedModule,
}

impl ModuleBuilder<'_> {
    pub fn source(&self) -> &ModuleSource {
        self.module.source()
    }

    pub fn tenant(&self) -> &TenantId {
        self.isolate.tenant()
    }

    pub fn resolve_relative(&self, relative: impl AsRef<Path>) -> PathBuf {
        self.module.source().resolve_relative(relative)
    }

    pub fn handler(&mut self, name: &str, handler: Arc<dyn Application>) {
        self.module.define_handler(name, handler);
    }

    pub fn handler_fn<F>(&mut self, name: &str, f: F)
    where
        F: Fn(&mut Environ, &mut StartResponse<'_>) -> Result<Body, AppError>
            + Send
            + Sync
            + 'static,
    {
        self.module.define_handler(name, Arc::new(f));
    }

    pub fn value(&mut self, name: &str, description: &str) {
        self.module.define_value(name, description);
    }

    /// Run `hook` when the tenant's context is torn down.
    pub fn on_exit<F>(&mut self, hook: F)
    where
        F: FnOnce() -> Result<(), String> + Send + 'static,
    {
        self.isolate.register_exit_hook(hook);
    }

    /// Start a background worker owned by the tenant's context.
    pub fn spawn_worker<F>(&mut self, name: &str, work: F) -> Result<(), String>
    where
        F: FnOnce(StopSignal) + Send + 'static,
    {
        self.isolate
            .spawn_worker(name, work)
            .map_err(|e| format!("cannot start worker '{}': {}", name, e))
    }
}

/// Registry of in-process modules.
///
/// Each registered factory runs on every load of its module, so a reload
/// yields new handler instances. Lookup is by module id, then by resolved
/// path.
#[derive(Default, Clone)]
pub struct NativeRegistry {
    factories: HashMap<String, Arc<ModuleFactory>>,
}

impl NativeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, module_id: impl Into<String>, factory: F)
    where
        F: Fn(&mut ModuleBuilder<'_>) -> Result<(), String> + Send + Sync + 'static,
    {
        self.factories.insert(module_id.into(), Arc::new(factory));
    }

    pub fn with_module<F>(mut self, module_id: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&mut ModuleBuilder<'_>) -> Result<(), String> + Send + Sync + 'static,
    {
        self.register(module_id, factory);
        self
    }

    pub fn contains(&self, module_id: &str) -> bool {
        self.factories.contains_key(module_id)
    }

    pub fn module_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    fn factory_for(&self, source: &ModuleSource) -> Option<&Arc<ModuleFactory>> {
        self.factories.get(source.module_id()).or_else(|| {
            self.factories
                .get(source.path().to_string_lossy().as_ref())
        })
    }
}

impl ModuleLoader for NativeRegistry {
    fn load(&self, isolate: &mut Isolate, source: &ModuleSource) -> Result<LoadedModule, HostError> {
        let factory = self
            .factory_for(source)
            .ok_or_else(|| source.load_error("no native module registered under this id"))?;

        let mut builder = ModuleBuilder {
            isolate,
            module: LoadedModule::new(source.clone()),
        };
        factory(&mut builder).map_err(|cause| source.load_error(cause))?;
        Ok(builder.module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmtime::Engine;

    #[test]
    fn test_factory_populates_namespace_and_isolate() {
        let registry = NativeRegistry::new().with_module("site/app.py", |module| {
            let templates = module.resolve_relative("templates");
            module.value("TEMPLATES", &templates.to_string_lossy());
            module.handler_fn("application", |_environ, start_response| {
                start_response.set_response("204 No Content", vec![], None)?;
                Ok(Body::empty())
            });
            module.on_exit(|| Ok(()));
            Ok(())
        });

        let mut isolate = Isolate::new(TenantId::from("t"), Engine::default());
        let source = ModuleSource::new("site/app.py", "/srv/site/app.py");
        let module = registry.load(&mut isolate, &source).unwrap();

        assert_eq!(module.names(), vec!["TEMPLATES", "application"]);
        assert!(module.handler("application").is_ok());
        assert_eq!(isolate.exit_hook_count(), 1);
    }

    #[test]
    fn test_lookup_falls_back_to_path() {
        let registry = NativeRegistry::new().with_module("/srv/app.py", |_| Ok(()));
        let mut isolate = Isolate::new(TenantId::from("t"), Engine::default());
        let source = ModuleSource::new("app.py", "/srv/app.py");
        assert!(registry.load(&mut isolate, &source).is_ok());
    }

    #[test]
    fn test_factory_error_is_load_error() {
        let registry =
            NativeRegistry::new().with_module("bad.py", |_| Err("syntax error on line 3".to_string()));
        let mut isolate = Isolate::new(TenantId::from("t"), Engine::default());
        let source = ModuleSource::new("bad.py", "bad.py");

        match registry.load(&mut isolate, &source) {
            Err(HostError::ModuleLoad { module_id, cause }) => {
                assert_eq!(module_id, "bad.py");
                assert_eq!(cause, "syntax error on line 3");
            }
            _ => panic!("expected a module load error"),
        }
    }
}
