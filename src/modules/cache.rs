// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::DEFAULT_ENTRY_POINT;
use crate::context::Isolate;
use crate::errors::HostError;
use crate::handler::Application;
use crate::modules::{LoadedModule, ModuleLoader, ModuleSource};
use crate::observability::messages::module::{ModuleEvicted, ModuleLoadFailed, ModuleLoaded};
use crate::observability::messages::StructuredLog;
use std::collections::HashMap;
use std::sync::Arc;

/// Loaded modules of one execution context, keyed by module id.
///
/// Only touched while the owning context is entered.
#[derive(Default)]
pub struct HandlerCache {
    modules: HashMap<String, Arc<LoadedModule>>,
}

impl HandlerCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `entry_point` (default `application`) in the module described by
    /// `source`, loading the module if it is not cached.
    ///
    /// `reload` evicts the cached module first. A loaded module is cached even
    /// when the entry point does not resolve, so its load side effects (exit
    /// hooks, workers) happen once per load rather than once per request.
    pub fn resolve(
        &mut self,
        isolate: &mut Isolate,
        loader: &dyn ModuleLoader,
        source: &ModuleSource,
        entry_point: Option<&str>,
        reload: bool,
    ) -> Result<Arc<dyn Application>, HostError> {
        let entry_point = entry_point.unwrap_or(DEFAULT_ENTRY_POINT);
        let module_id = source.module_id();
        let tenant = isolate.tenant().as_str().to_string();

        if reload && self.modules.remove(module_id).is_some() {
            ModuleEvicted {
                tenant: &tenant,
                module_id,
            }
            .log();
        }

        let module = match self.modules.get(module_id) {
            Some(module) => module.clone(),
            None => {
                let module = loader.load(isolate, source).map_err(|error| {
                    ModuleLoadFailed {
                        tenant: &tenant,
                        module_id,
                        error: &error,
                    }
                    .log();
                    error
                })?;
                ModuleLoaded {
                    tenant: &tenant,
                    module_id,
                    entries: module.len(),
                }
                .log();
                let module = Arc::new(module);
                self.modules.insert(module_id.to_string(), module.clone());
                module
            }
        };

        module
            .handler(entry_point)
            .map_err(|reason| HostError::HandlerResolution {
                module_id: module_id.to_string(),
                entry_point: entry_point.to_string(),
                reason,
            })
    }

    pub fn get(&self, module_id: &str) -> Option<Arc<LoadedModule>> {
        self.modules.get(module_id).cloned()
    }

    pub fn contains(&self, module_id: &str) -> bool {
        self.modules.contains_key(module_id)
    }

    pub fn evict(&mut self, module_id: &str) -> bool {
        self.modules.remove(module_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TenantId;
    use crate::handler::Body;
    use crate::modules::NativeRegistry;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wasmtime::Engine;

    fn isolate() -> Isolate {
        Isolate::new(TenantId::from("t"), Engine::default())
    }

    fn counting_registry(loads: Arc<AtomicUsize>) -> NativeRegistry {
        NativeRegistry::new()
            .with_module("app.py", move |module| {
                loads.fetch_add(1, Ordering::SeqCst);
                module.handler_fn("application", |_environ, start_response| {
                    start_response.set_response(200, vec![], None)?;
                    Ok(Body::once("ok"))
                });
                module.value("VERSION", "str");
                Ok(())
            })
    }

    #[test]
    fn test_cached_resolution_returns_same_handler() {
        let loads = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(loads.clone());
        let source = ModuleSource::new("app.py", "app.py");
        let mut cache = HandlerCache::new();
        let mut isolate = isolate();

        let first = cache
            .resolve(&mut isolate, &registry, &source, None, false)
            .unwrap();
        let second = cache
            .resolve(&mut isolate, &registry, &source, Some("application"), false)
            .unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert!(cache.contains("app.py"));
    }

    #[test]
    fn test_reload_returns_fresh_handler() {
        let loads = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(loads.clone());
        let source = ModuleSource::new("app.py", "app.py");
        let mut cache = HandlerCache::new();
        let mut isolate = isolate();

        let first = cache
            .resolve(&mut isolate, &registry, &source, None, false)
            .unwrap();
        let reloaded = cache
            .resolve(&mut isolate, &registry, &source, None, true)
            .unwrap();

        assert!(!Arc::ptr_eq(&first, &reloaded));
        assert_eq!(loads.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_missing_module_is_load_error() {
        let registry = NativeRegistry::new();
        let source = ModuleSource::new("absent.py", "absent.py");
        let mut cache = HandlerCache::new();

        let err = cache
            .resolve(&mut isolate(), &registry, &source, None, false)
            .err()
            .unwrap();
        match err {
            HostError::ModuleLoad { module_id, .. } => assert_eq!(module_id, "absent.py"),
            other => panic!("unexpected error: {}", other),
        }
        assert!(cache.is_empty());
    }

    #[test]
    fn test_absent_or_non_invocable_entry_is_resolution_error() {
        let registry = counting_registry(Arc::new(AtomicUsize::new(0)));
        let source = ModuleSource::new("app.py", "app.py");
        let mut cache = HandlerCache::new();
        let mut isolate = isolate();

        let missing = cache
            .resolve(&mut isolate, &registry, &source, Some("app"), false)
            .err()
            .unwrap();
        assert!(matches!(missing, HostError::HandlerResolution { .. }));

        let value = cache
            .resolve(&mut isolate, &registry, &source, Some("VERSION"), false)
            .err()
            .unwrap();
        match value {
            HostError::HandlerResolution { reason, .. } => {
                assert!(reason.contains("not invocable"))
            }
            other => panic!("unexpected error: {}", other),
        }
        assert!(cache.contains("app.py"));
    }

    #[test]
    fn test_failed_resolution_does_not_reload_module() {
        let loads = Arc::new(AtomicUsize::new(0));
        let registry = counting_registry(loads.clone());
        let source = ModuleSource::new("app.py", "app.py");
        let mut cache = HandlerCache::new();
        let mut isolate = isolate();

        for _ in 0..5 {
            assert!(cache
                .resolve(&mut isolate, &registry, &source, Some("app"), false)
                .is_err());
        }
        assert!(cache
            .resolve(&mut isolate, &registry, &source, None, false)
            .is_ok());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }
}
