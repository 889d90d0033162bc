// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::bridge::fallback::write_fallback;
use crate::bridge::request::{Failure, Request, RequestInfo};
use crate::config::consts::{
    ENTRY_POINT_CONFIG_KEY, RELOAD_CONFIG_KEY, RELOAD_ENABLED_VALUE, TENANT_CONFIG_KEY,
};
use crate::config::{HandlerSpec, HostConfig};
use crate::context::{
    ContextPool, ContextState, IsolateFactory, ShutdownReport, TenantId, WasmIsolateFactory,
};
use crate::environ::{self, BuildOptions};
use crate::errors::HostError;
use crate::handler::Application;
use crate::modules::wasm::WasmModuleLoader;
use crate::modules::{DispatchLoader, ModuleLoader, ModuleSource, NativeRegistry};
use crate::observability::messages::request::{RequestCompleted, RequestDispatched, RequestFailed};
use crate::observability::messages::StructuredLog;
use crate::transport::Transport;
use crate::utils::lock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;

/// Where one request is routed.
struct Route {
    tenant: TenantId,
    module_id: String,
    entry_point: String,
    reload: bool,
}

/// The request-dispatch host.
///
/// Owns the context pool and the module loader. Requests arrive through
/// [`handle`](Host::handle) on caller threads, or through
/// [`handle_async`](Host::handle_async) on tokio's blocking pool.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use tenant_host::handler::Body;
/// use tenant_host::modules::NativeRegistry;
/// use tenant_host::transport::{MemoryTransport, Transport};
/// use tenant_host::Host;
///
/// let registry = NativeRegistry::new().with_module("hello.py", |module| {
///     module.handler_fn("application", |_environ, start_response| {
///         start_response.set_response("200 OK", vec![], None)?;
///         Ok(Body::once("hello"))
///     });
///     Ok(())
/// });
/// let host = Host::builder().native(registry).build();
///
/// let memory = Arc::new(MemoryTransport::new().with_script_filename("hello.py"));
/// host.handle(memory.clone()).unwrap();
/// assert_eq!(memory.body(), b"hello");
/// host.shutdown();
/// ```
pub struct Host {
    config: HostConfig,
    pool: ContextPool,
    loader: Arc<dyn ModuleLoader>,
    handler_override: Option<HandlerSpec>,
    initialized: Mutex<bool>,
    next_request: AtomicU64,
}

impl Host {
    /// A host with one fuel-metered wasmtime engine per tenant.
    pub fn new(config: HostConfig, loader: impl ModuleLoader + 'static) -> Self {
        let factory = WasmIsolateFactory::from_config(&config.wasm);
        Self::from_parts(config, Arc::new(loader), Box::new(factory))
    }

    pub fn builder() -> HostBuilder {
        HostBuilder::default()
    }

    fn from_parts(
        config: HostConfig,
        loader: Arc<dyn ModuleLoader>,
        factory: Box<dyn IsolateFactory>,
    ) -> Self {
        let handler_override = config.handler_override();
        Self {
            config,
            pool: ContextPool::with_boxed_factory(factory),
            loader,
            handler_override,
            initialized: Mutex::new(false),
            next_request: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn pool(&self) -> &ContextPool {
        &self.pool
    }

    /// Create the default context and preload the configured handler.
    ///
    /// Idempotent. A failure leaves the host uninitialized, so the next call
    /// (or the next request) tries again.
    pub fn init(&self) -> Result<(), HostError> {
        let mut initialized = lock(&self.initialized);
        if *initialized {
            return Ok(());
        }

        let tenant = TenantId::default_tenant();
        let (lease, _) = self.pool.acquire(&tenant)?;
        if let Some(spec) = &self.handler_override {
            let guard = self.pool.enter(&lease)?;
            let source = self.module_source(&spec.module_id);
            let entry_point = self.override_entry_point(spec);
            guard.with_state(|state| {
                let ContextState { isolate, handlers } = state;
                handlers
                    .resolve(isolate, self.loader.as_ref(), &source, Some(entry_point), false)
                    .map(|_| ())
            })??;
        }

        *initialized = true;
        Ok(())
    }

    /// Serve one request.
    ///
    /// Every per-request failure is absorbed here: before headers went out
    /// the client gets the fixed 500 response, after that the response is
    /// cut short. `Err` means the 500 response itself could not be written.
    pub fn handle(&self, transport: Arc<dyn Transport>) -> Result<(), HostError> {
        let request_id = self.next_request.fetch_add(1, Ordering::AcqRel) + 1;
        let outcome = self.dispatch(request_id, &transport);
        transport.set_request_data(None);

        let failure = match outcome {
            Ok(()) => return Ok(()),
            Err(failure) => failure,
        };

        let tenant = self.routed_tenant(transport.as_ref());
        RequestFailed {
            request_id,
            tenant: tenant.as_str(),
            stage: failure.stage,
            headers_sent: failure.headers_sent,
            error: &failure.error,
        }
        .log();

        if !failure.headers_sent {
            write_fallback(transport.as_ref())?;
        }
        Ok(())
    }

    /// [`handle`](Host::handle) on tokio's blocking pool.
    pub async fn handle_async(self: &Arc<Self>, transport: Arc<dyn Transport>) -> Result<(), HostError> {
        let host = Arc::clone(self);
        tokio::task::spawn_blocking(move || host.handle(transport))
            .await
            .map_err(|e| HostError::Join(e.to_string()))?
    }

    /// Tear down every context in creation order. Later requests get the
    /// fallback response.
    pub fn shutdown(&self) -> ShutdownReport {
        self.pool.shutdown()
    }

    fn dispatch(&self, request_id: u64, transport: &Arc<dyn Transport>) -> Result<(), Failure> {
        self.init().map_err(|e| Failure::early("init", e))?;
        let started = Instant::now();

        let route = self.route(transport.as_ref())?;
        let (lease, created) = self
            .pool
            .acquire(&route.tenant)
            .map_err(|e| Failure::early("context", e))?;
        let guard = self
            .pool
            .enter(&lease)
            .map_err(|e| Failure::early("context", e))?;

        // A fresh context has an empty cache; reloading there would be redundant.
        let reload = route.reload && !created;
        let source = self.module_source(&route.module_id);
        let handler: Arc<dyn Application> = guard
            .with_state(|state| {
                let ContextState { isolate, handlers } = state;
                handlers.resolve(
                    isolate,
                    self.loader.as_ref(),
                    &source,
                    Some(&route.entry_point),
                    reload,
                )
            })
            .and_then(|resolved| resolved)
            .map_err(|e| Failure::early("resolve", e))?;

        transport.set_request_data(Some(Arc::new(RequestInfo {
            request_id,
            tenant: route.tenant.as_str().to_string(),
            module_id: route.module_id.clone(),
            entry_point: route.entry_point.clone(),
            started,
        })));
        RequestDispatched {
            request_id,
            tenant: route.tenant.as_str(),
            module_id: &route.module_id,
            entry_point: &route.entry_point,
        }
        .log();

        let options = BuildOptions::from_config(&self.config, route.tenant.as_str());
        let environ = environ::build(transport.clone(), &options)
            .map_err(|e| Failure::early("environ", HostError::from(e)))?;

        let mut request = Request::new(request_id, transport.clone(), environ);
        let completed = request.run(handler.as_ref())?;
        drop(request);
        self.pool.leave(guard);

        RequestCompleted {
            request_id,
            status: completed.status,
            body_bytes: completed.body_bytes,
            duration: started.elapsed(),
        }
        .log();
        Ok(())
    }

    fn route(&self, transport: &dyn Transport) -> Result<Route, Failure> {
        if let Some(spec) = &self.handler_override {
            return Ok(Route {
                tenant: self.routed_tenant(transport),
                module_id: spec.module_id.clone(),
                entry_point: self.override_entry_point(spec).to_string(),
                reload: false,
            });
        }

        let module_id = transport.script_filename().ok_or_else(|| {
            Failure::early(
                "routing",
                HostError::Protocol("request names no script filename".to_string()),
            )
        })?;
        let tenant = self.routed_tenant(transport);
        let entry_point = transport
            .config(ENTRY_POINT_CONFIG_KEY)
            .filter(|entry| !entry.is_empty())
            .unwrap_or_else(|| self.config.get_default_entry_point().to_string());
        let reload = self.config.get_reload()
            || transport.config(RELOAD_CONFIG_KEY).as_deref() == Some(RELOAD_ENABLED_VALUE);

        Ok(Route {
            tenant,
            module_id,
            entry_point,
            reload,
        })
    }

    /// The tenant a request runs under. An override pins every request to
    /// the default tenant.
    fn routed_tenant(&self, transport: &dyn Transport) -> TenantId {
        if self.handler_override.is_some() {
            return TenantId::default_tenant();
        }
        TenantId::from_group(transport.config(TENANT_CONFIG_KEY).as_deref())
    }

    fn module_source(&self, module_id: &str) -> ModuleSource {
        ModuleSource::new(module_id, self.config.resolve_module_path(module_id))
    }

    fn override_entry_point<'a>(&'a self, spec: &'a HandlerSpec) -> &'a str {
        spec.entry_point
            .as_deref()
            .unwrap_or_else(|| self.config.get_default_entry_point())
    }
}

/// Builder for [`Host`].
#[derive(Default)]
pub struct HostBuilder {
    config: HostConfig,
    native: NativeRegistry,
    loader: Option<Arc<dyn ModuleLoader>>,
    factory: Option<Box<dyn IsolateFactory>>,
}

impl HostBuilder {
    pub fn config(mut self, config: HostConfig) -> Self {
        self.config = config;
        self
    }

    /// In-process modules, served next to `.wasm` modules.
    pub fn native(mut self, registry: NativeRegistry) -> Self {
        self.native = registry;
        self
    }

    /// Replace the default dispatching loader entirely.
    pub fn loader(mut self, loader: impl ModuleLoader + 'static) -> Self {
        self.loader = Some(Arc::new(loader));
        self
    }

    pub fn isolate_factory(mut self, factory: impl IsolateFactory + 'static) -> Self {
        self.factory = Some(Box::new(factory));
        self
    }

    pub fn build(self) -> Host {
        let loader = self.loader.unwrap_or_else(|| {
            Arc::new(DispatchLoader::new(
                self.native,
                WasmModuleLoader::from_config(&self.config.wasm),
            ))
        });
        let factory = self
            .factory
            .unwrap_or_else(|| Box::new(WasmIsolateFactory::from_config(&self.config.wasm)));
        Host::from_parts(self.config, loader, factory)
    }
}
