// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The isolation handle owned by one execution context.
//!
//! An [`Isolate`] carries everything that must not leak between tenants:
//! - its own wasmtime `Engine`, so compiled handler modules stay per tenant
//! - exit hooks registered by modules while loading
//! - background workers started by modules, stopped cooperatively at teardown

use crate::config::WasmConfig;
use crate::context::TenantId;
use crate::errors::HostError;
use std::io;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use wasmtime::{Config, Engine};

type ExitHook = Box<dyn FnOnce() -> Result<(), String> + Send>;

/// Cooperative stop flag handed to background workers.
#[derive(Debug, Clone)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

struct Worker {
    name: String,
    handle: JoinHandle<()>,
}

/// What a teardown did, plus any step that failed.
#[derive(Debug, Default)]
pub(crate) struct DisposeReport {
    pub(crate) workers_joined: usize,
    pub(crate) hooks_run: usize,
    pub(crate) failures: Vec<(String, String)>,
}

pub struct Isolate {
    tenant: TenantId,
    engine: Engine,
    fuel: Option<u64>,
    exit_hooks: Vec<ExitHook>,
    workers: Vec<Worker>,
    stop: Arc<AtomicBool>,
}

impl Isolate {
    /// An isolate on `engine` with no fuel budget. The engine must have been
    /// built without fuel consumption in that case.
    pub fn new(tenant: TenantId, engine: Engine) -> Self {
        Self {
            tenant,
            engine,
            fuel: None,
            exit_hooks: Vec::new(),
            workers: Vec::new(),
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Grant every WASM handler call `fuel` units.
    pub fn with_fuel(mut self, fuel: u64) -> Self {
        self.fuel = Some(fuel);
        self
    }

    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn fuel(&self) -> Option<u64> {
        self.fuel
    }

    pub fn exit_hook_count(&self) -> usize {
        self.exit_hooks.len()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Run `hook` when the context is torn down. Hooks run last-registered
    /// first, after background workers have stopped.
    pub fn register_exit_hook<F>(&mut self, hook: F)
    where
        F: FnOnce() -> Result<(), String> + Send + 'static,
    {
        self.exit_hooks.push(Box::new(hook));
    }

    /// Start a background worker owned by this context. It must return soon
    /// after its [`StopSignal`] reports stopped; teardown joins it.
    pub fn spawn_worker<F>(&mut self, name: &str, work: F) -> io::Result<()>
    where
        F: FnOnce(StopSignal) + Send + 'static,
    {
        let signal = self.stop_signal();
        let handle = thread::Builder::new()
            .name(format!("{}:{}", self.tenant, name))
            .spawn(move || work(signal))?;
        self.workers.push(Worker {
            name: name.to_string(),
            handle,
        });
        Ok(())
    }

    pub fn stop_signal(&self) -> StopSignal {
        StopSignal(self.stop.clone())
    }

    /// Stop and join workers, run exit hooks, then drop the engine.
    pub(crate) fn dispose(mut self) -> DisposeReport {
        let mut report = DisposeReport::default();
        self.stop.store(true, Ordering::Release);

        for worker in self.workers.drain(..) {
            match worker.handle.join() {
                Ok(()) => report.workers_joined += 1,
                Err(_) => report
                    .failures
                    .push((format!("worker {}", worker.name), "panicked".to_string())),
            }
        }

        while let Some(hook) = self.exit_hooks.pop() {
            report.hooks_run += 1;
            match catch_unwind(AssertUnwindSafe(hook)) {
                Ok(Ok(())) => {}
                Ok(Err(reason)) => report.failures.push(("exit hook".to_string(), reason)),
                Err(_) => report
                    .failures
                    .push(("exit hook".to_string(), "panicked".to_string())),
            }
        }

        report
    }
}

/// Builds the isolation handle for a newly created context.
pub trait IsolateFactory: Send + Sync {
    fn create(&self, tenant: &TenantId) -> Result<Isolate, HostError>;
}

impl<F> IsolateFactory for F
where
    F: Fn(&TenantId) -> Result<Isolate, HostError> + Send + Sync,
{
    fn create(&self, tenant: &TenantId) -> Result<Isolate, HostError> {
        self(tenant)
    }
}

/// Default factory: one fuel-metered wasmtime engine per tenant.
#[derive(Debug, Clone)]
pub struct WasmIsolateFactory {
    fuel: u64,
}

impl WasmIsolateFactory {
    pub fn new(fuel: u64) -> Self {
        Self { fuel }
    }

    pub fn from_config(config: &WasmConfig) -> Self {
        Self::new(config.fuel.effective())
    }
}

impl IsolateFactory for WasmIsolateFactory {
    fn create(&self, tenant: &TenantId) -> Result<Isolate, HostError> {
        let engine = create_engine().map_err(|e| HostError::ContextCreation {
            tenant: tenant.as_str().to_string(),
            reason: e.to_string(),
        })?;
        Ok(Isolate::new(tenant.clone(), engine).with_fuel(self.fuel))
    }
}

/// Create the wasmtime engine backing one tenant.
pub fn create_engine() -> wasmtime::Result<Engine> {
    let mut config = Config::new();

    config.wasm_threads(false);
    config.wasm_multi_memory(false);
    config.wasm_memory64(false);
    config.wasm_component_model(false);

    // Every handler call gets a fuel budget; running out traps the call.
    config.consume_fuel(true);
    config.epoch_interruption(false);

    Engine::new(&config)
}
