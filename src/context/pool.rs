// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::context::gate::Gate;
use crate::context::{Isolate, IsolateFactory, TenantId};
use crate::errors::HostError;
use crate::modules::HandlerCache;
use crate::observability::messages::pool::{
    ContextCreated, ContextCreationFailed, ContextDisposed, PoolShutdownStarted,
    ReentryRejected, TeardownStepFailed,
};
use crate::observability::messages::StructuredLog;
use crate::utils::lock;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

/// Mutable state of a context, reachable only while the context is entered.
pub struct ContextState {
    pub isolate: Isolate,
    pub handlers: HandlerCache,
}

/// One tenant's execution context. Never recycled: it lives until the pool
/// shuts down.
pub struct ExecutionContext {
    tenant: TenantId,
    sequence: u64,
    gate: Gate,
    state: Mutex<Option<ContextState>>,
    refs: AtomicUsize,
}

impl ExecutionContext {
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// Creation order within the pool, starting at 1.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Outstanding leases. Diagnostic only.
    pub fn ref_count(&self) -> usize {
        self.refs.load(Ordering::Acquire)
    }
}

/// A counted reference to a context, returned by [`ContextPool::acquire`].
pub struct ContextLease {
    context: Arc<ExecutionContext>,
}

impl ContextLease {
    fn new(context: Arc<ExecutionContext>) -> Self {
        context.refs.fetch_add(1, Ordering::AcqRel);
        Self { context }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub fn tenant(&self) -> &TenantId {
        &self.context.tenant
    }

    pub fn same_context(&self, other: &ContextLease) -> bool {
        Arc::ptr_eq(&self.context, &other.context)
    }
}

impl Clone for ContextLease {
    fn clone(&self) -> Self {
        Self::new(self.context.clone())
    }
}

impl Drop for ContextLease {
    fn drop(&mut self) {
        self.context.refs.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Proof of entry into a context. Dropping it leaves the context; it stays on
/// the thread that entered.
pub struct ContextGuard<'a> {
    context: &'a ExecutionContext,
    owner: ThreadId,
    _not_send: PhantomData<*const ()>,
}

impl ContextGuard<'_> {
    pub fn tenant(&self) -> &TenantId {
        &self.context.tenant
    }

    /// Run `f` against the context's isolate and handler cache. Fails once the
    /// context has been torn down.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut ContextState) -> R) -> Result<R, HostError> {
        let mut state = lock(&self.context.state);
        match state.as_mut() {
            Some(state) => Ok(f(state)),
            None => Err(HostError::ShutDown),
        }
    }
}

impl Drop for ContextGuard<'_> {
    fn drop(&mut self) {
        self.context.gate.leave(self.owner);
    }
}

/// Totals from [`ContextPool::shutdown`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Tenants in the order they were torn down (creation order)
    pub tenants: Vec<TenantId>,
    pub workers_joined: usize,
    pub hooks_run: usize,
    pub failures: usize,
}

#[derive(Default)]
struct Slot {
    context: Mutex<Option<Arc<ExecutionContext>>>,
}

/// Owns every tenant's execution context.
///
/// The tenant map is locked only to look up or insert a per-tenant slot;
/// creating a context holds only that tenant's slot, so tenants never wait on
/// each other's creation.
pub struct ContextPool {
    factory: Box<dyn IsolateFactory>,
    slots: Mutex<HashMap<TenantId, Arc<Slot>>>,
    created: Mutex<Vec<Arc<ExecutionContext>>>,
    sequence: AtomicU64,
    closed: AtomicBool,
}

impl ContextPool {
    pub fn new(factory: impl IsolateFactory + 'static) -> Self {
        Self::with_boxed_factory(Box::new(factory))
    }

    pub fn with_boxed_factory(factory: Box<dyn IsolateFactory>) -> Self {
        Self {
            factory,
            slots: Mutex::new(HashMap::new()),
            created: Mutex::new(Vec::new()),
            sequence: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }
    }

    /// The context for `tenant`, creating it on first use. The flag is true
    /// for the caller that created it.
    pub fn acquire(&self, tenant: &TenantId) -> Result<(ContextLease, bool), HostError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(HostError::ShutDown);
        }

        let slot = lock(&self.slots)
            .entry(tenant.clone())
            .or_default()
            .clone();

        let mut cell = lock(&slot.context);
        if let Some(context) = cell.as_ref() {
            return Ok((ContextLease::new(context.clone()), false));
        }

        match self.create(tenant) {
            Ok(context) => {
                *cell = Some(context.clone());
                lock(&self.created).push(context.clone());
                ContextCreated {
                    tenant: tenant.as_str(),
                    sequence: context.sequence,
                }
                .log();
                Ok((ContextLease::new(context), true))
            }
            Err(error) => {
                drop(cell);
                self.discard_empty_slot(tenant, &slot);
                ContextCreationFailed {
                    tenant: tenant.as_str(),
                    error: &error,
                }
                .log();
                Err(error)
            }
        }
    }

    fn create(&self, tenant: &TenantId) -> Result<Arc<ExecutionContext>, HostError> {
        let isolate = self.factory.create(tenant)?;
        let gate = if tenant.is_default() {
            Gate::reentrant()
        } else {
            Gate::exclusive()
        };
        Ok(Arc::new(ExecutionContext {
            tenant: tenant.clone(),
            sequence: self.sequence.fetch_add(1, Ordering::AcqRel) + 1,
            gate,
            state: Mutex::new(Some(ContextState {
                isolate,
                handlers: HandlerCache::new(),
            })),
            refs: AtomicUsize::new(0),
        }))
    }

    fn discard_empty_slot(&self, tenant: &TenantId, slot: &Arc<Slot>) {
        let mut slots = lock(&self.slots);
        let still_empty = slots
            .get(tenant)
            .is_some_and(|current| Arc::ptr_eq(current, slot) && lock(&current.context).is_none());
        if still_empty {
            slots.remove(tenant);
        }
    }

    /// Enter a context, blocking while another thread is inside it.
    ///
    /// The default tenant's context may be re-entered by the thread holding
    /// it; any other context reports nested entry as
    /// [`HostError::ReentrantEntry`].
    pub fn enter<'a>(&self, lease: &'a ContextLease) -> Result<ContextGuard<'a>, HostError> {
        let context: &'a ExecutionContext = &lease.context;
        match context.gate.enter() {
            Ok(owner) => Ok(ContextGuard {
                context,
                owner,
                _not_send: PhantomData,
            }),
            Err(_) => {
                ReentryRejected {
                    tenant: context.tenant.as_str(),
                }
                .log();
                Err(HostError::ReentrantEntry {
                    tenant: context.tenant.as_str().to_string(),
                })
            }
        }
    }

    /// Leave a context entered with [`enter`](Self::enter).
    pub fn leave(&self, guard: ContextGuard<'_>) {
        drop(guard);
    }

    /// Number of live contexts.
    pub fn len(&self) -> usize {
        lock(&self.created).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Tenants with a context, in creation order.
    pub fn tenants(&self) -> Vec<TenantId> {
        lock(&self.created)
            .iter()
            .map(|context| context.tenant.clone())
            .collect()
    }

    /// Outstanding leases on a tenant's context.
    pub fn ref_count(&self, tenant: &TenantId) -> Option<usize> {
        lock(&self.created)
            .iter()
            .find(|context| &context.tenant == tenant)
            .map(|context| context.ref_count())
    }

    pub fn is_shut_down(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Tear down every context in creation order.
    ///
    /// Each context is entered first, so a request still inside it finishes
    /// before its workers are stopped, its exit hooks run and its isolate is
    /// dropped. Must not race with `acquire`; later calls return an empty
    /// report.
    pub fn shutdown(&self) -> ShutdownReport {
        self.closed.store(true, Ordering::Release);
        let contexts = std::mem::take(&mut *lock(&self.created));
        lock(&self.slots).clear();

        PoolShutdownStarted {
            contexts: contexts.len(),
        }
        .log();

        let mut report = ShutdownReport::default();
        for context in contexts {
            let entered = context.gate.enter().ok();
            let state = lock(&context.state).take();

            if let Some(ContextState { isolate, handlers }) = state {
                drop(handlers);
                let disposed = isolate.dispose();
                for (step, reason) in &disposed.failures {
                    TeardownStepFailed {
                        tenant: context.tenant.as_str(),
                        step,
                        reason,
                    }
                    .log();
                }
                ContextDisposed {
                    tenant: context.tenant.as_str(),
                    workers_joined: disposed.workers_joined,
                    hooks_run: disposed.hooks_run,
                }
                .log();
                report.workers_joined += disposed.workers_joined;
                report.hooks_run += disposed.hooks_run;
                report.failures += disposed.failures.len();
            }

            if let Some(owner) = entered {
                context.gate.leave(owner);
            }
            report.tenants.push(context.tenant.clone());
        }
        report
    }
}
