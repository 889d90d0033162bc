// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for execution context lifecycle events.
//!
//! This module contains message types for logging events related to:
//! * Context creation and creation failures
//! * Rejected re-entry into exclusive contexts
//! * Pool shutdown and per-context teardown

use crate::observability::messages::{tenant_label, StructuredLog};
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A new execution context was created for a tenant.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use tenant_host::observability::messages::pool::ContextCreated;
///
/// let msg = ContextCreated { tenant: "shop", sequence: 3 };
/// tracing::info!("{}", msg);
/// ```
pub struct ContextCreated<'a> {
    pub tenant: &'a str,
    pub sequence: u64,
}

impl Display for ContextCreated<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Created execution context for tenant {} (#{})",
            tenant_label(self.tenant),
            self.sequence
        )
    }
}

impl StructuredLog for ContextCreated<'_> {
    fn log(&self) {
        tracing::info!(tenant = self.tenant, sequence = self.sequence, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "context",
            span_name = name,
            tenant = self.tenant,
            sequence = self.sequence
        )
    }
}

/// Creating an execution context failed. The tenant is retried on its next
/// request.
///
/// # Log Level
/// `error!` - Failure requiring attention
pub struct ContextCreationFailed<'a> {
    pub tenant: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for ContextCreationFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Failed to create execution context for tenant {}: {}",
            tenant_label(self.tenant),
            self.error
        )
    }
}

impl StructuredLog for ContextCreationFailed<'_> {
    fn log(&self) {
        tracing::error!(
            tenant = self.tenant,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!("context", span_name = name, tenant = self.tenant)
    }
}

/// A thread tried to enter an exclusive context it already holds.
///
/// # Log Level
/// `warn!` - Handler or embedder bug, the request fails
pub struct ReentryRejected<'a> {
    pub tenant: &'a str,
}

impl Display for ReentryRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Rejected nested entry into execution context for tenant {}",
            tenant_label(self.tenant)
        )
    }
}

impl StructuredLog for ReentryRejected<'_> {
    fn log(&self) {
        tracing::warn!(tenant = self.tenant, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("context", span_name = name, tenant = self.tenant)
    }
}

/// Pool shutdown started.
///
/// # Log Level
/// `info!` - Important operational event
pub struct PoolShutdownStarted {
    pub contexts: usize,
}

impl Display for PoolShutdownStarted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Shutting down {} execution contexts", self.contexts)
    }
}

impl StructuredLog for PoolShutdownStarted {
    fn log(&self) {
        tracing::info!(contexts = self.contexts, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!("shutdown", span_name = name, contexts = self.contexts)
    }
}

/// One context finished teardown.
///
/// # Log Level
/// `debug!` - Per-context detail
pub struct ContextDisposed<'a> {
    pub tenant: &'a str,
    pub workers_joined: usize,
    pub hooks_run: usize,
}

impl Display for ContextDisposed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Disposed execution context for tenant {}: joined {} workers, ran {} exit hooks",
            tenant_label(self.tenant),
            self.workers_joined,
            self.hooks_run
        )
    }
}

impl StructuredLog for ContextDisposed<'_> {
    fn log(&self) {
        tracing::debug!(
            tenant = self.tenant,
            workers_joined = self.workers_joined,
            hooks_run = self.hooks_run,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("context", span_name = name, tenant = self.tenant)
    }
}

/// An exit hook or background worker failed during teardown. Teardown
/// continues.
///
/// # Log Level
/// `warn!` - Degraded shutdown
pub struct TeardownStepFailed<'a> {
    pub tenant: &'a str,
    pub step: &'a str,
    pub reason: &'a str,
}

impl Display for TeardownStepFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Teardown of tenant {} hit a failing {}: {}",
            tenant_label(self.tenant),
            self.step,
            self.reason
        )
    }
}

impl StructuredLog for TeardownStepFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            tenant = self.tenant,
            step = self.step,
            reason = self.reason,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("context", span_name = name, tenant = self.tenant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tenant_label() {
        let msg = ContextCreated {
            tenant: "",
            sequence: 1,
        };
        assert_eq!(
            msg.to_string(),
            "Created execution context for tenant <default> (#1)"
        );
    }

    #[test]
    fn test_context_disposed_display() {
        let msg = ContextDisposed {
            tenant: "shop",
            workers_joined: 2,
            hooks_run: 1,
        };
        assert!(msg.to_string().contains("joined 2 workers, ran 1 exit hooks"));
    }
}
