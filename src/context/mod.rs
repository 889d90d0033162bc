// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Tenant-scoped execution contexts.
//!
//! Each tenant gets one [`ExecutionContext`], created on first use and kept
//! until [`ContextPool::shutdown`]. A context owns an [`Isolate`] (its own
//! wasmtime engine, exit hooks and background workers) and a handler cache.
//! Work inside a context is bracketed by [`ContextPool::enter`], which admits
//! one thread at a time.

mod gate;
mod isolate;
mod pool;

pub use isolate::{
    create_engine, Isolate, IsolateFactory, StopSignal, WasmIsolateFactory,
};
pub use pool::{
    ContextGuard, ContextLease, ContextPool, ContextState, ExecutionContext, ShutdownReport,
};

use crate::config::consts::{DEFAULT_TENANT, GLOBAL_TENANT_ALIAS};
use std::fmt;

/// Tenant (application group) identifier. The empty id is the default tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TenantId(String);

impl TenantId {
    pub fn new(id: impl Into<String>) -> Self {
        TenantId(id.into())
    }

    pub fn default_tenant() -> Self {
        TenantId(DEFAULT_TENANT.to_string())
    }

    /// Map a transport-supplied group name to a tenant. Absent values and the
    /// `global` alias select the default tenant.
    pub fn from_group(group: Option<&str>) -> Self {
        match group.map(str::trim) {
            None => Self::default_tenant(),
            Some(name) if name.eq_ignore_ascii_case(GLOBAL_TENANT_ALIAS) => {
                Self::default_tenant()
            }
            Some(name) => TenantId(name.to_string()),
        }
    }

    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_TENANT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_default() {
            f.write_str("<default>")
        } else {
            f.write_str(&self.0)
        }
    }
}

impl From<&str> for TenantId {
    fn from(id: &str) -> Self {
        TenantId::new(id)
    }
}

impl From<String> for TenantId {
    fn from(id: String) -> Self {
        TenantId(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_mapping() {
        assert!(TenantId::from_group(None).is_default());
        assert!(TenantId::from_group(Some("global")).is_default());
        assert!(TenantId::from_group(Some("GLOBAL")).is_default());
        assert!(TenantId::from_group(Some("")).is_default());
        assert_eq!(TenantId::from_group(Some("shop")).as_str(), "shop");
    }

    #[test]
    fn test_display() {
        assert_eq!(TenantId::default().to_string(), "<default>");
        assert_eq!(TenantId::from("blog").to_string(), "blog");
    }
}
