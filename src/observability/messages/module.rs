// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for handler module loading and resolution events.
//!
//! This module contains message types for logging events related to:
//! * Module loading, reloading and load failures
//! * WASM binary validation and compilation
//! * Entry point resolution failures

use crate::observability::messages::{tenant_label, StructuredLog};
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A handler module was loaded into a tenant's context.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use tenant_host::observability::messages::module::ModuleLoaded;
///
/// let msg = ModuleLoaded {
///     tenant: "shop",
///     module_id: "/srv/shop/site.wasm",
///     entries: 4,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct ModuleLoaded<'a> {
    pub tenant: &'a str,
    pub module_id: &'a str,
    pub entries: usize,
}

impl Display for ModuleLoaded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Loaded module {} for tenant {} ({} namespace entries)",
            self.module_id,
            tenant_label(self.tenant),
            self.entries
        )
    }
}

impl StructuredLog for ModuleLoaded<'_> {
    fn log(&self) {
        tracing::info!(
            tenant = self.tenant,
            module_id = self.module_id,
            entries = self.entries,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "module",
            span_name = name,
            tenant = self.tenant,
            module_id = self.module_id
        )
    }
}

/// A cached module was evicted because reload was requested.
///
/// # Log Level
/// `debug!` - Expected when reloading is switched on
pub struct ModuleEvicted<'a> {
    pub tenant: &'a str,
    pub module_id: &'a str,
}

impl Display for ModuleEvicted<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Evicted module {} from tenant {} for reload",
            self.module_id,
            tenant_label(self.tenant)
        )
    }
}

impl StructuredLog for ModuleEvicted<'_> {
    fn log(&self) {
        tracing::debug!(tenant = self.tenant, module_id = self.module_id, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "module",
            span_name = name,
            tenant = self.tenant,
            module_id = self.module_id
        )
    }
}

/// Loading a module failed.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use tenant_host::observability::messages::module::ModuleLoadFailed;
///
/// let error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
/// let msg = ModuleLoadFailed {
///     tenant: "",
///     module_id: "missing.wasm",
///     error: &error,
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct ModuleLoadFailed<'a> {
    pub tenant: &'a str,
    pub module_id: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for ModuleLoadFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Failed to load module {} for tenant {}: {}",
            self.module_id,
            tenant_label(self.tenant),
            self.error
        )
    }
}

impl StructuredLog for ModuleLoadFailed<'_> {
    fn log(&self) {
        tracing::error!(
            tenant = self.tenant,
            module_id = self.module_id,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "module",
            span_name = name,
            tenant = self.tenant,
            module_id = self.module_id
        )
    }
}

/// WASM module compiled on a tenant engine.
///
/// # Log Level
/// `debug!` - Loader detail
pub struct WasmModuleCompiled<'a> {
    pub module_path: &'a str,
    pub size_bytes: usize,
    pub handlers: usize,
}

impl Display for WasmModuleCompiled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Compiled WASM module: {} ({} bytes, {} handler exports)",
            self.module_path, self.size_bytes, self.handlers
        )
    }
}

impl StructuredLog for WasmModuleCompiled<'_> {
    fn log(&self) {
        tracing::debug!(
            module_path = self.module_path,
            size_bytes = self.size_bytes,
            handlers = self.handlers,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("wasm", span_name = name, module_path = self.module_path)
    }
}

/// WASM module rejected before compilation.
///
/// # Log Level
/// `warn!` - Invalid input
pub struct WasmModuleRejected<'a> {
    pub module_path: &'a str,
    pub reason: &'a str,
}

impl Display for WasmModuleRejected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Rejected WASM module {}: {}",
            self.module_path, self.reason
        )
    }
}

impl StructuredLog for WasmModuleRejected<'_> {
    fn log(&self) {
        tracing::warn!(
            module_path = self.module_path,
            reason = self.reason,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("wasm", span_name = name, module_path = self.module_path)
    }
}
