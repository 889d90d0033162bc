// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Centralized message types for structured logging.
//!
//! Each message type implements `Display` for consistent human-readable
//! output and [`StructuredLog`] for emitting it with typed fields.
//!
//! # Organization
//!
//! * `pool` - Execution context lifecycle events
//! * `module` - Module loading and handler resolution events
//! * `request` - Request bridge events
//!
//! # Usage Pattern
//!
//! ```rust
//! use tenant_host::observability::messages::module::ModuleLoaded;
//!
//! let msg = ModuleLoaded {
//!     tenant: "shop",
//!     module_id: "/srv/shop/site.wasm",
//!     entries: 3,
//! };
//!
//! tracing::info!("{}", msg);
//! ```

use tracing::Span;

pub mod module;
pub mod pool;
pub mod request;

/// Emit a message as a structured tracing event, or open a span carrying its
/// fields.
pub trait StructuredLog {
    fn log(&self);

    fn span(&self, name: &str) -> Span;
}

/// Human-readable label for a tenant id; the default tenant is empty.
pub(crate) fn tenant_label(tenant: &str) -> &str {
    if tenant.is_empty() {
        "<default>"
    } else {
        tenant
    }
}
