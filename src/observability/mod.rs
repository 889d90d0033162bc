// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability: structured log messages and subscriber setup.
//!
//! Every log site in the host goes through a message type from
//! [`messages`]. Each one implements `Display` for the human-readable line and
//! [`messages::StructuredLog`] to emit the same event with structured fields.
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::pool` - Execution context creation, entry and shutdown
//! * `messages::module` - Handler module loading and resolution
//! * `messages::request` - Request bridge outcomes and handler diagnostics
//!
//! # Usage
//!
//! ```rust
//! use tenant_host::observability::messages::pool::ContextCreated;
//! use tenant_host::observability::messages::StructuredLog;
//!
//! ContextCreated { tenant: "shop", sequence: 1 }.log();
//! ```

pub mod messages;

use tracing_subscriber::EnvFilter;

/// Install a global fmt subscriber writing to stderr.
///
/// `RUST_LOG` wins over `default_filter`. Returns false when a subscriber was
/// already installed, which is harmless in tests and embedders.
pub fn init_tracing(default_filter: &str) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .is_ok()
}
