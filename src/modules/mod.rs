// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Handler modules: loading, per-context caching and entry point resolution.
//!
//! A module is identified by its module id (normally the script filename the
//! transport routes to). Loading produces a [`LoadedModule`] whose namespace
//! maps names to handlers or plain values. The [`HandlerCache`] of each
//! execution context keeps loaded modules for reuse.
//!
//! Loaders:
//! * [`NativeRegistry`] - in-process modules built by registered factories
//! * [`wasm::WasmModuleLoader`] - core WASM modules compiled on the tenant engine
//! * [`DispatchLoader`] - picks one of the above by file extension

mod cache;
mod loader;
mod namespace;
mod registry;
mod source;
pub mod wasm;

pub use cache::HandlerCache;
pub use loader::{DispatchLoader, ModuleLoader};
pub use namespace::{LoadedModule, NamespaceEntry};
pub use registry::{ModuleBuilder, NativeRegistry};
pub use source::ModuleSource;
