// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Core WASM handler modules.
//!
//! A `.wasm` module is compiled on the tenant's own engine. Every export with
//! the signature `(i32, i32, i32) -> i32` becomes a handler; other exports are
//! recorded as plain values. Handlers exchange JSON envelopes with the host
//! through the module's linear memory:
//!
//! * host calls `allocate(len)` and writes the request envelope there
//! * host calls `handler(ptr, len, out_len_ptr)`
//! * the module returns a pointer to the response envelope and stores its
//!   length (little-endian i32) at `out_len_ptr`
//! * host frees every buffer with `deallocate(ptr, len)`
//!
//! Component Model binaries are rejected.

mod application;
mod detector;
mod error;
mod loader;

pub use application::WasmApplication;
pub use detector::{detect_encoding, WasmEncoding};
pub use error::{WasmError, WasmResult};
pub use loader::WasmModuleLoader;

#[cfg(test)]
pub(crate) mod test_support;
