// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! WAT fixtures for WASM handler tests.

use std::fs;
use std::path::{Path, PathBuf};

/// Response envelope returned by the fixture's `application` export.
pub(crate) const GREETING_RESPONSE: &str =
    r#"{"status":"200 OK","headers":[["Content-Type","text/plain"]],"body":"hi"}"#;

/// A handler module with a bump allocator:
/// * `application` always answers with [`GREETING_RESPONSE`]
/// * `spin` loops until it runs out of fuel
/// * `overrun` claims an output far larger than its memory
/// * `VERSION` is a plain global
pub(crate) fn greeting_module_wat() -> String {
    format!(
        r#"(module
  (memory (export "memory") 1)
  (global $heap (mut i32) (i32.const 1024))
  (data (i32.const 16) "{escaped}")
  (func (export "allocate") (param $len i32) (result i32)
    (local $ptr i32)
    global.get $heap
    local.set $ptr
    global.get $heap
    local.get $len
    i32.add
    global.set $heap
    local.get $ptr)
  (func (export "deallocate") (param i32 i32))
  (func (export "application") (param $ptr i32) (param $len i32) (param $out i32) (result i32)
    local.get $out
    i32.const {len}
    i32.store
    i32.const 16)
  (func (export "overrun") (param $ptr i32) (param $len i32) (param $out i32) (result i32)
    local.get $out
    i32.const 0x7fffffff
    i32.store
    i32.const 16)
  (func (export "spin") (param i32 i32 i32) (result i32)
    (loop $forever
      br $forever)
    i32.const 0)
  (global (export "VERSION") i32 (i32.const 1)))"#,
        escaped = GREETING_RESPONSE.replace('"', "\\\""),
        len = GREETING_RESPONSE.len(),
    )
}

/// Compile `wat` and write it to `dir/name`.
pub(crate) fn write_module(dir: &Path, name: &str, wat: &str) -> PathBuf {
    let bytes = wat::parse_str(wat).unwrap();
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}
