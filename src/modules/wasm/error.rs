// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Error types for WASM handler modules.

use thiserror::Error;

/// Error message for legacy Preview 1 component binaries.
pub const WASM_UNSUPPORTED_ENCODING: &str =
    "Unsupported WASM binary: legacy Preview 1 Component Model detected. Only core modules can be loaded as handlers.";

#[derive(Error, Debug)]
pub enum WasmError {
    /// Invalid or malformed WASM binary format.
    #[error("Invalid WASM binary: {0}")]
    InvalidWasmBinary(String),

    /// Component Model binaries (of any version) cannot serve as handlers.
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Module is {size} bytes, limit is {limit}")]
    TooLarge { size: usize, limit: usize },

    /// A handler module is missing an export the calling convention needs.
    #[error("ABI violation: {0}")]
    Abi(String),

    /// Memory allocation or access error in WASM linear memory.
    #[error("Memory error: {0}")]
    MemoryError(String),

    /// Malformed request or response envelope.
    #[error("Envelope error: {0}")]
    Envelope(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Wasmtime compilation or execution error, including fuel exhaustion.
    #[error("WASM execution error: {0}")]
    ExecutionError(#[from] wasmtime::Error),

    #[error("WASM parser error: {0}")]
    ParserError(#[from] wasmparser::BinaryReaderError),
}

pub type WasmResult<T> = Result<T, WasmError>;
