// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! WASM binary encoding detection using wasmparser.

use super::error::{WasmError, WASM_UNSUPPORTED_ENCODING};
use wasmparser::{Encoding, Parser, Payload};

/// Encoding of a WebAssembly binary.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WasmEncoding {
    /// Component Model binary (version 2+)
    Component,
    /// Classic core module (version 1, no component section)
    Core,
}

impl WasmEncoding {
    #[inline]
    pub fn is_core(self) -> bool {
        matches!(self, Self::Core)
    }
}

/// Detect the encoding of a WebAssembly binary from its version header and,
/// for version 1, its custom sections.
///
/// # Errors
/// * empty, truncated or otherwise invalid input
/// * a legacy Preview 1 component
pub fn detect_encoding(bytes: &[u8]) -> Result<WasmEncoding, WasmError> {
    let parser = Parser::new(0);
    let mut encoding = None;
    let mut has_component_section = false;

    for payload in parser.parse_all(bytes) {
        match payload? {
            Payload::Version { encoding: enc, .. } => {
                encoding = Some(enc);
            }
            Payload::CustomSection(reader) if reader.name() == "component" => {
                has_component_section = true;
            }
            _ => {}
        }
    }

    let encoding =
        encoding.ok_or_else(|| WasmError::InvalidWasmBinary("missing version header".to_string()))?;

    match encoding {
        Encoding::Component => Ok(WasmEncoding::Component),
        Encoding::Module if has_component_section => Err(WasmError::UnsupportedEncoding(
            WASM_UNSUPPORTED_ENCODING.to_string(),
        )),
        Encoding::Module => Ok(WasmEncoding::Core),
    }
}
