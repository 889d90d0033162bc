// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use super::error::{WasmError, WasmResult};
use crate::environ::Environ;
use crate::errors::AppError;
use crate::handler::{Application, Body, StartResponse, Status};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use wasmtime::{Engine, Instance, Memory, Module, Store, TypedFunc};

#[derive(Serialize)]
struct RequestEnvelope {
    environ: BTreeMap<String, String>,
    /// Base64 request body
    body: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StatusField {
    Code(u16),
    Line(String),
}

impl From<StatusField> for Status {
    fn from(field: StatusField) -> Self {
        match field {
            StatusField::Code(code) => Status(code),
            StatusField::Line(line) => Status::parse(&line),
        }
    }
}

#[derive(Deserialize)]
struct ResponseEnvelope {
    status: StatusField,
    #[serde(default)]
    headers: Vec<(String, String)>,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    body_base64: Option<String>,
}

impl ResponseEnvelope {
    fn body_bytes(&mut self) -> WasmResult<Vec<u8>> {
        if let Some(encoded) = self.body_base64.take() {
            return STANDARD
                .decode(encoded)
                .map_err(|e| WasmError::MemoryError(format!("invalid body_base64: {}", e)));
        }
        Ok(self.body.take().map(String::into_bytes).unwrap_or_default())
    }
}

struct Abi {
    memory: Memory,
    allocate: TypedFunc<i32, i32>,
    deallocate: TypedFunc<(i32, i32), ()>,
    entry: TypedFunc<(i32, i32, i32), i32>,
}

/// A handler backed by one export of a compiled WASM module.
///
/// Every call runs in a fresh `Store`, so no instance state survives between
/// requests; module-level state lives in the host-side cache only.
pub struct WasmApplication {
    engine: Engine,
    module: Module,
    entry: String,
    module_id: String,
    fuel: Option<u64>,
}

impl WasmApplication {
    pub(crate) fn new(
        engine: Engine,
        module: Module,
        entry: &str,
        module_id: &str,
        fuel: Option<u64>,
    ) -> Self {
        Self {
            engine,
            module,
            entry: entry.to_string(),
            module_id: module_id.to_string(),
            fuel,
        }
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }

    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    /// Run the export on `input`, returning the bytes it produced.
    pub fn invoke(&self, input: &[u8]) -> WasmResult<Vec<u8>> {
        let mut store = Store::new(&self.engine, ());
        if let Some(fuel) = self.fuel {
            store.set_fuel(fuel)?;
        }
        let instance = Instance::new(&mut store, &self.module, &[])?;
        let abi = self.bind(&mut store, &instance)?;
        self.exchange(&mut store, &abi, input)
    }

    fn bind(&self, store: &mut Store<()>, instance: &Instance) -> WasmResult<Abi> {
        let memory = instance
            .get_memory(&mut *store, "memory")
            .ok_or_else(|| WasmError::Abi("module must export 'memory'".to_string()))?;
        let allocate = instance.get_typed_func::<i32, i32>(&mut *store, "allocate")?;
        let deallocate = instance.get_typed_func::<(i32, i32), ()>(&mut *store, "deallocate")?;
        let entry = instance.get_typed_func::<(i32, i32, i32), i32>(&mut *store, &self.entry)?;
        Ok(Abi {
            memory,
            allocate,
            deallocate,
            entry,
        })
    }

    fn exchange(&self, store: &mut Store<()>, abi: &Abi, input: &[u8]) -> WasmResult<Vec<u8>> {
        let input_len = i32::try_from(input.len())
            .map_err(|_| WasmError::MemoryError(format!("input of {} bytes", input.len())))?;

        let input_ptr = abi.allocate.call(&mut *store, input_len)?;
        if input_ptr == 0 {
            return Err(WasmError::MemoryError(
                "failed to allocate input memory".to_string(),
            ));
        }
        abi.memory
            .write(&mut *store, input_ptr as usize, input)
            .map_err(|e| WasmError::MemoryError(format!("writing input: {}", e)))?;

        let output_len_ptr = abi.allocate.call(&mut *store, 4)?;
        if output_len_ptr == 0 {
            let _ = abi.deallocate.call(&mut *store, (input_ptr, input_len));
            return Err(WasmError::MemoryError(
                "failed to allocate output length memory".to_string(),
            ));
        }

        let result_ptr = match abi
            .entry
            .call(&mut *store, (input_ptr, input_len, output_len_ptr))
        {
            Ok(ptr) => ptr,
            Err(e) => {
                let _ = abi.deallocate.call(&mut *store, (input_ptr, input_len));
                let _ = abi.deallocate.call(&mut *store, (output_len_ptr, 4));
                return Err(e.into());
            }
        };
        abi.deallocate.call(&mut *store, (input_ptr, input_len))?;

        if result_ptr == 0 {
            let _ = abi.deallocate.call(&mut *store, (output_len_ptr, 4));
            return Err(WasmError::MemoryError(format!(
                "'{}' returned a null pointer",
                self.entry
            )));
        }

        let mut output_len_bytes = [0u8; 4];
        abi.memory
            .read(&mut *store, output_len_ptr as usize, &mut output_len_bytes)
            .map_err(|e| WasmError::MemoryError(format!("reading output length: {}", e)))?;
        let output_len = i32::from_le_bytes(output_len_bytes);
        abi.deallocate.call(&mut *store, (output_len_ptr, 4))?;

        let output_len = usize::try_from(output_len)
            .map_err(|_| WasmError::MemoryError(format!("negative output length {}", output_len)))?;
        // The length is guest-controlled; bounds-check it before copying.
        let start = result_ptr as u32 as usize;
        let output = start
            .checked_add(output_len)
            .and_then(|end| abi.memory.data(&*store).get(start..end))
            .map(<[u8]>::to_vec)
            .ok_or_else(|| {
                WasmError::MemoryError(format!(
                    "output of {} bytes at {} exceeds guest memory of {} bytes",
                    output_len,
                    start,
                    abi.memory.data_size(&*store)
                ))
            })?;
        abi.deallocate
            .call(&mut *store, (result_ptr, output_len.max(1) as i32))?;

        Ok(output)
    }

    fn failure(&self, error: WasmError) -> AppError {
        AppError::raised(format!(
            "WASM handler {}:{} failed: {}",
            self.module_id, self.entry, error
        ))
    }
}

impl Application for WasmApplication {
    fn call(
        &self,
        environ: &mut Environ,
        start_response: &mut StartResponse<'_>,
    ) -> Result<Body, AppError> {
        let body = environ.input().read(None)?;
        let request = RequestEnvelope {
            environ: environ.to_text_map(),
            body: STANDARD.encode(&body),
        };
        let input = serde_json::to_vec(&request).map_err(|e| self.failure(e.into()))?;

        let output = self.invoke(&input).map_err(|e| self.failure(e))?;
        let mut response: ResponseEnvelope =
            serde_json::from_slice(&output).map_err(|e| self.failure(e.into()))?;
        let body = response.body_bytes().map_err(|e| self.failure(e))?;

        start_response.set_response(response.status, response.headers, None)?;
        Ok(Body::once(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{create_engine, Isolate, TenantId};
    use crate::environ::{build, BuildOptions};
    use crate::handler::ResponseState;
    use crate::modules::wasm::test_support::{greeting_module_wat, GREETING_RESPONSE};
    use crate::modules::wasm::WasmModuleLoader;
    use crate::modules::{ModuleLoader, ModuleSource};
    use crate::transport::{MemoryTransport, Transport};
    use std::sync::Arc;
    use tempfile::TempDir;

    fn load(entry: &str) -> Arc<dyn Application> {
        let dir = TempDir::new().unwrap();
        let path = super::super::test_support::write_module(
            dir.path(),
            "site.wasm",
            &greeting_module_wat(),
        );
        let mut isolate =
            Isolate::new(TenantId::from("t"), create_engine().unwrap()).with_fuel(1_000_000);
        WasmModuleLoader::default()
            .load(&mut isolate, &ModuleSource::new("site.wasm", path))
            .unwrap()
            .handler(entry)
            .unwrap()
    }

    #[test]
    fn test_invoke_returns_module_output() {
        let engine = Engine::default();
        let module = Module::new(&engine, wat::parse_str(greeting_module_wat()).unwrap()).unwrap();
        let app = WasmApplication::new(engine, module, "application", "site.wasm", None);

        let output = app.invoke(b"{}").unwrap();
        assert_eq!(output, GREETING_RESPONSE.as_bytes());
        assert_eq!(app.entry(), "application");
    }

    #[test]
    fn test_call_sets_response_from_envelope() {
        let app = load("application");
        let memory = Arc::new(MemoryTransport::new().with_body(b"payload".to_vec()));
        let transport: Arc<dyn Transport> = memory.clone();
        let mut environ = build(transport.clone(), &BuildOptions::default()).unwrap();
        let mut state = ResponseState::default();

        let body = {
            let mut start_response = StartResponse::new(&mut state, transport.as_ref());
            app.call(&mut environ, &mut start_response).unwrap()
        };

        assert_eq!(state.status, 200);
        assert_eq!(
            state.headers,
            Some(vec![("Content-Type".to_string(), "text/plain".to_string())])
        );
        match body {
            Body::Iter(mut iter) => {
                assert_eq!(iter.next_chunk(), Some(Ok(b"hi".to_vec())));
            }
            Body::File(_) => panic!("expected an iterable body"),
        }
        assert_eq!(environ.input().available(), 0);
    }

    #[test]
    fn test_output_length_beyond_memory_is_rejected() {
        let engine = Engine::default();
        let module = Module::new(&engine, wat::parse_str(greeting_module_wat()).unwrap()).unwrap();
        let app = WasmApplication::new(engine, module, "overrun", "site.wasm", None);

        match app.invoke(b"{}") {
            Err(WasmError::MemoryError(message)) => {
                assert!(message.contains("2147483647 bytes"), "{message}")
            }
            other => panic!("expected a memory error, got {:?}", other.map(|o| o.len())),
        }
    }

    #[test]
    fn test_fuel_exhaustion_is_app_error() {
        let app = load("spin");
        let transport: Arc<dyn Transport> = Arc::new(MemoryTransport::new());
        let mut environ = build(transport.clone(), &BuildOptions::default()).unwrap();
        let mut state = ResponseState::default();
        let mut start_response = StartResponse::new(&mut state, transport.as_ref());

        match app.call(&mut environ, &mut start_response) {
            Err(AppError::Raised(message)) => assert!(message.contains("site.wasm:spin")),
            _ => panic!("expected the handler to fail"),
        }
    }

    #[test]
    fn test_response_envelope_parsing() {
        let mut numeric: ResponseEnvelope =
            serde_json::from_str(r#"{"status":404,"body_base64":"bm9wZQ=="}"#).unwrap();
        assert_eq!(numeric.body_bytes().unwrap(), b"nope");
        assert_eq!(Status::from(numeric.status), Status(404));

        let mut line: ResponseEnvelope = serde_json::from_str(r#"{"status":"201 Created"}"#).unwrap();
        assert!(line.body_bytes().unwrap().is_empty());
        assert!(line.headers.is_empty());
        assert_eq!(Status::from(line.status), Status(201));
    }
}
