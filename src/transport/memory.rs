// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::{TransportError, TransportErrorKind};
use crate::transport::{FileDescriptor, RequestData, Transport};
use crate::utils::lock;
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::sync::Mutex;

/// One call observed on the write side of a [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Headers {
        status: u16,
        headers: Vec<(String, String)>,
    },
    Body(Vec<u8>),
    /// Bytes taken from the file handed to `send_file`
    SendFile(Vec<u8>),
}

/// In-memory transport that records every response primitive.
///
/// # Example
/// ```
/// use tenant_host::transport::{MemoryTransport, Transport};
///
/// let transport = MemoryTransport::new()
///     .with_header("X-Test", "v")
///     .with_config("WSGIApplicationGroup", "shop")
///     .with_body(b"name=value".to_vec());
///
/// assert_eq!(transport.body_len(), 10);
/// assert_eq!(transport.config("WSGIApplicationGroup").as_deref(), Some("shop"));
/// ```
#[derive(Debug, Default)]
pub struct MemoryTransport {
    headers: Vec<(String, String)>,
    attributes: Vec<(String, String)>,
    script_name: Option<String>,
    script_filename: Option<String>,
    config: HashMap<String, String>,
    body_len: usize,
    body: Mutex<Cursor<Vec<u8>>>,
    fail_after: Option<usize>,
    events: Mutex<Vec<TransportEvent>>,
    data: Mutex<Option<RequestData>>,
    data_history: Mutex<Vec<bool>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_script_name(mut self, script_name: impl Into<String>) -> Self {
        self.script_name = Some(script_name.into());
        self
    }

    pub fn with_script_filename(mut self, script_filename: impl Into<String>) -> Self {
        self.script_filename = Some(script_filename.into());
        self
    }

    pub fn with_config(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body_len = body.len();
        self.body = Mutex::new(Cursor::new(body));
        self
    }

    /// Accept `writes` response primitives, then fail every later one as if
    /// the peer had gone away.
    pub fn fail_writes_after(mut self, writes: usize) -> Self {
        self.fail_after = Some(writes);
        self
    }

    pub fn events(&self) -> Vec<TransportEvent> {
        lock(&self.events).clone()
    }

    /// Status and headers of every headers-write, in order.
    pub fn header_writes(&self) -> Vec<(u16, Vec<(String, String)>)> {
        lock(&self.events)
            .iter()
            .filter_map(|event| match event {
                TransportEvent::Headers { status, headers } => Some((*status, headers.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn body_writes(&self) -> Vec<Vec<u8>> {
        lock(&self.events)
            .iter()
            .filter_map(|event| match event {
                TransportEvent::Body(chunk) => Some(chunk.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn send_file_calls(&self) -> Vec<Vec<u8>> {
        lock(&self.events)
            .iter()
            .filter_map(|event| match event {
                TransportEvent::SendFile(sent) => Some(sent.clone()),
                _ => None,
            })
            .collect()
    }

    /// Status of the first headers-write, if any.
    pub fn status(&self) -> Option<u16> {
        self.header_writes().first().map(|(status, _)| *status)
    }

    /// Every body chunk concatenated.
    pub fn body(&self) -> Vec<u8> {
        self.body_writes().concat()
    }

    /// Whether each `set_request_data` call stored (`true`) or cleared a value.
    pub fn request_data_history(&self) -> Vec<bool> {
        lock(&self.data_history).clone()
    }

    fn record(&self, event: TransportEvent) -> Result<(), TransportError> {
        let mut events = lock(&self.events);
        if let Some(limit) = self.fail_after {
            if events.len() >= limit {
                return Err(TransportError::new(
                    TransportErrorKind::Socket,
                    "connection closed by peer",
                ));
            }
        }
        events.push(event);
        Ok(())
    }
}

impl Transport for MemoryTransport {
    fn headers(&self) -> Vec<(String, String)> {
        self.headers.clone()
    }

    fn attributes(&self) -> Vec<(String, String)> {
        self.attributes.clone()
    }

    fn script_name(&self) -> Option<String> {
        self.script_name.clone()
    }

    fn script_filename(&self) -> Option<String> {
        self.script_filename.clone()
    }

    fn body_len(&self) -> usize {
        self.body_len
    }

    fn read_body(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        Ok(lock(&self.body).read(buf)?)
    }

    fn write_headers(
        &self,
        status: u16,
        headers: &[(String, String)],
    ) -> Result<(), TransportError> {
        self.record(TransportEvent::Headers {
            status,
            headers: headers.to_vec(),
        })
    }

    fn write_body(&self, chunk: &[u8]) -> Result<(), TransportError> {
        self.record(TransportEvent::Body(chunk.to_vec()))
    }

    fn send_file(&self, file: FileDescriptor) -> Result<(), TransportError> {
        let mut sent = Vec::new();
        file.file.take(file.len).read_to_end(&mut sent)?;
        self.record(TransportEvent::SendFile(sent))
    }

    fn set_request_data(&self, data: Option<RequestData>) {
        lock(&self.data_history).push(data.is_some());
        *lock(&self.data) = data;
    }

    fn request_data(&self) -> Option<RequestData> {
        lock(&self.data).clone()
    }

    fn config(&self, name: &str) -> Option<String> {
        self.config.get(name).cloned()
    }
}
