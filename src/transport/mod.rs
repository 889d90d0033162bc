// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The transport boundary.
//!
//! The host never touches sockets or wire framing. A transport adapter hands
//! each request over as a [`Transport`] and receives the response through its
//! write primitives. Two adapters ship with the crate:
//!
//! * [`MemoryTransport`] - records every primitive call, for embedding and tests
//! * [`CgiTransport`] - one request from a CGI environment, used by the binary

mod cgi;
mod memory;

pub use cgi::CgiTransport;
pub use memory::{MemoryTransport, TransportEvent};

use crate::errors::TransportError;
use std::any::Any;
use std::fs::File;
use std::sync::Arc;

/// Opaque value a transport keeps for the host while a request is in flight.
pub type RequestData = Arc<dyn Any + Send + Sync>;

/// An open file handed to [`Transport::send_file`].
///
/// `file` is a duplicate handle sharing the wrapped file's offset; `len` is the
/// number of bytes from that offset to send.
#[derive(Debug)]
pub struct FileDescriptor {
    pub file: File,
    pub len: u64,
}

/// One inbound request as seen by the host.
///
/// Methods take `&self`: adapters keep their own interior mutability so the
/// body-reading handle given to a handler and the bridge's response writes can
/// share the same transport.
pub trait Transport: Send + Sync {
    /// Request headers in arrival order, names as the transport spells them.
    fn headers(&self) -> Vec<(String, String)>;

    /// Request attributes and CGI-style metadata (method, query string, ...).
    fn attributes(&self) -> Vec<(String, String)>;

    /// Script name the request was routed under; becomes `PATH_INFO`.
    fn script_name(&self) -> Option<String>;

    /// Filesystem location of the handler module for this request.
    fn script_filename(&self) -> Option<String>;

    /// Declared request body length.
    fn body_len(&self) -> usize;

    /// Read body bytes into `buf`; `Ok(0)` at end of body.
    fn read_body(&self, buf: &mut [u8]) -> Result<usize, TransportError>;

    fn write_headers(&self, status: u16, headers: &[(String, String)])
        -> Result<(), TransportError>;

    fn write_body(&self, chunk: &[u8]) -> Result<(), TransportError>;

    /// Send `file.len` bytes straight from the file handle.
    fn send_file(&self, file: FileDescriptor) -> Result<(), TransportError>;

    fn set_request_data(&self, data: Option<RequestData>);

    fn request_data(&self) -> Option<RequestData>;

    /// Transport-defined configuration value (tenant, reload policy, entry point).
    fn config(&self, name: &str) -> Option<String>;
}
