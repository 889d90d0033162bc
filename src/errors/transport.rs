// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use std::io;
use thiserror::Error;

/// Failure class reported by a transport primitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// Allocation failed inside the transport
    Memory,
    /// Peer went away or the socket failed
    Socket,
    /// Response buffer could not accept more data
    Buffer,
    /// Framing or sequencing violated the wire protocol
    Protocol,
    /// Reading or sending a file failed
    File,
    /// The transport was already finished with this request
    Closed,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransportErrorKind::Memory => "memory",
            TransportErrorKind::Socket => "socket",
            TransportErrorKind::Buffer => "buffer",
            TransportErrorKind::Protocol => "protocol",
            TransportErrorKind::File => "file",
            TransportErrorKind::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// A transport read or write failed. These are never retried: the request is
/// abandoned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("transport {kind} error: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn socket(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Socket, message)
    }

    pub fn file(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::File, message)
    }
}

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        let kind = match err.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected => TransportErrorKind::Socket,
            io::ErrorKind::OutOfMemory => TransportErrorKind::Memory,
            io::ErrorKind::WriteZero => TransportErrorKind::Buffer,
            io::ErrorKind::UnexpectedEof => TransportErrorKind::Closed,
            _ => TransportErrorKind::File,
        };
        Self::new(kind, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_classification() {
        let err: TransportError = io::Error::new(io::ErrorKind::BrokenPipe, "gone").into();
        assert_eq!(err.kind, TransportErrorKind::Socket);
        assert_eq!(err.to_string(), "transport socket error: gone");

        let err: TransportError = io::Error::new(io::ErrorKind::NotFound, "missing").into();
        assert_eq!(err.kind, TransportErrorKind::File);
    }
}
