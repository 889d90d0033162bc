// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::AppError;
use crate::transport::Transport;
use std::io::{self, Read};
use std::sync::Arc;

const READ_AHEAD: usize = 8192;

/// The `wsgi.input` handle: request body reader bounded by the declared body
/// length.
///
/// Line-oriented calls read ahead from the transport; unconsumed bytes are kept
/// for the next call.
pub struct InputStream {
    transport: Arc<dyn Transport>,
    remaining: usize,
    buffer: Vec<u8>,
}

impl InputStream {
    pub fn new(transport: Arc<dyn Transport>, length: usize) -> Self {
        Self {
            transport,
            remaining: length,
            buffer: Vec::new(),
        }
    }

    /// Bytes not yet handed to the handler.
    pub fn available(&self) -> usize {
        self.buffer.len() + self.remaining
    }

    /// Read up to `size` bytes, or the rest of the body with `None`.
    pub fn read(&mut self, size: Option<usize>) -> Result<Vec<u8>, AppError> {
        let wanted = size.unwrap_or(usize::MAX).min(self.available());
        while self.buffer.len() < wanted && self.remaining > 0 {
            self.fill(wanted - self.buffer.len())?;
        }
        let take = wanted.min(self.buffer.len());
        Ok(self.buffer.drain(..take).collect())
    }

    /// Read one line including its `\n`, stopping early after `limit` bytes.
    /// Returns an empty vector at end of body.
    pub fn readline(&mut self, limit: Option<usize>) -> Result<Vec<u8>, AppError> {
        let limit = limit.unwrap_or(usize::MAX);
        let mut scanned = 0;
        loop {
            if let Some(pos) = self.buffer[scanned..].iter().position(|b| *b == b'\n') {
                let take = (scanned + pos + 1).min(limit);
                return Ok(self.buffer.drain(..take).collect());
            }
            scanned = self.buffer.len();
            if self.buffer.len() >= limit || self.remaining == 0 {
                let take = self.buffer.len().min(limit);
                return Ok(self.buffer.drain(..take).collect());
            }
            self.fill(READ_AHEAD)?;
        }
    }

    /// Read lines until the body ends or, with a non-zero `hint`, until at
    /// least `hint` bytes were returned.
    pub fn readlines(&mut self, hint: Option<usize>) -> Result<Vec<Vec<u8>>, AppError> {
        let hint = hint.filter(|h| *h > 0);
        let mut lines = Vec::new();
        let mut total = 0;
        loop {
            let line = self.readline(None)?;
            if line.is_empty() {
                break;
            }
            total += line.len();
            lines.push(line);
            if hint.is_some_and(|h| total >= h) {
                break;
            }
        }
        Ok(lines)
    }

    fn fill(&mut self, wanted: usize) -> Result<(), AppError> {
        let size = wanted.max(READ_AHEAD).min(self.remaining);
        let start = self.buffer.len();
        self.buffer.resize(start + size, 0);
        let read = self.transport.read_body(&mut self.buffer[start..]);
        let n = match read {
            Ok(n) => n,
            Err(e) => {
                self.buffer.truncate(start);
                return Err(AppError::Input(e.to_string()));
            }
        };
        self.buffer.truncate(start + n);
        if n == 0 {
            // Body shorter than declared; treat as end of input.
            self.remaining = 0;
        } else {
            self.remaining -= n;
        }
        Ok(())
    }
}

impl Iterator for InputStream {
    type Item = Result<Vec<u8>, AppError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.readline(None) {
            Ok(line) if line.is_empty() => None,
            other => Some(other),
        }
    }
}

impl Read for InputStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let chunk = InputStream::read(self, Some(buf.len()))
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        buf[..chunk.len()].copy_from_slice(&chunk);
        Ok(chunk.len())
    }
}
