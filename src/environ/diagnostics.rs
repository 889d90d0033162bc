// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::observability::messages::request::HandlerDiagnostic;
use crate::observability::messages::StructuredLog;
use std::io::{self, Write};

/// The `wsgi.errors` handle. Complete lines go to the log tagged with the
/// tenant; a trailing partial line is emitted on flush or drop.
pub struct ErrorStream {
    tenant: String,
    pending: Vec<u8>,
}

impl ErrorStream {
    pub fn new(tenant: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            pending: Vec::new(),
        }
    }

    pub fn write_str(&mut self, message: &str) {
        self.accept(message.as_bytes());
    }

    pub fn writelines<I, S>(&mut self, lines: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for line in lines {
            self.accept(line.as_ref().as_bytes());
        }
    }

    fn accept(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.emit(&line[..line.len() - 1]);
        }
    }

    fn emit(&self, line: &[u8]) {
        let line = String::from_utf8_lossy(line);
        HandlerDiagnostic {
            tenant: &self.tenant,
            line: line.trim_end_matches('\r'),
        }
        .log();
    }

    fn flush_pending(&mut self) {
        if !self.pending.is_empty() {
            let line = std::mem::take(&mut self.pending);
            self.emit(&line);
        }
    }
}

impl Write for ErrorStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.accept(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_pending();
        Ok(())
    }
}

impl Drop for ErrorStream {
    fn drop(&mut self) {
        self.flush_pending();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffers_partial_lines() {
        let mut errors = ErrorStream::new("shop");
        write!(errors, "partial").unwrap();
        assert_eq!(errors.pending, b"partial".to_vec());

        errors.write_str(" line\nnext");
        assert_eq!(errors.pending, b"next".to_vec());

        errors.flush().unwrap();
        assert!(errors.pending.is_empty());
    }

    #[test]
    fn test_writelines() {
        let mut errors = ErrorStream::new("");
        errors.writelines(["a\n", "b\n", "c"]);
        assert_eq!(errors.pending, b"c".to_vec());
    }
}
