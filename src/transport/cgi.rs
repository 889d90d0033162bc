// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::TransportError;
use crate::transport::{FileDescriptor, RequestData, Transport};
use crate::utils::lock;
use std::io::{self, Read, Write};
use std::sync::Mutex;

const HEADER_PREFIX: &str = "HTTP_";

/// A single request taken from a CGI environment.
///
/// Variables starting with `HTTP_` are the request headers; every other
/// variable is an attribute and doubles as a configuration lookup. The body is
/// read from `input` up to `CONTENT_LENGTH`, and the response is written to
/// `output` in CGI form (`Status:` line, headers, blank line, body).
pub struct CgiTransport<R, W> {
    vars: Vec<(String, String)>,
    body_len: usize,
    input: Mutex<io::Take<R>>,
    output: Mutex<W>,
    data: Mutex<Option<RequestData>>,
}

impl CgiTransport<io::Stdin, io::Stdout> {
    /// The request described by this process's environment, stdin and stdout.
    pub fn from_process() -> Self {
        Self::new(std::env::vars().collect(), io::stdin(), io::stdout())
    }
}

impl<R: Read, W: Write> CgiTransport<R, W> {
    pub fn new(vars: Vec<(String, String)>, input: R, output: W) -> Self {
        let body_len = vars
            .iter()
            .find(|(name, _)| name == "CONTENT_LENGTH")
            .and_then(|(_, value)| value.trim().parse::<usize>().ok())
            .unwrap_or(0);

        Self {
            vars,
            body_len,
            input: Mutex::new(input.take(body_len as u64)),
            output: Mutex::new(output),
            data: Mutex::new(None),
        }
    }

    fn var(&self, name: &str) -> Option<String> {
        self.vars
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.clone())
    }

    /// Give back the output sink, for inspecting what was written.
    pub fn into_output(self) -> W {
        self.output
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl<R, W> Transport for CgiTransport<R, W>
where
    R: Read + Send,
    W: Write + Send,
{
    fn headers(&self) -> Vec<(String, String)> {
        self.vars
            .iter()
            .filter(|(name, _)| name.starts_with(HEADER_PREFIX))
            .cloned()
            .collect()
    }

    fn attributes(&self) -> Vec<(String, String)> {
        self.vars
            .iter()
            .filter(|(name, _)| !name.starts_with(HEADER_PREFIX))
            .cloned()
            .collect()
    }

    fn script_name(&self) -> Option<String> {
        self.var("PATH_INFO").or_else(|| self.var("SCRIPT_NAME"))
    }

    fn script_filename(&self) -> Option<String> {
        self.var("SCRIPT_FILENAME")
    }

    fn body_len(&self) -> usize {
        self.body_len
    }

    fn read_body(&self, buf: &mut [u8]) -> Result<usize, TransportError> {
        Ok(lock(&self.input).read(buf)?)
    }

    fn write_headers(
        &self,
        status: u16,
        headers: &[(String, String)],
    ) -> Result<(), TransportError> {
        let mut head = format!("Status: {}\r\n", status);
        for (name, value) in headers {
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");

        let mut output = lock(&self.output);
        output.write_all(head.as_bytes())?;
        output.flush()?;
        Ok(())
    }

    fn write_body(&self, chunk: &[u8]) -> Result<(), TransportError> {
        let mut output = lock(&self.output);
        output.write_all(chunk)?;
        output.flush()?;
        Ok(())
    }

    fn send_file(&self, file: FileDescriptor) -> Result<(), TransportError> {
        let mut output = lock(&self.output);
        let copied = io::copy(&mut file.file.take(file.len), &mut *output)?;
        output.flush()?;
        if copied < file.len {
            return Err(TransportError::file(format!(
                "file ended after {} of {} bytes",
                copied, file.len
            )));
        }
        Ok(())
    }

    fn set_request_data(&self, data: Option<RequestData>) {
        *lock(&self.data) = data;
    }

    fn request_data(&self) -> Option<RequestData> {
        lock(&self.data).clone()
    }

    fn config(&self, name: &str) -> Option<String> {
        self.var(name)
    }
}
