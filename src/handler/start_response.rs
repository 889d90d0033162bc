// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::AppError;
use crate::transport::Transport;

const CONTENT_LENGTH: &str = "Content-Length";

/// A response status code.
///
/// Built from a number or from a status line, in which case the leading
/// decimal integer is used (`"404 Not Found"` is 404). Text without one gives
/// 0; nothing is validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status(pub u16);

impl Status {
    pub fn code(self) -> u16 {
        self.0
    }

    pub fn parse(line: &str) -> Self {
        let digits: String = line
            .trim_start()
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        Status(digits.parse().unwrap_or(0))
    }
}

impl From<u16> for Status {
    fn from(code: u16) -> Self {
        Status(code)
    }
}

impl From<i32> for Status {
    fn from(code: i32) -> Self {
        Status(u16::try_from(code).unwrap_or(0))
    }
}

impl From<&str> for Status {
    fn from(line: &str) -> Self {
        Status::parse(line)
    }
}

impl From<String> for Status {
    fn from(line: String) -> Self {
        Status::parse(&line)
    }
}

impl From<&String> for Status {
    fn from(line: &String) -> Self {
        Status::parse(line)
    }
}

/// Result of a successful [`StartResponse::set_response`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetResponse {
    /// Status and headers were stored.
    Accepted,
    /// Headers already went out; the handler should fail with this error. The
    /// host treats the request as failed even if the handler does not.
    Reraise(AppError),
}

/// Per-request response bookkeeping shared by the handler callback and the
/// bridge's streaming code.
#[derive(Debug)]
pub(crate) struct ResponseState {
    pub(crate) status: u16,
    pub(crate) headers: Option<Vec<(String, String)>>,
    pub(crate) headers_sent: bool,
    pub(crate) pending_reraise: Option<AppError>,
    pub(crate) body_bytes: u64,
}

impl Default for ResponseState {
    fn default() -> Self {
        Self {
            status: 200,
            headers: None,
            headers_sent: false,
            pending_reraise: None,
            body_bytes: 0,
        }
    }
}

impl ResponseState {
    /// Flush status and headers once. `content_length` is added unless the
    /// handler declared its own.
    pub(crate) fn send_headers(
        &mut self,
        transport: &dyn Transport,
        content_length: Option<u64>,
    ) -> Result<(), AppError> {
        if self.headers_sent {
            return Ok(());
        }
        let mut headers = self
            .headers
            .clone()
            .ok_or_else(|| AppError::protocol("response started before set_response()"))?;

        if let Some(length) = content_length {
            let declared = headers
                .iter()
                .any(|(name, _)| name.eq_ignore_ascii_case(CONTENT_LENGTH));
            if !declared {
                headers.push((CONTENT_LENGTH.to_string(), length.to_string()));
            }
        }

        // Marked before writing: a failed write must not be followed by a
        // second headers-write.
        self.headers_sent = true;
        transport.write_headers(self.status, &headers)?;
        Ok(())
    }

    /// Write one body chunk, flushing headers first. Empty chunks are skipped.
    pub(crate) fn write_chunk(
        &mut self,
        transport: &dyn Transport,
        chunk: &[u8],
        content_length: Option<u64>,
    ) -> Result<(), AppError> {
        if chunk.is_empty() {
            return Ok(());
        }
        self.send_headers(transport, content_length)?;
        transport.write_body(chunk)?;
        self.body_bytes += chunk.len() as u64;
        Ok(())
    }
}

/// The response-setting callback handed to a handler.
pub struct StartResponse<'r> {
    state: &'r mut ResponseState,
    transport: &'r dyn Transport,
}

impl<'r> StartResponse<'r> {
    pub(crate) fn new(state: &'r mut ResponseState, transport: &'r dyn Transport) -> Self {
        Self { state, transport }
    }

    /// Set the response status and headers.
    ///
    /// * First call: stored, returns `Accepted`.
    /// * Repeat call without `exc_info`: `Err(AppError::Protocol)`.
    /// * Call with `exc_info` before headers are sent: replaces the stored
    ///   status and headers.
    /// * Call with `exc_info` after headers are sent: returns
    ///   `Reraise(exc_info)` and the request is marked failed.
    pub fn set_response(
        &mut self,
        status: impl Into<Status>,
        headers: Vec<(String, String)>,
        exc_info: Option<AppError>,
    ) -> Result<SetResponse, AppError> {
        match exc_info {
            Some(error) if self.state.headers_sent => {
                self.state.pending_reraise = Some(error.clone());
                return Ok(SetResponse::Reraise(error));
            }
            Some(_) => {}
            None if self.state.headers.is_some() => {
                return Err(AppError::protocol("headers already set"));
            }
            None => {}
        }

        self.state.status = status.into().code();
        self.state.headers = Some(headers);
        Ok(SetResponse::Accepted)
    }

    /// Write body bytes immediately, bypassing the returned body.
    pub fn write(&mut self, data: &[u8]) -> Result<(), AppError> {
        if self.state.headers.is_none() {
            return Err(AppError::protocol("write() before start_response()"));
        }
        self.state.write_chunk(self.transport, data, None)
    }

    pub fn headers_sent(&self) -> bool {
        self.state.headers_sent
    }
}
