// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for request bridge events.

use crate::observability::messages::{tenant_label, StructuredLog};
use std::fmt::{Display, Formatter};
use std::time::Duration;
use tracing::Span;

/// A request is being dispatched to a handler.
///
/// # Log Level
/// `debug!` - Per-request detail
pub struct RequestDispatched<'a> {
    pub request_id: u64,
    pub tenant: &'a str,
    pub module_id: &'a str,
    pub entry_point: &'a str,
}

impl Display for RequestDispatched<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Dispatching request {} to {}:{} in tenant {}",
            self.request_id,
            self.module_id,
            self.entry_point,
            tenant_label(self.tenant)
        )
    }
}

impl StructuredLog for RequestDispatched<'_> {
    fn log(&self) {
        tracing::debug!(
            request_id = self.request_id,
            tenant = self.tenant,
            module_id = self.module_id,
            entry_point = self.entry_point,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "request",
            span_name = name,
            request_id = self.request_id,
            tenant = self.tenant,
            module_id = self.module_id,
        )
    }
}

/// Request finished, successfully or not.
///
/// # Log Level
/// `debug!` - Per-request detail
pub struct RequestCompleted {
    pub request_id: u64,
    pub status: u16,
    pub body_bytes: u64,
    pub duration: Duration,
}

impl Display for RequestCompleted {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Request {} completed with status {} ({} body bytes) in {:?}",
            self.request_id, self.status, self.body_bytes, self.duration
        )
    }
}

impl StructuredLog for RequestCompleted {
    fn log(&self) {
        tracing::debug!(
            request_id = self.request_id,
            status = self.status,
            body_bytes = self.body_bytes,
            duration_ms = self.duration.as_millis() as u64,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!("request", span_name = name, request_id = self.request_id)
    }
}

/// A request failed. `headers_sent` tells whether the client already holds a
/// partial response.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use tenant_host::observability::messages::request::RequestFailed;
///
/// let error = std::io::Error::new(std::io::ErrorKind::Other, "boom");
/// let msg = RequestFailed {
///     request_id: 7,
///     tenant: "shop",
///     stage: "invoke",
///     headers_sent: false,
///     error: &error,
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct RequestFailed<'a> {
    pub request_id: u64,
    pub tenant: &'a str,
    pub stage: &'a str,
    pub headers_sent: bool,
    pub error: &'a dyn std::error::Error,
}

impl Display for RequestFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let outcome = if self.headers_sent {
            "response truncated"
        } else {
            "sending fallback response"
        };
        write!(
            f,
            "Request {} for tenant {} failed during {} ({}): {}",
            self.request_id,
            tenant_label(self.tenant),
            self.stage,
            outcome,
            self.error
        )
    }
}

impl StructuredLog for RequestFailed<'_> {
    fn log(&self) {
        tracing::error!(
            request_id = self.request_id,
            tenant = self.tenant,
            stage = self.stage,
            headers_sent = self.headers_sent,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "request",
            span_name = name,
            request_id = self.request_id,
            tenant = self.tenant
        )
    }
}

/// The response close hook raised. The request's own outcome is unchanged.
///
/// # Log Level
/// `warn!` - Handler bug
pub struct CloseHookFailed<'a> {
    pub request_id: u64,
    pub error: &'a dyn std::error::Error,
}

impl Display for CloseHookFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Close hook for request {} failed: {}",
            self.request_id, self.error
        )
    }
}

impl StructuredLog for CloseHookFailed<'_> {
    fn log(&self) {
        tracing::warn!(
            request_id = self.request_id,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("request", span_name = name, request_id = self.request_id)
    }
}

/// A line written by a handler to its diagnostics stream.
///
/// # Log Level
/// `warn!` - Handler-reported diagnostics
pub struct HandlerDiagnostic<'a> {
    pub tenant: &'a str,
    pub line: &'a str,
}

impl Display for HandlerDiagnostic<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "[{}] {}", tenant_label(self.tenant), self.line)
    }
}

impl StructuredLog for HandlerDiagnostic<'_> {
    fn log(&self) {
        tracing::warn!(target: "handler", tenant = self.tenant, "{}", self.line);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!("handler", span_name = name, tenant = self.tenant)
    }
}
