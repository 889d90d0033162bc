// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::TransportError;
use thiserror::Error;

/// Error raised by (or into) an application handler.
///
/// Cloneable so a saved failure can be handed back through
/// [`SetResponse::Reraise`](crate::handler::SetResponse::Reraise) and still be
/// logged by the bridge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    /// Failure raised by handler code.
    #[error("{0}")]
    Raised(String),

    /// Misuse of the response-setting contract.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Reading the request body failed.
    #[error("input error: {0}")]
    Input(String),

    /// A write issued on behalf of the handler failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Handler code panicked; the payload message is kept when it is a string.
    #[error("handler panicked: {0}")]
    Panicked(String),
}

impl AppError {
    pub fn raised(message: impl Into<String>) -> Self {
        AppError::Raised(message.into())
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        AppError::Protocol(message.into())
    }

    /// Build an error from a `catch_unwind` payload.
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        AppError::Panicked(message)
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Input(err.to_string())
    }
}
