// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::TransportError;
use thiserror::Error;

/// The environment builder could not construct a request input mapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("request body of {length} bytes exceeds the {limit} byte limit")]
    ResourceExhausted { length: usize, limit: usize },
}

/// Host-level failures. Per-request variants are absorbed by the request
/// bridge into the fallback response; only `init` and `shutdown` surface them
/// to the embedding process.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("failed to create execution context for tenant '{tenant}': {reason}")]
    ContextCreation { tenant: String, reason: String },

    #[error("failed to load module '{module_id}': {cause}")]
    ModuleLoad { module_id: String, cause: String },

    #[error("cannot resolve '{entry_point}' in module '{module_id}': {reason}")]
    HandlerResolution {
        module_id: String,
        entry_point: String,
        reason: String,
    },

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("execution context for tenant '{tenant}' is already held by this thread")]
    ReentrantEntry { tenant: String },

    #[error("host has been shut down")]
    ShutDown,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("blocking request task failed: {0}")]
    Join(String),
}

pub type HostResult<T> = Result<T, HostError>;
