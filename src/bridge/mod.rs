// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The request bridge: one request from transport to handler and back.
//!
//! [`Host::handle`] routes a request to a tenant's execution context,
//! resolves the handler inside it, builds the environ and drives the response
//! through the request state machine:
//!
//! ```text
//! Created -> HeadersPending -> HeadersSent -> BodyStreaming -> Closing -> Done
//!                                 (any state) -> Errored
//! ```
//!
//! Failures never escape a request. Before the first response byte the
//! client receives a fixed 500 page, afterwards the response is cut short and
//! the failure is logged.

mod fallback;
mod host;
mod request;

pub use fallback::{FALLBACK_BODY, FALLBACK_CONTENT_TYPE, FALLBACK_STATUS};
pub use host::{Host, HostBuilder};
pub use request::{RequestInfo, RequestState};
