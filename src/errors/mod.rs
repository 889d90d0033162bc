// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod app;
mod host;
mod transport;

pub use app::AppError;
pub use host::{BuildError, HostError, HostResult};
pub use transport::{TransportError, TransportErrorKind};
