// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod sync;
mod unquote;

pub use sync::lock;
pub use unquote::unquote;
