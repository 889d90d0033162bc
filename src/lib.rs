// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod bridge;        // request bridge + host lifecycle
pub mod config;        // YAML host config
pub mod context;       // tenant execution context pool
pub mod environ;       // request environment builder
pub mod errors;        // error handling
pub mod handler;       // handler-facing API
pub mod modules;       // module loading + handler cache
pub mod observability;
pub mod transport;     // transport boundary + adapters
pub mod utils;

pub use bridge::{Host, HostBuilder};
