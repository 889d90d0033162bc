// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Environment builder: turns a transport request into the handler's input
//! mapping.
//!
//! The mapping holds the transport's headers and attributes plus the
//! protocol-fixed `wsgi.*` entries. The three handle entries (`wsgi.input`,
//! `wsgi.errors`, `wsgi.file_wrapper`) appear in the mapping as
//! [`EnvValue::Handle`] markers; the handles themselves are reached through
//! [`Environ::input`], [`Environ::errors`] and [`Environ::file_wrapper`].

mod diagnostics;
mod input;

pub use diagnostics::ErrorStream;
pub use input::InputStream;

use crate::config::consts::{HTTPS_INDICATOR, INTERFACE_VERSION, SUPPRESSED_HEADERS};
use crate::config::HostConfig;
use crate::errors::BuildError;
use crate::handler::FileWrapperFactory;
use crate::transport::Transport;
use crate::utils::unquote;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

pub const KEY_VERSION: &str = "wsgi.version";
pub const KEY_MULTITHREAD: &str = "wsgi.multithread";
pub const KEY_MULTIPROCESS: &str = "wsgi.multiprocess";
pub const KEY_RUN_ONCE: &str = "wsgi.run_once";
pub const KEY_URL_SCHEME: &str = "wsgi.url_scheme";
pub const KEY_INPUT: &str = "wsgi.input";
pub const KEY_ERRORS: &str = "wsgi.errors";
pub const KEY_FILE_WRAPPER: &str = "wsgi.file_wrapper";
pub const KEY_PATH_INFO: &str = "PATH_INFO";

/// Which per-request handle a [`EnvValue::Handle`] entry stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Input,
    Errors,
    FileWrapper,
}

/// A value in the input mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnvValue {
    Text(String),
    Flag(bool),
    Version(u32, u32),
    Handle(HandleKind),
}

impl EnvValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            EnvValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_flag(&self) -> Option<bool> {
        match self {
            EnvValue::Flag(b) => Some(*b),
            _ => None,
        }
    }
}

impl fmt::Display for EnvValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnvValue::Text(s) => f.write_str(s),
            EnvValue::Flag(b) => write!(f, "{}", b),
            EnvValue::Version(major, minor) => write!(f, "{}.{}", major, minor),
            EnvValue::Handle(kind) => write!(f, "<{:?}>", kind),
        }
    }
}

impl From<&str> for EnvValue {
    fn from(s: &str) -> Self {
        EnvValue::Text(s.to_string())
    }
}

impl From<String> for EnvValue {
    fn from(s: String) -> Self {
        EnvValue::Text(s)
    }
}

impl From<bool> for EnvValue {
    fn from(b: bool) -> Self {
        EnvValue::Flag(b)
    }
}

/// Knobs for [`build`], normally taken from the host config.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub tenant: String,
    pub multiprocess: bool,
    pub unquote_path_info: bool,
    pub max_body_bytes: usize,
    pub file_wrapper_block_size: usize,
}

impl BuildOptions {
    pub fn from_config(config: &HostConfig, tenant: &str) -> Self {
        Self {
            tenant: tenant.to_string(),
            multiprocess: config.get_multiprocess(),
            unquote_path_info: config.get_unquote_path_info(),
            max_body_bytes: config.get_max_body_bytes(),
            file_wrapper_block_size: config.get_file_wrapper_block_size(),
        }
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::from_config(&HostConfig::default(), "")
    }
}

/// The per-request input mapping plus its handles.
pub struct Environ {
    vars: BTreeMap<String, EnvValue>,
    input: InputStream,
    errors: ErrorStream,
    file_wrapper: FileWrapperFactory,
}

impl Environ {
    pub fn get(&self, key: &str) -> Option<&EnvValue> {
        self.vars.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.vars.get(key).and_then(EnvValue::as_str)
    }

    pub fn get_flag(&self, key: &str) -> Option<bool> {
        self.vars.get(key).and_then(EnvValue::as_flag)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<EnvValue>) {
        self.vars.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<EnvValue> {
        self.vars.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.vars.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EnvValue)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Every entry rendered as text; handle markers are left out.
    pub fn to_text_map(&self) -> BTreeMap<String, String> {
        self.vars
            .iter()
            .filter(|(_, v)| !matches!(v, EnvValue::Handle(_)))
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect()
    }

    pub fn input(&mut self) -> &mut InputStream {
        &mut self.input
    }

    pub fn errors(&mut self) -> &mut ErrorStream {
        &mut self.errors
    }

    pub fn file_wrapper(&self) -> &FileWrapperFactory {
        &self.file_wrapper
    }
}

/// Build the input mapping for one request.
pub fn build(transport: Arc<dyn Transport>, options: &BuildOptions) -> Result<Environ, BuildError> {
    let body_len = transport.body_len();
    if body_len > options.max_body_bytes {
        return Err(BuildError::ResourceExhausted {
            length: body_len,
            limit: options.max_body_bytes,
        });
    }

    let mut vars = BTreeMap::new();
    let mut secure = false;

    // Transport-supplied values below may override this.
    if let Some(script_name) = transport.script_name() {
        let path_info = if options.unquote_path_info {
            unquote(&script_name)
        } else {
            script_name
        };
        vars.insert(KEY_PATH_INFO.to_string(), EnvValue::Text(path_info));
    }

    let headers = transport.headers();
    let attributes = transport.attributes();
    for (name, value) in headers.into_iter().chain(attributes) {
        if SUPPRESSED_HEADERS.contains(&name.as_str()) {
            continue;
        }
        if name == HTTPS_INDICATOR {
            secure = !(value.is_empty() || value.eq_ignore_ascii_case("off"));
        }
        vars.insert(name, EnvValue::Text(value));
    }

    let (major, minor) = INTERFACE_VERSION;
    vars.insert(KEY_VERSION.to_string(), EnvValue::Version(major, minor));
    vars.insert(
        KEY_MULTITHREAD.to_string(),
        EnvValue::Flag(!options.multiprocess),
    );
    vars.insert(
        KEY_MULTIPROCESS.to_string(),
        EnvValue::Flag(options.multiprocess),
    );
    vars.insert(KEY_RUN_ONCE.to_string(), EnvValue::Flag(false));
    vars.insert(
        KEY_URL_SCHEME.to_string(),
        EnvValue::Text(if secure { "https" } else { "http" }.to_string()),
    );
    vars.insert(KEY_INPUT.to_string(), EnvValue::Handle(HandleKind::Input));
    vars.insert(KEY_ERRORS.to_string(), EnvValue::Handle(HandleKind::Errors));
    vars.insert(
        KEY_FILE_WRAPPER.to_string(),
        EnvValue::Handle(HandleKind::FileWrapper),
    );

    Ok(Environ {
        vars,
        input: InputStream::new(transport, body_len),
        errors: ErrorStream::new(options.tenant.clone()),
        file_wrapper: FileWrapperFactory::new(options.file_wrapper_block_size),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MemoryTransport;

    fn build_from(transport: MemoryTransport, options: &BuildOptions) -> Environ {
        build(Arc::new(transport), options).unwrap()
    }

    #[test]
    fn test_headers_attributes_and_fixed_entries() {
        let transport = MemoryTransport::new()
            .with_header("X-Test", "v")
            .with_attribute("HTTPS", "on");
        let options = BuildOptions {
            multiprocess: true,
            ..Default::default()
        };

        let environ = build_from(transport, &options);
        assert_eq!(environ.get_str("X-Test"), Some("v"));
        assert_eq!(environ.get_str(KEY_URL_SCHEME), Some("https"));
        assert_eq!(environ.get_flag(KEY_MULTIPROCESS), Some(true));
        assert_eq!(environ.get_flag(KEY_MULTITHREAD), Some(false));
        assert_eq!(environ.get_flag(KEY_RUN_ONCE), Some(false));
        assert_eq!(environ.get(KEY_VERSION), Some(&EnvValue::Version(1, 0)));
        assert_eq!(
            environ.get(KEY_INPUT),
            Some(&EnvValue::Handle(HandleKind::Input))
        );
        assert!(environ.contains_key(KEY_ERRORS));
        assert!(environ.contains_key(KEY_FILE_WRAPPER));
    }

    #[test]
    fn test_single_process_mode_is_multithreaded() {
        let options = BuildOptions {
            multiprocess: false,
            ..Default::default()
        };
        let environ = build_from(MemoryTransport::new(), &options);
        assert_eq!(environ.get_flag(KEY_MULTIPROCESS), Some(false));
        assert_eq!(environ.get_flag(KEY_MULTITHREAD), Some(true));
    }

    #[test]
    fn test_default_scheme_and_https_off() {
        let environ = build_from(MemoryTransport::new(), &BuildOptions::default());
        assert_eq!(environ.get_str(KEY_URL_SCHEME), Some("http"));

        let transport = MemoryTransport::new().with_attribute("HTTPS", "off");
        let environ = build_from(transport, &BuildOptions::default());
        assert_eq!(environ.get_str(KEY_URL_SCHEME), Some("http"));
    }

    #[test]
    fn test_denylisted_names_are_suppressed() {
        let transport = MemoryTransport::new()
            .with_attribute("SCRIPT_FILENAME", "/srv/app.wasm")
            .with_attribute("REQUEST_METHOD", "POST");
        let environ = build_from(transport, &BuildOptions::default());
        assert!(!environ.contains_key("SCRIPT_FILENAME"));
        assert_eq!(environ.get_str("REQUEST_METHOD"), Some("POST"));
    }

    #[test]
    fn test_path_info_from_script_name() {
        let transport = MemoryTransport::new().with_script_name("/a%20b");
        let environ = build_from(transport, &BuildOptions::default());
        assert_eq!(environ.get_str(KEY_PATH_INFO), Some("/a%20b"));

        let transport = MemoryTransport::new().with_script_name("/a%20b");
        let options = BuildOptions {
            unquote_path_info: true,
            ..Default::default()
        };
        let environ = build_from(transport, &options);
        assert_eq!(environ.get_str(KEY_PATH_INFO), Some("/a b"));
    }

    #[test]
    fn test_transport_path_info_wins_over_script_name() {
        let transport = MemoryTransport::new()
            .with_script_name("/app")
            .with_attribute("PATH_INFO", "/extra");
        let environ = build_from(transport, &BuildOptions::default());
        assert_eq!(environ.get_str(KEY_PATH_INFO), Some("/extra"));
    }

    #[test]
    fn test_oversized_body_is_rejected() {
        let transport = MemoryTransport::new().with_body(vec![0u8; 16]);
        let options = BuildOptions {
            max_body_bytes: 8,
            ..Default::default()
        };
        let result = build(Arc::new(transport), &options);
        assert!(matches!(
            result,
            Err(BuildError::ResourceExhausted {
                length: 16,
                limit: 8
            })
        ));
    }

    #[test]
    fn test_text_map_skips_handles() {
        let transport = MemoryTransport::new().with_header("X-Test", "v");
        let environ = build_from(transport, &BuildOptions::default());
        let text = environ.to_text_map();
        assert_eq!(text.get("X-Test").map(String::as_str), Some("v"));
        assert_eq!(text.get(KEY_VERSION).map(String::as_str), Some("1.0"));
        assert!(!text.contains_key(KEY_INPUT));
    }

    #[test]
    fn test_body_is_readable_through_environ() {
        let transport = MemoryTransport::new().with_body(b"payload".to_vec());
        let mut environ = build_from(transport, &BuildOptions::default());
        assert_eq!(environ.input().read(None).unwrap(), b"payload".to_vec());
    }
}
