// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::{
    DEFAULT_ENTRY_POINT, DEFAULT_FILE_WRAPPER_BLOCK_SIZE, DEFAULT_FUEL_LEVEL,
    DEFAULT_MAX_BODY_BYTES, DEFAULT_MULTIPROCESS, MAX_FUEL_LEVEL, MAX_WASM_MODULE_SIZE,
    MIN_FUEL_LEVEL,
};
use crate::errors::HostError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Host configuration.
///
/// Every field is optional; the `get_*` accessors fall back to the constants in
/// [`crate::config::consts`]. It is typically loaded from a YAML file.
///
/// # Fields
/// * `script_root` - Base directory for relative module ids
/// * `handler` - Handler override in `module:entry` form, preloaded at init
/// * `multiprocess` - Whether several processes may serve one tenant
/// * `default_entry_point` - Entry point used when the request names none
/// * `reload` - Reload modules on every request (besides the per-request key)
/// * `unquote_path_info` - Percent-decode `PATH_INFO`
/// * `max_body_bytes` - Largest request body accepted
/// * `file_wrapper_block_size` - Chunk size for streamed file wrappers
/// * `wasm` - WASM handler options
///
/// # Example
/// ```yaml
/// script_root: /srv/apps
/// handler: "site.wasm:application"
/// multiprocess: true
/// wasm:
///   fuel:
///     default: 100000000
///     maximum: 500000000
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HostConfig {
    #[serde(default)]
    pub script_root: Option<PathBuf>,
    #[serde(default)]
    pub handler: Option<String>,
    #[serde(default)]
    pub multiprocess: Option<bool>,
    #[serde(default)]
    pub default_entry_point: Option<String>,
    #[serde(default)]
    pub reload: Option<bool>,
    #[serde(default)]
    pub unquote_path_info: Option<bool>,
    #[serde(default)]
    pub max_body_bytes: Option<usize>,
    #[serde(default)]
    pub file_wrapper_block_size: Option<usize>,
    #[serde(default)]
    pub wasm: WasmConfig,
}

impl HostConfig {
    pub fn get_multiprocess(&self) -> bool {
        self.multiprocess.unwrap_or(DEFAULT_MULTIPROCESS)
    }

    pub fn get_default_entry_point(&self) -> &str {
        self.default_entry_point
            .as_deref()
            .unwrap_or(DEFAULT_ENTRY_POINT)
    }

    pub fn get_reload(&self) -> bool {
        self.reload.unwrap_or(false)
    }

    pub fn get_unquote_path_info(&self) -> bool {
        self.unquote_path_info.unwrap_or(false)
    }

    pub fn get_max_body_bytes(&self) -> usize {
        self.max_body_bytes.unwrap_or(DEFAULT_MAX_BODY_BYTES)
    }

    pub fn get_file_wrapper_block_size(&self) -> usize {
        self.file_wrapper_block_size
            .filter(|size| *size > 0)
            .unwrap_or(DEFAULT_FILE_WRAPPER_BLOCK_SIZE)
    }

    /// Resolve a module id against `script_root`. Absolute ids pass through.
    pub fn resolve_module_path(&self, module_id: &str) -> PathBuf {
        let path = Path::new(module_id);
        match &self.script_root {
            Some(root) if path.is_relative() => root.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Parse the `handler` override, if any.
    pub fn handler_override(&self) -> Option<HandlerSpec> {
        self.handler.as_deref().and_then(HandlerSpec::parse)
    }
}

/// A `module:entry` handler reference. The entry part is optional.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerSpec {
    pub module_id: String,
    pub entry_point: Option<String>,
}

impl HandlerSpec {
    /// Parse `module[:entry]`. Returns `None` for an empty module part.
    ///
    /// # Example
    /// ```
    /// use tenant_host::config::HandlerSpec;
    ///
    /// let spec = HandlerSpec::parse("site.wasm:app").unwrap();
    /// assert_eq!(spec.module_id, "site.wasm");
    /// assert_eq!(spec.entry_point.as_deref(), Some("app"));
    /// ```
    pub fn parse(value: &str) -> Option<Self> {
        let (module, entry) = match value.rsplit_once(':') {
            Some((module, entry)) if !entry.contains('/') && !entry.contains('\\') => {
                (module, Some(entry))
            }
            _ => (value, None),
        };
        let module = module.trim();
        if module.is_empty() {
            return None;
        }
        Some(Self {
            module_id: module.to_string(),
            entry_point: entry
                .map(str::trim)
                .filter(|e| !e.is_empty())
                .map(str::to_string),
        })
    }
}

/// WASM handler options.
///
/// # Example
/// ```yaml
/// wasm:
///   max_module_bytes: 8388608
///   fuel:
///     default: 100000000
///     minimum: 1000000
///     maximum: 500000000
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WasmConfig {
    #[serde(default)]
    pub fuel: FuelConfig,
    #[serde(default)]
    pub max_module_bytes: Option<usize>,
}

impl WasmConfig {
    pub fn get_max_module_bytes(&self) -> usize {
        self.max_module_bytes.unwrap_or(MAX_WASM_MODULE_SIZE)
    }
}

/// Fuel consumption configuration for WASM execution.
///
/// Fuel limits stop runaway handlers by bounding the number of instructions a
/// module may execute per request.
///
/// # Fields
/// * `default` - Fuel granted to each handler call (defaults to 100M)
/// * `minimum` - Minimum allowed fuel level (defaults to 1M)
/// * `maximum` - Maximum allowed fuel level (defaults to 500M)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FuelConfig {
    pub default: Option<u64>,
    pub minimum: Option<u64>,
    pub maximum: Option<u64>,
}

impl FuelConfig {
    /// Get the default fuel level, using built-in default if not configured.
    pub fn get_default(&self) -> u64 {
        self.default.unwrap_or(DEFAULT_FUEL_LEVEL)
    }

    /// Get the minimum fuel level, using built-in default if not configured.
    pub fn get_minimum(&self) -> u64 {
        self.minimum.unwrap_or(MIN_FUEL_LEVEL)
    }

    /// Get the maximum fuel level, using built-in default if not configured.
    pub fn get_maximum(&self) -> u64 {
        self.maximum.unwrap_or(MAX_FUEL_LEVEL)
    }

    /// Clamp a fuel level to the configured bounds.
    ///
    /// # Example
    /// ```
    /// use tenant_host::config::FuelConfig;
    ///
    /// let config = FuelConfig::default();
    /// assert_eq!(config.validate_and_clamp(1_000_000_000), 500_000_000);
    /// ```
    pub fn validate_and_clamp(&self, requested: u64) -> u64 {
        let min = self.get_minimum();
        let max = self.get_maximum().max(min);
        requested.clamp(min, max)
    }

    /// The fuel each handler call receives.
    pub fn effective(&self) -> u64 {
        self.validate_and_clamp(self.get_default())
    }
}

/// Load a host config from a YAML file.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<HostConfig, HostError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .map_err(|e| HostError::Config(format!("{}: {}", path.display(), e)))?;
    parse_config(&content)
}

/// Parse a host config from YAML text. An empty document yields the defaults.
pub fn parse_config(content: &str) -> Result<HostConfig, HostError> {
    if content.trim().is_empty() {
        return Ok(HostConfig::default());
    }
    serde_yaml::from_str(content).map_err(|e| HostError::Config(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parse_full_config() {
        let yaml = r#"
script_root: /srv/apps
handler: "site.wasm:app"
multiprocess: false
default_entry_point: main
reload: true
unquote_path_info: true
max_body_bytes: 1024
file_wrapper_block_size: 4096
wasm:
  max_module_bytes: 2048
  fuel:
    default: 2000000
"#;

        let cfg = parse_config(yaml).unwrap();
        assert_eq!(cfg.script_root, Some(PathBuf::from("/srv/apps")));
        assert!(!cfg.get_multiprocess());
        assert_eq!(cfg.get_default_entry_point(), "main");
        assert!(cfg.get_reload());
        assert!(cfg.get_unquote_path_info());
        assert_eq!(cfg.get_max_body_bytes(), 1024);
        assert_eq!(cfg.get_file_wrapper_block_size(), 4096);
        assert_eq!(cfg.wasm.get_max_module_bytes(), 2048);
        assert_eq!(cfg.wasm.fuel.effective(), 2_000_000);

        let handler = cfg.handler_override().unwrap();
        assert_eq!(handler.module_id, "site.wasm");
        assert_eq!(handler.entry_point.as_deref(), Some("app"));
    }

    #[test]
    fn empty_config_uses_defaults() {
        let cfg = parse_config("").unwrap();
        assert!(cfg.get_multiprocess());
        assert_eq!(cfg.get_default_entry_point(), DEFAULT_ENTRY_POINT);
        assert!(!cfg.get_reload());
        assert_eq!(cfg.get_file_wrapper_block_size(), DEFAULT_FILE_WRAPPER_BLOCK_SIZE);
        assert_eq!(cfg.wasm.fuel.effective(), DEFAULT_FUEL_LEVEL);
        assert!(cfg.handler_override().is_none());
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "multiprocess: false").unwrap();

        let cfg = load_config(file.path()).unwrap();
        assert!(!cfg.get_multiprocess());
    }

    #[test]
    fn test_sample_config_loads() {
        let cfg = load_config("configs/host.yaml").unwrap();
        assert_eq!(cfg.script_root, Some(PathBuf::from("/srv/apps")));
        assert_eq!(cfg.get_max_body_bytes(), 10 * 1024 * 1024);
        assert_eq!(cfg.wasm.fuel.effective(), DEFAULT_FUEL_LEVEL);
        assert!(cfg.handler_override().is_none());
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config("/nonexistent/host.yaml");
        assert!(matches!(result, Err(HostError::Config(_))));
    }

    #[test]
    fn test_handler_spec_parsing() {
        assert_eq!(
            HandlerSpec::parse("app.py"),
            Some(HandlerSpec {
                module_id: "app.py".to_string(),
                entry_point: None
            })
        );
        assert_eq!(
            HandlerSpec::parse("app.py:").unwrap().entry_point,
            None
        );
        assert!(HandlerSpec::parse(":app").is_none());
    }

    #[test]
    fn test_resolve_module_path() {
        let cfg = HostConfig {
            script_root: Some(PathBuf::from("/srv/apps")),
            ..Default::default()
        };
        assert_eq!(
            cfg.resolve_module_path("site/app.wasm"),
            PathBuf::from("/srv/apps/site/app.wasm")
        );
        assert_eq!(
            cfg.resolve_module_path("/abs/app.wasm"),
            PathBuf::from("/abs/app.wasm")
        );
    }
}
