// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::HostError;
use std::path::{Path, PathBuf};

/// Where a module comes from.
///
/// Relative paths used by the module itself resolve against `base_dir`
/// through [`resolve_relative`](Self::resolve_relative); the process working
/// directory is never changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleSource {
    module_id: String,
    path: PathBuf,
    base_dir: PathBuf,
}

impl ModuleSource {
    pub fn new(module_id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let base_dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        Self {
            module_id: module_id.into(),
            path,
            base_dir,
        }
    }

    pub fn module_id(&self) -> &str {
        &self.module_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Module name: file name without its extension.
    pub fn name(&self) -> String {
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.module_id.clone())
    }

    /// Resolve a path the module refers to against the module's directory.
    pub fn resolve_relative(&self, relative: impl AsRef<Path>) -> PathBuf {
        let relative = relative.as_ref();
        if relative.is_absolute() {
            relative.to_path_buf()
        } else {
            self.base_dir.join(relative)
        }
    }

    pub fn is_wasm(&self) -> bool {
        self.path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("wasm"))
    }

    /// A load failure for this module.
    pub fn load_error(&self, cause: impl ToString) -> HostError {
        HostError::ModuleLoad {
            module_id: self.module_id.clone(),
            cause: cause.to_string(),
        }
    }
}
