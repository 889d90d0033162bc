// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::handler::Application;
use crate::modules::ModuleSource;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// A name defined by a loaded module.
#[derive(Clone)]
pub enum NamespaceEntry {
    /// Invocable handler
    Handler(Arc<dyn Application>),
    /// Anything else, described for diagnostics
    Value(String),
}

impl fmt::Debug for NamespaceEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NamespaceEntry::Handler(_) => f.write_str("Handler(..)"),
            NamespaceEntry::Value(desc) => f.debug_tuple("Value").field(desc).finish(),
        }
    }
}

/// A module as cached by a context: its source plus its namespace.
pub struct LoadedModule {
    source: ModuleSource,
    namespace: HashMap<String, NamespaceEntry>,
}

impl LoadedModule {
    pub fn new(source: ModuleSource) -> Self {
        Self {
            source,
            namespace: HashMap::new(),
        }
    }

    pub fn source(&self) -> &ModuleSource {
        &self.source
    }

    pub fn define_handler(&mut self, name: impl Into<String>, handler: Arc<dyn Application>) {
        self.namespace
            .insert(name.into(), NamespaceEntry::Handler(handler));
    }

    pub fn define_value(&mut self, name: impl Into<String>, description: impl Into<String>) {
        self.namespace
            .insert(name.into(), NamespaceEntry::Value(description.into()));
    }

    pub fn entry(&self, name: &str) -> Option<&NamespaceEntry> {
        self.namespace.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.namespace.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.namespace.len()
    }

    pub fn is_empty(&self) -> bool {
        self.namespace.is_empty()
    }

    /// Look up an invocable entry. The error explains why resolution failed.
    pub fn handler(&self, name: &str) -> Result<Arc<dyn Application>, String> {
        match self.namespace.get(name) {
            Some(NamespaceEntry::Handler(handler)) => Ok(handler.clone()),
            Some(NamespaceEntry::Value(desc)) => Err(format!("'{}' is not invocable ({})", name, desc)),
            None => Err(format!("'{}' is not defined", name)),
        }
    }
}
