//! Plugin Registry: name → plugin instance lookup.
//!
//! Each plugin kind (approvers, inspectors) gets its own [`Registry`]. Plugins
//! are registered once while the process starts up and resolved by name when
//! the policy is built:
//! - Names are stored lowercased and must be unique across casings
//! - A single reader/writer lock serializes access; nothing runs under it
//!   besides map operations

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::approvers::{self, Approver};
use crate::errors::RegistryError;
use crate::inspectors::{self, Inspector};

/// Registry of plugins of one kind, keyed by lowercase name.
pub struct Registry<P: ?Sized> {
    kind: &'static str,
    plugins: RwLock<HashMap<String, Arc<P>>>,
}

impl<P: ?Sized> Registry<P> {
    /// `kind` names the plugin family in diagnostics ("approver", "inspector").
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            plugins: RwLock::new(HashMap::new()),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Make a plugin available under `name`.
    ///
    /// # Panics
    /// If `name` is empty or already registered under any casing. Both are
    /// startup programming errors; use [`Registry::try_register`] to recover.
    pub fn register(&self, name: &str, plugin: Arc<P>) {
        if let Err(e) = self.try_register(name, plugin) {
            panic!("{}", e);
        }
    }

    /// Same checks as [`Registry::register`], reported instead of panicking.
    pub fn try_register(&self, name: &str, plugin: Arc<P>) -> Result<(), RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::EmptyName { kind: self.kind });
        }

        // Enforce lowercase names so lookups don't depend on caller casing.
        let name = name.to_lowercase();

        let mut plugins = self.write();
        if plugins.contains_key(&name) {
            return Err(RegistryError::Duplicate {
                kind: self.kind,
                name,
            });
        }
        plugins.insert(name.clone(), plugin);
        drop(plugins);

        tracing::debug!(kind = self.kind, plugin = %name, "plugin registered");
        Ok(())
    }

    /// Look up a plugin by its stored (lowercase) name.
    pub fn get(&self, name: &str) -> Option<Arc<P>> {
        self.read().get(name).cloned()
    }

    /// Registered names, sorted. Used for diagnostics only.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Remove a plugin. Removing an unknown name is a no-op.
    pub fn unregister(&self, name: &str) {
        self.write().remove(name);
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // The map holds no cross-entry invariant a panicking writer could break,
    // so a poisoned lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Arc<P>>> {
        self.plugins.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Arc<P>>> {
        self.plugins.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The approver and inspector registries of one process.
pub struct Plugins {
    pub approvers: Registry<dyn Approver>,
    pub inspectors: Registry<dyn Inspector>,
}

impl Plugins {
    /// Empty registries; callers register their own plugins.
    pub fn new() -> Self {
        Self {
            approvers: Registry::new("approver"),
            inspectors: Registry::new("inspector"),
        }
    }

    /// Registries pre-populated with every built-in plugin.
    pub fn with_builtins() -> Self {
        let plugins = Self::new();
        approvers::register_builtins(&plugins.approvers);
        inspectors::register_builtins(&plugins.inspectors);
        plugins
    }
}

impl Default for Plugins {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ──────────────────────────────────────────────────────
