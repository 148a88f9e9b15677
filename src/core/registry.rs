// SPDX-FileCopyrightText: 2026 ArcheBase
//
// SPDX-License-Identifier: MulanPSL-2.0

//! Shared name-keyed registry.
//!
//! Used for message descriptors consumed by the traversal engine. The
//! registry is filled once at start-up and read concurrently afterwards.
//!
//! # Registration discipline
//!
//! All registration must complete before any concurrent encode/decode
//! traffic begins. The lock only keeps the map memory-safe; registering
//! while traffic is live is unsupported, and whether an in-flight call sees
//! the new entry is undefined.

use super::error::{DcclError, Result};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Thread-safe registry of named, immutable entries.
pub struct TypeRegistry<T> {
    entries: RwLock<HashMap<String, Arc<T>>>,
}

impl<T> TypeRegistry<T> {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<String, Arc<T>>>> {
        self.entries
            .read()
            .map_err(|e| DcclError::Other(format!("Registry lock poisoned: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, Arc<T>>>> {
        self.entries
            .write()
            .map_err(|e| DcclError::Other(format!("Registry lock poisoned: {e}")))
    }

    /// Register an entry, replacing any previous entry of the same name.
    pub fn register(&self, name: impl Into<String>, entry: T) -> Result<()> {
        self.write()?.insert(name.into(), Arc::new(entry));
        Ok(())
    }

    /// Get an entry by name.
    pub fn get(&self, name: &str) -> Result<Option<Arc<T>>> {
        Ok(self.read()?.get(name).cloned())
    }

    /// Check if an entry is registered.
    pub fn contains(&self, name: &str) -> Result<bool> {
        Ok(self.read()?.contains_key(name))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.read()?.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    /// Number of registered entries.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.len())
    }

    /// Check if the registry is empty.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

impl<T> Default for TypeRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> std::fmt::Debug for TypeRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TypeRegistry")
            .field("names", &self.names().unwrap_or_default())
            .finish()
    }
}
