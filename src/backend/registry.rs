//! Backend Registry
//!
//! Maps backend names to backend instances. The runtime builds one registry
//! at startup, registers every backend it ships with, and then shares it
//! read-only for the rest of the process.

use std::fmt;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::types::BackendOption;

use super::{OptionContext, SharedBackend};

/// Default number of registry slots
pub const DEFAULT_REGISTRY_CAPACITY: usize = 16;

// ─────────────────────────────────────────────────────────────────
// Registered Backend
// ─────────────────────────────────────────────────────────────────

/// A named backend instance
#[derive(Clone)]
pub struct Backend {
    /// Name compiled units use to target this backend
    pub name: String,
    /// The instance used to load and execute delegates
    pub backend: SharedBackend,
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend").field("name", &self.name).finish()
    }
}

// ─────────────────────────────────────────────────────────────────
// Backend Registry
// ─────────────────────────────────────────────────────────────────

/// Fixed-capacity table of named backends
///
/// Registration needs `&mut self`, so it can only happen before the registry
/// is shared. Lookups take `&self` and need no locking.
///
/// Re-registering a name that is already present is rejected with
/// `Error::DuplicateName`; the existing entry is kept.
pub struct BackendRegistry {
    entries: Vec<Backend>,
    capacity: usize,
}

impl BackendRegistry {
    /// Create an empty registry with the default capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_REGISTRY_CAPACITY)
    }

    /// Create an empty registry holding at most `capacity` backends
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Register a backend under `name`
    pub fn register(&mut self, name: impl Into<String>, backend: SharedBackend) -> Result<()> {
        let name = name.into();

        if name.is_empty() {
            return Err(Error::InvalidArgument(
                "backend name cannot be empty".to_string(),
            ));
        }
        if self.lookup(&name).is_some() {
            return Err(Error::DuplicateName { name });
        }
        if self.entries.len() >= self.capacity {
            return Err(Error::CapacityExceeded {
                name,
                capacity: self.capacity,
            });
        }

        info!(
            backend = %name,
            available = backend.is_available(),
            slot = self.entries.len(),
            "Backend registered"
        );
        self.entries.push(Backend { name, backend });
        Ok(())
    }

    /// Find the backend registered under `name`
    pub fn lookup(&self, name: &str) -> Option<&SharedBackend> {
        self.entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| &entry.backend)
    }

    /// Number of registered backends
    pub fn count(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Maximum number of backends
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Name of the backend at `index`, in registration order
    pub fn name_at(&self, index: usize) -> Result<&str> {
        self.entries
            .get(index)
            .map(|entry| entry.name.as_str())
            .ok_or(Error::IndexOutOfRange {
                index,
                count: self.entries.len(),
            })
    }

    /// Registered names in registration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|entry| entry.name.as_str())
    }

    /// All registered backends
    pub fn entries(&self) -> &[Backend] {
        &self.entries
    }

    // ─────────────────────────────────────────────────────────────
    // Name-routed option channel
    // ─────────────────────────────────────────────────────────────

    /// Push options to the backend registered under `name`
    ///
    /// Returns the backend's own result unchanged.
    pub fn set_option(&self, name: &str, options: &[BackendOption]) -> Result<()> {
        let backend = self
            .lookup(name)
            .ok_or_else(|| Error::backend_not_found(name))?;

        debug!(backend = %name, count = options.len(), "Routing set_option");
        backend.set_option(&mut OptionContext::new(), options)
    }

    /// Read options from the backend registered under `name`
    ///
    /// `options` is filled in place; its length never changes.
    pub fn get_option(&self, name: &str, options: &mut [BackendOption]) -> Result<()> {
        let backend = self
            .lookup(name)
            .ok_or_else(|| Error::backend_not_found(name))?;

        debug!(backend = %name, count = options.len(), "Routing get_option");
        backend.get_option(&mut OptionContext::new(), options)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("names", &self.names().collect::<Vec<_>>())
            .field("capacity", &self.capacity)
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
