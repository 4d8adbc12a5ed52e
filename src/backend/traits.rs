//! Backend trait definitions
//!
//! Defines the core BackendInterface trait that all delegate backends must
//! implement, and the contexts the runtime passes to it.

use std::sync::Arc;

use crate::error::Result;
use crate::memory::MemoryAllocator;
use crate::types::{BackendOption, CompileSpec, FreeableBuffer, NamedDataMap, Value};

use super::DelegateHandle;

// ─────────────────────────────────────────────────────────────────
// Runtime Contexts
// ─────────────────────────────────────────────────────────────────

/// Runtime services available during `init`
pub struct InitContext<'a> {
    allocator: &'a dyn MemoryAllocator,
    method_name: Option<&'a str>,
    named_data: Option<&'a dyn NamedDataMap>,
}

impl<'a> InitContext<'a> {
    pub fn new(allocator: &'a dyn MemoryAllocator) -> Self {
        Self {
            allocator,
            method_name: None,
            named_data: None,
        }
    }

    pub fn with_method_name(mut self, method_name: &'a str) -> Self {
        self.method_name = Some(method_name);
        self
    }

    pub fn with_named_data(mut self, named_data: &'a dyn NamedDataMap) -> Self {
        self.named_data = Some(named_data);
        self
    }

    /// Allocator for memory that lives as long as the loaded method
    pub fn runtime_allocator(&self) -> &'a dyn MemoryAllocator {
        self.allocator
    }

    /// Name of the method being loaded
    pub fn method_name(&self) -> Option<&'a str> {
        self.method_name
    }

    /// External data the compiled unit may reference by key
    pub fn named_data(&self) -> Option<&'a dyn NamedDataMap> {
        self.named_data
    }
}

/// Runtime services available during `execute`
#[derive(Default)]
pub struct ExecutionContext<'a> {
    temp_allocator: Option<&'a dyn MemoryAllocator>,
    method_name: Option<&'a str>,
}

impl<'a> ExecutionContext<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_temp_allocator(mut self, allocator: &'a dyn MemoryAllocator) -> Self {
        self.temp_allocator = Some(allocator);
        self
    }

    pub fn with_method_name(mut self, method_name: &'a str) -> Self {
        self.method_name = Some(method_name);
        self
    }

    /// Scratch allocator valid for this call only
    pub fn temp_allocator(&self) -> Option<&'a dyn MemoryAllocator> {
        self.temp_allocator
    }

    pub fn method_name(&self) -> Option<&'a str> {
        self.method_name
    }
}

/// Context for option calls (reserved)
#[derive(Debug, Default)]
pub struct OptionContext {
    _reserved: (),
}

impl OptionContext {
    pub fn new() -> Self {
        Self::default()
    }
}

// ─────────────────────────────────────────────────────────────────
// BackendInterface Trait
// ─────────────────────────────────────────────────────────────────

/// Core trait for delegate backends
///
/// A backend turns an ahead-of-time compiled unit into an executable
/// [`DelegateHandle`] and runs it on demand. Per handle the lifecycle is
/// `init → execute* → destroy`.
///
/// One backend instance serves every handle it issues, so implementations
/// must be safe to call across distinct handles from multiple threads.
/// Concurrent `execute` calls on the *same* handle are only safe if the
/// backend says so; otherwise the caller serializes them.
pub trait BackendInterface: Send + Sync {
    /// Whether this backend can run on this device at all
    ///
    /// Stateless and callable at any time. Callers check it before `init`.
    fn is_available(&self) -> bool;

    /// Prepare a compiled unit for execution
    ///
    /// `processed` is only guaranteed to live for this call. The backend may
    /// [`free`](FreeableBuffer::free) it once consumed or
    /// [`take`](FreeableBuffer::take) its bytes into the handle.
    ///
    /// A unit produced for a different backend runtime version must be
    /// rejected with `Error::DelegateInvalidCompatibility`, not a generic
    /// failure, so the caller can tell the user to recompile.
    fn init(
        &self,
        ctx: &mut InitContext<'_>,
        processed: &mut FreeableBuffer,
        compile_specs: &[CompileSpec<'_>],
    ) -> Result<DelegateHandle>;

    /// Run the delegate once
    ///
    /// `args` holds the method's inputs followed by its outputs, in the
    /// layout fixed at compile time.
    fn execute(
        &self,
        ctx: &mut ExecutionContext<'_>,
        handle: &DelegateHandle,
        args: &mut [Value],
    ) -> Result<()>;

    /// Update backend settings
    ///
    /// Unknown keys are skipped and reported with `Error::OptionsRejected`;
    /// the remaining entries are still applied.
    fn set_option(&self, ctx: &mut OptionContext, options: &[BackendOption]) -> Result<()> {
        let _ = (ctx, options);
        Ok(())
    }

    /// Fill in the current value of each requested option
    ///
    /// The slice length is fixed by the caller. Entries the backend does not
    /// know are left untouched and reported.
    fn get_option(&self, ctx: &mut OptionContext, options: &mut [BackendOption]) -> Result<()> {
        let _ = (ctx, options);
        Ok(())
    }

    /// Release everything tied to `handle`
    fn destroy(&self, handle: DelegateHandle) {
        drop(handle);
    }
}

// ─────────────────────────────────────────────────────────────────
// Arc wrapper for trait objects
// ─────────────────────────────────────────────────────────────────

/// Type alias for a shared backend reference
pub type SharedBackend = Arc<dyn BackendInterface>;

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
