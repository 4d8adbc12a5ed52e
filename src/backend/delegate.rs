//! Loaded delegate instances
//!
//! A [`Delegate`] pairs a handle with the backend that issued it. Lookup,
//! availability check, and `init` happen in the constructor; the handle goes
//! back to the same backend on every `execute` and exactly once on destroy.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tracing::{debug, info, trace, warn};

use crate::error::{Error, Result};
use crate::types::{CompileSpec, FreeableBuffer, Value};

use super::{BackendRegistry, DelegateHandle, ExecutionContext, HandleId, InitContext, SharedBackend};

/// An initialized delegate bound to its backend
pub struct Delegate {
    name: String,
    backend: SharedBackend,
    handle: Option<DelegateHandle>,
    executions: AtomicU64,
}

impl Delegate {
    /// Resolve `name` in the registry and initialize a compiled unit on it
    ///
    /// Fails with `BackendNotFound` for an unknown name and
    /// `BackendUnavailable` when the backend cannot run here. Errors from the
    /// backend's own `init` are returned unchanged.
    pub fn init(
        registry: &BackendRegistry,
        name: &str,
        ctx: &mut InitContext<'_>,
        processed: &mut FreeableBuffer,
        compile_specs: &[CompileSpec<'_>],
    ) -> Result<Self> {
        let backend = registry
            .lookup(name)
            .ok_or_else(|| Error::backend_not_found(name))?
            .clone();

        Self::init_backend(name, backend, ctx, processed, compile_specs)
    }

    /// Initialize a compiled unit on an already resolved backend
    pub fn init_backend(
        name: &str,
        backend: SharedBackend,
        ctx: &mut InitContext<'_>,
        processed: &mut FreeableBuffer,
        compile_specs: &[CompileSpec<'_>],
    ) -> Result<Self> {
        if !backend.is_available() {
            warn!(backend = %name, "Backend is not available on this device");
            return Err(Error::BackendUnavailable {
                name: name.to_string(),
            });
        }

        debug!(
            backend = %name,
            method = ctx.method_name().unwrap_or("-"),
            bytes = processed.len(),
            specs = compile_specs.len(),
            "Initializing delegate"
        );

        let mut handle = backend.init(ctx, processed, compile_specs).map_err(|e| {
            warn!(backend = %name, error = %e.format_for_log(), "Delegate init failed");
            e
        })?;
        handle.bind_owner(name);

        info!(backend = %name, handle = %handle.id(), "Delegate initialized");

        Ok(Self {
            name: name.to_string(),
            backend,
            handle: Some(handle),
            executions: AtomicU64::new(0),
        })
    }

    /// Run the delegate once
    pub fn execute(&self, ctx: &mut ExecutionContext<'_>, args: &mut [Value]) -> Result<()> {
        let handle = self
            .handle
            .as_ref()
            .ok_or_else(|| Error::InvalidState(format!("delegate '{}' was destroyed", self.name)))?;
        debug_assert_eq!(handle.owner(), Some(self.name.as_str()));

        trace!(backend = %self.name, handle = %handle.id(), args = args.len(), "Executing delegate");
        self.backend.execute(ctx, handle, args)?;
        self.executions.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Release the handle back to its backend
    pub fn destroy(mut self) {
        self.release();
    }

    /// Name of the backend this delegate runs on
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle_id(&self) -> Option<HandleId> {
        self.handle.as_ref().map(DelegateHandle::id)
    }

    /// Number of successful executions
    pub fn executions(&self) -> u64 {
        self.executions.load(Ordering::Relaxed)
    }

    fn release(&mut self) {
        if let Some(handle) = self.handle.take() {
            let id = handle.id();
            self.backend.destroy(handle);
            info!(
                backend = %self.name,
                handle = %id,
                executions = self.executions(),
                "Delegate destroyed"
            );
        }
    }
}

impl Drop for Delegate {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Delegate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delegate")
            .field("name", &self.name)
            .field("handle", &self.handle_id())
            .field("executions", &self.executions())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockBackend, MockConfig};
    use crate::memory::ArenaAllocator;
    use std::sync::Arc;

    fn registry_with(name: &str, mock: Arc<MockBackend>) -> BackendRegistry {
        let mut registry = BackendRegistry::new();
        registry.register(name, mock).unwrap();
        registry
    }

    fn load(registry: &BackendRegistry, name: &str, version: u32) -> Result<Delegate> {
        let arena = ArenaAllocator::new(1024);
        let mut ctx = InitContext::new(&arena);
        let mut processed = FreeableBuffer::new(MockBackend::compiled_unit(version));
        Delegate::init(registry, name, &mut ctx, &mut processed, &[])
    }

    #[test]
    fn test_lifecycle() {
        let mock = Arc::new(MockBackend::new());
        let registry = registry_with("npu", mock.clone());

        let delegate = load(&registry, "npu", 1).unwrap();
        assert!(delegate.handle_id().is_some());
        assert_eq!(mock.live_handles(), 1);

        let mut args = vec![Value::Int(1)];
        for _ in 0..3 {
            delegate.execute(&mut ExecutionContext::new(), &mut args).unwrap();
        }
        assert_eq!(delegate.executions(), 3);
        assert_eq!(mock.call_count("execute"), 3);

        delegate.destroy();
        assert_eq!(mock.call_count("destroy"), 1);
        assert_eq!(mock.live_handles(), 0);
    }

    #[test]
    fn test_drop_destroys_once() {
        let mock = Arc::new(MockBackend::new());
        let registry = registry_with("npu", mock.clone());

        {
            let _delegate = load(&registry, "npu", 1).unwrap();
        }
        assert_eq!(mock.call_count("destroy"), 1);
        assert_eq!(mock.live_handles(), 0);
    }

    #[test]
    fn test_unknown_backend() {
        let registry = BackendRegistry::new();
        assert!(matches!(
            load(&registry, "npu", 1),
            Err(Error::BackendNotFound { .. })
        ));
    }

    #[test]
    fn test_unavailable_backend_never_initialized() {
        let mock = Arc::new(MockBackend::with_config(MockConfig {
            available: false,
            ..Default::default()
        }));
        let registry = registry_with("npu", mock.clone());

        assert!(matches!(
            load(&registry, "npu", 1),
            Err(Error::BackendUnavailable { .. })
        ));
        assert_eq!(mock.call_count("init"), 0);
    }

    #[test]
    fn test_incompatible_unit() {
        let mock = Arc::new(MockBackend::new());
        let registry = registry_with("npu", mock.clone());

        let err = load(&registry, "npu", 99).unwrap_err();
        assert!(matches!(err, Error::DelegateInvalidCompatibility { .. }));
        assert_eq!(mock.live_handles(), 0);
        assert_eq!(mock.call_count("destroy"), 0);
    }

    #[test]
    fn test_execute_failure_forwarded() {
        let mock = Arc::new(MockBackend::with_config(MockConfig {
            fail_execute_code: Some(17),
            ..Default::default()
        }));
        let registry = registry_with("npu", mock.clone());
        let delegate = load(&registry, "npu", 1).unwrap();

        let err = delegate
            .execute(&mut ExecutionContext::new(), &mut [])
            .unwrap_err();
        assert!(matches!(err, Error::InternalBackendFailure { code: 17, .. }));
        assert_eq!(delegate.executions(), 0);
    }
}
