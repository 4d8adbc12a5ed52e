//! Mock backend for testing
//!
//! Provides a scriptable BackendInterface implementation that counts calls,
//! tracks live handles, and can be told to fail at any lifecycle step.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::types::{
    BackendOption, CompileSpec, FreeableBuffer, OptionReport, OptionValue, Value,
};

use super::{BackendInterface, DelegateHandle, ExecutionContext, InitContext, OptionContext};

/// Magic bytes at the start of a mock compiled unit
pub const MOCK_MAGIC: &[u8; 4] = b"MOCK";

const MOCK_NAME: &str = "mock";

// ─────────────────────────────────────────────────────────────────
// Mock Backend Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration for mock backend behavior
#[derive(Debug, Clone)]
pub struct MockConfig {
    /// Reported by `is_available`
    pub available: bool,

    /// Format version the mock accepts
    pub format_version: u32,

    /// Fail `init` / `execute` with this backend code
    pub fail_init_code: Option<u32>,
    pub fail_execute_code: Option<u32>,

    /// Release the processed buffer during `init`
    pub free_processed: bool,

    /// Option keys accepted by `set_option`
    pub known_options: Vec<String>,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            available: true,
            format_version: 1,
            fail_init_code: None,
            fail_execute_code: None,
            free_processed: false,
            known_options: vec!["threads".into(), "profiling".into(), "mode".into()],
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Mock Backend
// ─────────────────────────────────────────────────────────────────

/// Mock implementation of BackendInterface for testing
pub struct MockBackend {
    config: MockConfig,
    options: RwLock<BTreeMap<String, OptionValue>>,
    call_counts: RwLock<CallCounts>,
    live_handles: AtomicUsize,
}

/// Track method call counts for verification
#[derive(Debug, Default)]
struct CallCounts {
    init: u32,
    execute: u32,
    set_option: u32,
    get_option: u32,
    destroy: u32,
}

/// State stored in each mock handle
#[derive(Debug)]
struct MockState {
    unit_len: usize,
    executions: AtomicU64,
}

impl MockBackend {
    /// Create a new mock backend with default configuration
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    /// Create a new mock backend with custom configuration
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            options: RwLock::new(BTreeMap::new()),
            call_counts: RwLock::new(CallCounts::default()),
            live_handles: AtomicUsize::new(0),
        }
    }

    /// Build a compiled unit the mock accepts when `version` matches
    pub fn compiled_unit(version: u32) -> Vec<u8> {
        let mut unit = MOCK_MAGIC.to_vec();
        unit.extend_from_slice(&version.to_le_bytes());
        unit
    }

    /// Get the number of times a method was called
    pub fn call_count(&self, method: &str) -> u32 {
        let counts = self.call_counts.read();
        match method {
            "init" => counts.init,
            "execute" => counts.execute,
            "set_option" => counts.set_option,
            "get_option" => counts.get_option,
            "destroy" => counts.destroy,
            _ => 0,
        }
    }

    /// Reset all call counts
    pub fn reset_counts(&self) {
        *self.call_counts.write() = CallCounts::default();
    }

    /// Handles issued and not yet destroyed
    pub fn live_handles(&self) -> usize {
        self.live_handles.load(Ordering::SeqCst)
    }

    /// Current value of an option set through `set_option`
    pub fn option(&self, key: &str) -> Option<OptionValue> {
        self.options.read().get(key).cloned()
    }

    fn parse_unit(&self, bytes: &[u8]) -> Result<()> {
        if bytes.len() < 8 || &bytes[..4] != MOCK_MAGIC {
            return Err(Error::InvalidProgram(
                "mock unit must start with MOCK and a u32 version".to_string(),
            ));
        }
        let mut version = [0u8; 4];
        version.copy_from_slice(&bytes[4..8]);
        let version = u32::from_le_bytes(version);

        if version != self.config.format_version {
            return Err(Error::incompatible(
                MOCK_NAME,
                format!(
                    "format version {}, expected {}",
                    version, self.config.format_version
                ),
            ));
        }
        Ok(())
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl BackendInterface for MockBackend {
    fn is_available(&self) -> bool {
        self.config.available
    }

    fn init(
        &self,
        _ctx: &mut InitContext<'_>,
        processed: &mut FreeableBuffer,
        _compile_specs: &[CompileSpec<'_>],
    ) -> Result<DelegateHandle> {
        self.call_counts.write().init += 1;

        if let Some(code) = self.config.fail_init_code {
            return Err(Error::backend_failure(MOCK_NAME, code, "mock init failure"));
        }

        if processed.is_freed() {
            return Err(Error::InvalidArgument("processed buffer already freed".into()));
        }
        let bytes = processed.data();
        self.parse_unit(bytes)?;
        let unit_len = bytes.len();

        if self.config.free_processed {
            processed.free();
        }

        self.live_handles.fetch_add(1, Ordering::SeqCst);
        Ok(DelegateHandle::new(MockState {
            unit_len,
            executions: AtomicU64::new(0),
        }))
    }

    fn execute(
        &self,
        _ctx: &mut ExecutionContext<'_>,
        handle: &DelegateHandle,
        args: &mut [Value],
    ) -> Result<()> {
        self.call_counts.write().execute += 1;

        if let Some(code) = self.config.fail_execute_code {
            return Err(Error::backend_failure(MOCK_NAME, code, "mock execute failure"));
        }

        let state = handle.state::<MockState>(MOCK_NAME)?;
        let count = state.executions.fetch_add(1, Ordering::SeqCst) + 1;

        // Last slot receives the per-handle execution count
        if let Some(out) = args.last_mut() {
            *out = Value::Int(count as i64);
        }
        tracing::trace!(unit_len = state.unit_len, count, "Mock execute");
        Ok(())
    }

    fn set_option(&self, _ctx: &mut OptionContext, options: &[BackendOption]) -> Result<()> {
        self.call_counts.write().set_option += 1;

        let mut report = OptionReport::new();
        let mut stored = self.options.write();
        for option in options {
            if self.config.known_options.iter().any(|k| *k == option.key) {
                stored.insert(option.key.clone(), option.value.clone());
            } else {
                report.reject(&option.key);
            }
        }
        report.into_result(MOCK_NAME)
    }

    fn get_option(&self, _ctx: &mut OptionContext, options: &mut [BackendOption]) -> Result<()> {
        self.call_counts.write().get_option += 1;

        let mut report = OptionReport::new();
        let stored = self.options.read();
        for option in options.iter_mut() {
            if option.key == "version" {
                option.value = OptionValue::Int(i64::from(self.config.format_version));
            } else if let Some(value) = stored.get(&option.key) {
                option.value = value.clone();
            } else {
                report.reject(&option.key);
            }
        }
        report.into_result(MOCK_NAME)
    }

    fn destroy(&self, handle: DelegateHandle) {
        self.call_counts.write().destroy += 1;

        match handle.into_state::<MockState>() {
            Ok(_) => {
                self.live_handles.fetch_sub(1, Ordering::SeqCst);
            }
            Err(handle) => {
                tracing::warn!(handle = %handle.id(), "Mock asked to destroy a foreign handle");
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ArenaAllocator;

    fn init(backend: &MockBackend, unit: Vec<u8>) -> Result<DelegateHandle> {
        let arena = ArenaAllocator::new(64);
        let mut ctx = InitContext::new(&arena);
        let mut processed = FreeableBuffer::new(unit);
        backend.init(&mut ctx, &mut processed, &[])
    }

    #[test]
    fn test_mock_lifecycle() {
        let backend = MockBackend::new();
        let handle = init(&backend, MockBackend::compiled_unit(1)).unwrap();
        assert_eq!(backend.live_handles(), 1);

        let mut args = vec![Value::None];
        backend
            .execute(&mut ExecutionContext::new(), &handle, &mut args)
            .unwrap();
        backend
            .execute(&mut ExecutionContext::new(), &handle, &mut args)
            .unwrap();
        assert_eq!(args[0], Value::Int(2));

        backend.destroy(handle);
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn test_mock_version_mismatch() {
        let backend = MockBackend::new();
        let err = init(&backend, MockBackend::compiled_unit(2)).unwrap_err();
        assert!(matches!(err, Error::DelegateInvalidCompatibility { .. }));
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn test_mock_bad_magic() {
        let backend = MockBackend::new();
        let err = init(&backend, b"NOPE\x01\x00\x00\x00".to_vec()).unwrap_err();
        assert!(matches!(err, Error::InvalidProgram(_)));
    }

    #[test]
    fn test_mock_free_processed() {
        let backend = MockBackend::with_config(MockConfig {
            free_processed: true,
            ..Default::default()
        });
        let arena = ArenaAllocator::new(64);
        let mut ctx = InitContext::new(&arena);
        let mut processed = FreeableBuffer::new(MockBackend::compiled_unit(1));

        let handle = backend.init(&mut ctx, &mut processed, &[]).unwrap();
        assert!(processed.is_freed());
        backend.destroy(handle);
    }

    #[test]
    fn test_mock_foreign_handle() {
        let backend = MockBackend::new();
        let foreign = DelegateHandle::new(42u32);
        let err = backend
            .execute(&mut ExecutionContext::new(), &foreign, &mut [])
            .unwrap_err();
        assert!(matches!(err, Error::DelegateInvalidHandle { .. }));

        backend.destroy(foreign);
        assert_eq!(backend.call_count("destroy"), 1);
        assert_eq!(backend.live_handles(), 0);
    }

    #[test]
    fn test_mock_partial_option_failure() {
        let backend = MockBackend::new();
        let opts = [
            BackendOption::new("threads", OptionValue::Int(2)).unwrap(),
            BackendOption::new("bogus", OptionValue::Int(1)).unwrap(),
            BackendOption::new("mode", OptionValue::Str("fast".into())).unwrap(),
        ];

        let err = backend
            .set_option(&mut OptionContext::new(), &opts)
            .unwrap_err();
        assert!(matches!(err, Error::OptionsRejected { ref keys, .. } if keys == &["bogus"]));
        assert_eq!(backend.option("threads"), Some(OptionValue::Int(2)));
        assert_eq!(backend.option("mode"), Some(OptionValue::Str("fast".into())));
    }

    #[test]
    fn test_call_counting() {
        let backend = MockBackend::new();
        let handle = init(&backend, MockBackend::compiled_unit(1)).unwrap();
        for _ in 0..3 {
            backend
                .execute(&mut ExecutionContext::new(), &handle, &mut [])
                .unwrap();
        }
        backend.destroy(handle);

        assert_eq!(backend.call_count("init"), 1);
        assert_eq!(backend.call_count("execute"), 3);
        assert_eq!(backend.call_count("destroy"), 1);

        backend.reset_counts();
        assert_eq!(backend.call_count("execute"), 0);
    }
}
