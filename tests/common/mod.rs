//! Common test utilities and fixtures
//!
//! This module provides shared test infrastructure

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use delegate_runtime::backend::{BackendRegistry, Delegate, InitContext, MockBackend, MockConfig};
use delegate_runtime::memory::ArenaAllocator;
use delegate_runtime::types::FreeableBuffer;
use delegate_runtime::Result;

/// Get the path to the test fixtures directory
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

/// Get a path to a specific fixture file
pub fn fixture_path(name: &str) -> PathBuf {
    fixtures_dir().join(name)
}

/// Get the valid config fixture path
pub fn valid_config_fixture() -> PathBuf {
    fixture_path("valid_config.toml")
}

/// Get the invalid config fixture path
pub fn invalid_config_fixture() -> PathBuf {
    fixture_path("invalid_config.toml")
}

/// A fresh mock with default behavior
pub fn mock() -> Arc<MockBackend> {
    Arc::new(MockBackend::new())
}

/// A mock with custom behavior
pub fn mock_with(config: MockConfig) -> Arc<MockBackend> {
    Arc::new(MockBackend::with_config(config))
}

/// Registry holding one backend under `name`
pub fn registry_with(name: &str, backend: Arc<MockBackend>) -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    registry
        .register(name, backend)
        .expect("first registration succeeds");
    registry
}

/// Initialize a mock compiled unit of `version` on the backend named `name`
pub fn load_mock_unit(registry: &BackendRegistry, name: &str, version: u32) -> Result<Delegate> {
    let arena = ArenaAllocator::new(4096);
    let mut ctx = InitContext::new(&arena).with_method_name("forward");
    let mut processed = FreeableBuffer::new(MockBackend::compiled_unit(version));
    Delegate::init(registry, name, &mut ctx, &mut processed, &[])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_dir_exists() {
        assert!(fixtures_dir().exists(), "Fixtures directory should exist");
    }

    #[test]
    fn test_config_fixtures_exist() {
        assert!(valid_config_fixture().exists());
        assert!(invalid_config_fixture().exists());
    }
}
