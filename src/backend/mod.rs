//! Backend module for delegated execution
//!
//! This module provides the contract every delegate backend implements, the
//! registry that maps backend names to instances, and the backends that ship
//! with the runtime.

mod traits;
mod handle;
mod registry;
mod delegate;
mod cpu;
mod mock;

pub use traits::*;
pub use handle::{DelegateHandle, HandleId};
pub use registry::*;
pub use delegate::Delegate;
pub use cpu::{unit_digest, CpuProgram, CpuReferenceBackend, Op, CPU_REF_FORMAT_VERSION, CPU_REF_NAME};
pub use mock::{MockBackend, MockConfig, MOCK_MAGIC};
