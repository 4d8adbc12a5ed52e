//! Delegate Runtime
//!
//! The boundary between a model-execution runtime and the hardware-specific
//! backends that run parts of a compiled model. Backends register under a
//! name; compiled units reference that name and are initialized, executed
//! and destroyed through the [`BackendInterface`](backend::BackendInterface)
//! contract.

pub mod backend;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod memory;
pub mod types;
pub mod version;

pub use backend::{
    BackendInterface, BackendRegistry, Delegate, DelegateHandle, ExecutionContext, InitContext,
    OptionContext, SharedBackend,
};
pub use error::{Error, ErrorCode, Result};
