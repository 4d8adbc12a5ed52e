//! Type definitions for the delegate runtime
//!
//! This module contains the data shapes that cross the backend boundary:
//! compiled-unit buffers and compile specs, backend options, argument
//! slots, and named data.

mod buffer;
mod data_map;
mod options;
mod value;

pub use buffer::*;
pub use data_map::*;
pub use options::*;
pub use value::*;
