//! Error types for the delegate runtime
//!
//! Provides structured error handling with:
//! - Numeric error codes shared with compiled-unit tooling
//! - User-friendly messages with suggestions
//! - Exit codes for the CLI
//!
//! Registry operations only produce their own kinds (`NotFound`,
//! `CapacityExceeded`, `DuplicateName`, `IndexOutOfRange`) when they fail
//! before reaching a backend. Anything a backend returns is forwarded as-is.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for runtime operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes
///
/// Values below 0x40 match the codes compiled units and their tooling use,
/// so a code reported by a backend means the same thing on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // System errors (0x0x)
    Internal = 0x01,
    InvalidState = 0x02,

    // Logical errors (0x1x)
    NotSupported = 0x10,
    InvalidArgument = 0x12,

    // Resource errors (0x2x)
    NotFound = 0x20,
    MemoryAllocationFailed = 0x21,
    InvalidProgram = 0x23,

    // Delegate errors (0x3x)
    DelegateInvalidCompatibility = 0x30,
    DelegateMemoryAllocationFailed = 0x31,
    DelegateInvalidHandle = 0x32,

    // Registry errors (0x4x)
    CapacityExceeded = 0x40,
    DuplicateName = 0x41,
    IndexOutOfRange = 0x42,

    // Configuration and IO errors (0x5x)
    ConfigNotFound = 0x50,
    ConfigParse = 0x51,
    ConfigValidation = 0x52,
    Io = 0x53,
}

impl ErrorCode {
    /// Get the string code (e.g., "E030")
    pub fn as_str(&self) -> String {
        format!("E{:03X}", *self as u16)
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            0x00..=0x0F => 90, // System errors
            0x10..=0x1F => 20, // Logical errors
            0x20..=0x2F => 30, // Resource errors
            0x30..=0x3F => 40, // Delegate errors
            0x40..=0x4F => 50, // Registry errors
            0x50..=0x5F => 10, // Config errors
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for the runtime
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Lookup Errors
    // ─────────────────────────────────────────────────────────────

    /// No backend registered under this name
    #[error("Backend '{name}' is not registered")]
    BackendNotFound { name: String },

    /// Backend is registered but cannot run on this device
    #[error("Backend '{name}' is not available on this device")]
    BackendUnavailable { name: String },

    /// Some option keys were unknown or did not fit; the rest were applied
    #[error("Backend '{backend}' rejected options: {}", keys.join(", "))]
    OptionsRejected { backend: String, keys: Vec<String> },

    /// Named data entry does not exist
    #[error("Named data '{key}' not found")]
    NamedDataNotFound { key: String },

    // ─────────────────────────────────────────────────────────────
    // Registry Errors
    // ─────────────────────────────────────────────────────────────

    /// Registry table is full
    #[error("Cannot register backend '{name}': registry is full ({capacity} entries)")]
    CapacityExceeded { name: String, capacity: usize },

    /// Name already present in the registry
    #[error("Backend '{name}' is already registered")]
    DuplicateName { name: String },

    /// Enumeration index past the end of the table
    #[error("Backend index {index} out of range (registered: {count})")]
    IndexOutOfRange { index: usize, count: usize },

    // ─────────────────────────────────────────────────────────────
    // Delegate Errors
    // ─────────────────────────────────────────────────────────────

    /// Compiled unit was produced for a different backend runtime
    #[error("Compiled unit is incompatible with backend '{backend}': {reason}")]
    DelegateInvalidCompatibility { backend: String, reason: String },

    /// Backend-specific failure, forwarded without interpretation
    #[error("Backend '{backend}' failed with code {code}: {message}")]
    InternalBackendFailure {
        backend: String,
        code: u32,
        message: String,
    },

    /// Handle was not issued by this backend or has the wrong shape
    #[error("Invalid delegate handle passed to backend '{backend}'")]
    DelegateInvalidHandle { backend: String },

    /// Backend could not allocate memory for a delegate
    #[error("Backend '{backend}' could not allocate {requested} bytes")]
    DelegateMemoryAllocationFailed { backend: String, requested: usize },

    // ─────────────────────────────────────────────────────────────
    // Runtime Errors
    // ─────────────────────────────────────────────────────────────

    /// Allocator budget exhausted
    #[error("Memory allocation failed: requested {requested} bytes, {available} available")]
    MemoryAllocationFailed { requested: usize, available: usize },

    /// Compiled unit could not be parsed or verified
    #[error("Invalid program: {0}")]
    InvalidProgram(String),

    /// Argument outside the accepted domain
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Operation not valid in the current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),

    // ─────────────────────────────────────────────────────────────
    // Configuration & IO Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    /// Generic configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File read error
    #[error("Failed to read file: {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::BackendNotFound { .. } => ErrorCode::NotFound,
            Error::BackendUnavailable { .. } => ErrorCode::NotFound,
            Error::OptionsRejected { .. } => ErrorCode::NotFound,
            Error::NamedDataNotFound { .. } => ErrorCode::NotFound,

            Error::CapacityExceeded { .. } => ErrorCode::CapacityExceeded,
            Error::DuplicateName { .. } => ErrorCode::DuplicateName,
            Error::IndexOutOfRange { .. } => ErrorCode::IndexOutOfRange,

            Error::DelegateInvalidCompatibility { .. } => ErrorCode::DelegateInvalidCompatibility,
            Error::InternalBackendFailure { .. } => ErrorCode::Internal,
            Error::DelegateInvalidHandle { .. } => ErrorCode::DelegateInvalidHandle,
            Error::DelegateMemoryAllocationFailed { .. } => {
                ErrorCode::DelegateMemoryAllocationFailed
            }

            Error::MemoryAllocationFailed { .. } => ErrorCode::MemoryAllocationFailed,
            Error::InvalidProgram(_) => ErrorCode::InvalidProgram,
            Error::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Error::InvalidState(_) => ErrorCode::InvalidState,
            Error::Internal(_) => ErrorCode::Internal,

            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParse,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,
            Error::Config(_) => ErrorCode::ConfigValidation,
            Error::IoRead { .. } => ErrorCode::Io,
            Error::Io(_) => ErrorCode::Io,
            Error::Toml(_) => ErrorCode::ConfigParse,
        }
    }

    /// Whether the error originated inside a backend
    pub fn is_backend_error(&self) -> bool {
        matches!(
            self,
            Error::DelegateInvalidCompatibility { .. }
                | Error::InternalBackendFailure { .. }
                | Error::DelegateInvalidHandle { .. }
                | Error::DelegateMemoryAllocationFailed { .. }
                | Error::OptionsRejected { .. }
        )
    }

    /// Whether the error was produced by the registry itself
    pub fn is_registry_error(&self) -> bool {
        matches!(
            self,
            Error::BackendNotFound { .. }
                | Error::CapacityExceeded { .. }
                | Error::DuplicateName { .. }
                | Error::IndexOutOfRange { .. }
        )
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::BackendNotFound { .. } => Some(
                "Run 'delegate-runtime backends' to list the registered backends.",
            ),
            Error::BackendUnavailable { .. } => Some(
                "This device lacks what the backend needs. Recompile the model for another backend.",
            ),
            Error::OptionsRejected { .. } => Some(
                "Check the option keys and value types supported by this backend.",
            ),
            Error::CapacityExceeded { .. } => Some(
                "Increase 'registry.capacity' in the configuration file.",
            ),
            Error::DelegateInvalidCompatibility { .. } => Some(
                "Recompile the model for this backend's runtime version.",
            ),
            Error::InvalidProgram(_) => Some(
                "The compiled unit is corrupted or truncated. Re-export it.",
            ),
            Error::MemoryAllocationFailed { .. } | Error::DelegateMemoryAllocationFailed { .. } => {
                Some("Increase the arena sizes in the [memory] configuration section.")
            }
            Error::ConfigNotFound { .. } => Some(
                "Run 'delegate-runtime config init' to create a default configuration file.",
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'delegate-runtime config validate' to see details.",
            ),
            Error::ConfigValidation { .. } => Some(
                "Review the configuration file and fix the invalid values.",
            ),
            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let mut output = format!(
            "\x1b[31mError [{}]\x1b[0m: {}\n",
            self.code().as_str(),
            self
        );

        if let Some(hint) = self.suggestion() {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    /// Create a backend not found error
    pub fn backend_not_found(name: impl Into<String>) -> Self {
        Error::BackendNotFound { name: name.into() }
    }

    /// Create an incompatible compiled unit error
    pub fn incompatible(backend: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::DelegateInvalidCompatibility {
            backend: backend.into(),
            reason: reason.into(),
        }
    }

    /// Create an opaque backend failure
    pub fn backend_failure(backend: impl Into<String>, code: u32, message: impl Into<String>) -> Self {
        Error::InternalBackendFailure {
            backend: backend.into(),
            code,
            message: message.into(),
        }
    }

    /// Create an invalid handle error
    pub fn invalid_handle(backend: impl Into<String>) -> Self {
        Error::DelegateInvalidHandle {
            backend: backend.into(),
        }
    }

    /// Create a config validation error with field name
    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_format() {
        assert_eq!(ErrorCode::Internal.as_str(), "E001");
        assert_eq!(ErrorCode::NotFound.as_str(), "E020");
        assert_eq!(ErrorCode::DelegateInvalidCompatibility.as_str(), "E030");
    }

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(ErrorCode::Internal.exit_code(), 90);
        assert_eq!(ErrorCode::InvalidArgument.exit_code(), 20);
        assert_eq!(ErrorCode::NotFound.exit_code(), 30);
        assert_eq!(ErrorCode::DelegateInvalidHandle.exit_code(), 40);
        assert_eq!(ErrorCode::CapacityExceeded.exit_code(), 50);
        assert_eq!(ErrorCode::ConfigParse.exit_code(), 10);
    }

    #[test]
    fn test_incompatible_is_distinct_from_backend_failure() {
        let incompatible = Error::incompatible("npu", "format version 3, expected 2");
        let failure = Error::backend_failure("npu", 7, "device lost");

        assert_eq!(incompatible.code(), ErrorCode::DelegateInvalidCompatibility);
        assert_eq!(failure.code(), ErrorCode::Internal);
        assert_ne!(incompatible.code(), failure.code());
        assert!(incompatible.is_backend_error());
        assert!(failure.is_backend_error());
    }

    #[test]
    fn test_registry_errors() {
        let err = Error::CapacityExceeded {
            name: "x".into(),
            capacity: 2,
        };
        assert!(err.is_registry_error());
        assert!(!err.is_backend_error());

        let err = Error::IndexOutOfRange { index: 3, count: 1 };
        assert_eq!(err.code(), ErrorCode::IndexOutOfRange);
        assert!(err.to_string().contains("index 3"));
    }

    #[test]
    fn test_backend_failure_keeps_code_verbatim() {
        let err = Error::backend_failure("qnn", 0xdead, "HTP session closed");
        match err {
            Error::InternalBackendFailure { code, .. } => assert_eq!(code, 0xdead),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_options_rejected_display() {
        let err = Error::OptionsRejected {
            backend: "cpu_ref".into(),
            keys: vec!["foo".into(), "bar".into()],
        };
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert!(err.to_string().contains("foo, bar"));
    }

    #[test]
    fn test_suggestions() {
        let err = Error::incompatible("cpu_ref", "old format");
        assert!(err.suggestion().unwrap().contains("Recompile"));

        let err = Error::InvalidState("x".into());
        assert!(err.suggestion().is_none());
    }

    #[test]
    fn test_format_for_terminal() {
        let err = Error::backend_not_found("npu");
        let formatted = err.format_for_terminal();

        assert!(formatted.contains("E020"));
        assert!(formatted.contains("\x1b[31m"));
        assert!(formatted.contains("Hint"));
    }

    #[test]
    fn test_format_for_log() {
        let err = Error::DuplicateName { name: "cpu_ref".into() };
        let formatted = err.format_for_log();

        assert!(formatted.contains("[E041]"));
        assert!(!formatted.contains("\x1b["));
    }

    #[test]
    fn test_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert_eq!(err.code(), ErrorCode::Io);
    }
}
