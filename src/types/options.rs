//! Backend option types
//!
//! Options are runtime-adjustable backend settings read and written outside
//! the init/execute/destroy flow.

use std::fmt;

use crate::error::{Error, Result};

/// Maximum length of an option key in bytes
pub const MAX_OPTION_KEY_LENGTH: usize = 64;

/// Maximum length of a string option value in bytes
pub const MAX_OPTION_VALUE_LENGTH: usize = 256;

// ─────────────────────────────────────────────────────────────────
// Option Value
// ─────────────────────────────────────────────────────────────────

/// Value of a backend option
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    /// Unset; `get_option` fills it in
    Empty,
    Bool(bool),
    Int(i64),
    Str(String),
}

impl OptionValue {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            OptionValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            OptionValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            OptionValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Parse a CLI-style value: `true`/`false`, an integer, or text
    pub fn parse(raw: &str) -> Self {
        match raw {
            "true" => OptionValue::Bool(true),
            "false" => OptionValue::Bool(false),
            _ => raw
                .parse::<i64>()
                .map(OptionValue::Int)
                .unwrap_or_else(|_| OptionValue::Str(raw.to_string())),
        }
    }
}

impl Default for OptionValue {
    fn default() -> Self {
        OptionValue::Empty
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionValue::Empty => write!(f, "<unset>"),
            OptionValue::Bool(b) => write!(f, "{}", b),
            OptionValue::Int(i) => write!(f, "{}", i),
            OptionValue::Str(s) => write!(f, "{}", s),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Backend Option
// ─────────────────────────────────────────────────────────────────

/// A single `{key, value}` option
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendOption {
    pub key: String,
    pub value: OptionValue,
}

impl BackendOption {
    /// Create an option, checking key and value lengths
    pub fn new(key: impl Into<String>, value: OptionValue) -> Result<Self> {
        let key = key.into();
        validate_key(&key)?;
        validate_value(&value)?;
        Ok(Self { key, value })
    }

    /// Create an unset option to be filled by `get_option`
    pub fn query(key: impl Into<String>) -> Result<Self> {
        Self::new(key, OptionValue::Empty)
    }

    /// Parse `key=value` as given on the command line
    pub fn parse_assignment(raw: &str) -> Result<Self> {
        let (key, value) = raw.split_once('=').ok_or_else(|| {
            Error::InvalidArgument(format!("expected key=value, got '{}'", raw))
        })?;
        Self::new(key.trim(), OptionValue::parse(value.trim()))
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidArgument("option key cannot be empty".into()));
    }
    if key.len() > MAX_OPTION_KEY_LENGTH {
        return Err(Error::InvalidArgument(format!(
            "option key '{}' exceeds {} bytes",
            key, MAX_OPTION_KEY_LENGTH
        )));
    }
    Ok(())
}

/// Check that a value fits in an option slot
pub fn validate_value(value: &OptionValue) -> Result<()> {
    if let OptionValue::Str(s) = value {
        if s.len() > MAX_OPTION_VALUE_LENGTH {
            return Err(Error::InvalidArgument(format!(
                "option value exceeds {} bytes",
                MAX_OPTION_VALUE_LENGTH
            )));
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────
// Fixed-capacity builder
// ─────────────────────────────────────────────────────────────────

/// Fixed-capacity option list
///
/// Holds at most `N` options. Setting a key that is already present
/// overwrites its value in place.
#[derive(Debug, Clone, Default)]
pub struct BackendOptions<const N: usize> {
    options: Vec<BackendOption>,
}

impl<const N: usize> BackendOptions<N> {
    pub fn new() -> Self {
        Self {
            options: Vec::with_capacity(N),
        }
    }

    pub fn set_bool(&mut self, key: &str, value: bool) -> Result<()> {
        self.set(key, OptionValue::Bool(value))
    }

    pub fn set_int(&mut self, key: &str, value: i64) -> Result<()> {
        self.set(key, OptionValue::Int(value))
    }

    pub fn set_str(&mut self, key: &str, value: &str) -> Result<()> {
        self.set(key, OptionValue::Str(value.to_string()))
    }

    /// Set or overwrite an option
    pub fn set(&mut self, key: &str, value: OptionValue) -> Result<()> {
        validate_value(&value)?;
        if let Some(existing) = self.options.iter_mut().find(|o| o.key == key) {
            existing.value = value;
            return Ok(());
        }
        if self.options.len() >= N {
            return Err(Error::InvalidArgument(format!(
                "option list is full ({} entries)",
                N
            )));
        }
        self.options.push(BackendOption::new(key, value)?);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn view(&self) -> &[BackendOption] {
        &self.options
    }

    /// Mutable view for `get_option`; length is fixed
    pub fn view_mut(&mut self) -> &mut [BackendOption] {
        &mut self.options
    }
}

// ─────────────────────────────────────────────────────────────────
// Partial-failure reporting
// ─────────────────────────────────────────────────────────────────

/// Collects option keys a backend could not handle
///
/// Backends process every entry, note the ones they skip, and finish with
/// [`into_result`](Self::into_result) so the caller learns which keys were
/// ignored without the rest of the call being aborted.
#[derive(Debug, Default)]
pub struct OptionReport {
    rejected: Vec<String>,
}

impl OptionReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject(&mut self, key: &str) {
        self.rejected.push(key.to_string());
    }

    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }

    pub fn into_result(self, backend: &str) -> Result<()> {
        if self.rejected.is_empty() {
            Ok(())
        } else {
            Err(Error::OptionsRejected {
                backend: backend.to_string(),
                keys: self.rejected,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value() {
        assert_eq!(OptionValue::parse("true"), OptionValue::Bool(true));
        assert_eq!(OptionValue::parse("42"), OptionValue::Int(42));
        assert_eq!(OptionValue::parse("-3"), OptionValue::Int(-3));
        assert_eq!(OptionValue::parse("fast"), OptionValue::Str("fast".into()));
    }

    #[test]
    fn test_parse_assignment() {
        let opt = BackendOption::parse_assignment("num_threads = 4").unwrap();
        assert_eq!(opt.key, "num_threads");
        assert_eq!(opt.value, OptionValue::Int(4));

        assert!(BackendOption::parse_assignment("no_equals").is_err());
        assert!(BackendOption::parse_assignment("=1").is_err());
    }

    #[test]
    fn test_key_and_value_limits() {
        let long_key = "k".repeat(MAX_OPTION_KEY_LENGTH + 1);
        assert!(BackendOption::new(long_key, OptionValue::Int(1)).is_err());

        let long_value = OptionValue::Str("v".repeat(MAX_OPTION_VALUE_LENGTH + 1));
        assert!(BackendOption::new("k", long_value).is_err());

        let max_value = OptionValue::Str("v".repeat(MAX_OPTION_VALUE_LENGTH));
        assert!(BackendOption::new("k", max_value).is_ok());
    }

    #[test]
    fn test_builder_capacity_and_overwrite() {
        let mut opts = BackendOptions::<2>::new();
        opts.set_int("num_threads", 2).unwrap();
        opts.set_bool("profiling", true).unwrap();
        opts.set_int("num_threads", 8).unwrap();

        assert_eq!(opts.len(), 2);
        assert_eq!(opts.view()[0].value, OptionValue::Int(8));

        let err = opts.set_str("extra", "x").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(opts.len(), 2);
    }

    #[test]
    fn test_report() {
        let report = OptionReport::new();
        assert!(report.into_result("cpu_ref").is_ok());

        let mut report = OptionReport::new();
        report.reject("bogus");
        match report.into_result("cpu_ref") {
            Err(Error::OptionsRejected { backend, keys }) => {
                assert_eq!(backend, "cpu_ref");
                assert_eq!(keys, vec!["bogus".to_string()]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
