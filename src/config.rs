//! Configuration system for the delegate runtime
//!
//! Values come from the following sources (highest to lowest precedence):
//! 1. Environment variables (DELEGATE_* prefix)
//! 2. Configuration file (TOML)
//! 3. Default values
//!
//! The command line only picks the file (`--config`) and adjusts the log
//! level (`-v`, `-q`); it does not override individual fields.

use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backend::DEFAULT_REGISTRY_CAPACITY;
use crate::error::{Error, Result};

/// Default config file name searched in the working directory
pub const CONFIG_FILE_NAME: &str = "delegate-runtime.toml";

/// Main runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Backend registry sizing
    pub registry: RegistrySettings,

    /// Allocator budgets handed to backends
    pub memory: MemorySettings,

    /// Per-backend settings
    pub backends: BackendSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Registry settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrySettings {
    /// Maximum number of registered backends
    pub capacity: usize,
}

/// Memory budgets
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemorySettings {
    /// Bytes available to backends during `init`
    pub runtime_arena_bytes: usize,

    /// Scratch bytes available to each `execute`
    pub temp_arena_bytes: usize,
}

/// Settings for the backends shipped with the runtime
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendSettings {
    pub cpu_ref: CpuRefSettings,
}

/// CPU reference backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CpuRefSettings {
    /// Register the backend at startup
    pub enabled: bool,

    /// Worker threads (None = one per core)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_threads: Option<usize>,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Maximum log file size in MB before rotation
    pub max_file_size_mb: u64,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

// Default implementations

impl Default for RegistrySettings {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_REGISTRY_CAPACITY,
        }
    }
}

impl Default for MemorySettings {
    fn default() -> Self {
        Self {
            runtime_arena_bytes: 64 * 1024 * 1024,
            temp_arena_bytes: 16 * 1024 * 1024,
        }
    }
}

impl Default for CpuRefSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            num_threads: None,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
            max_file_size_mb: 100,
            max_files: 5,
            json_format: false,
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = match Self::find_config_file(config_path)? {
            Some(path) => {
                let config = Self::from_file(&path)?;
                info!(path = %path.display(), "Configuration loaded from file");
                config
            }
            None => Self::default(),
        };

        config.apply_env_overrides();
        config.expand_paths();
        config.validate()?;

        Ok(config)
    }

    /// Parse a configuration file without overrides or validation
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        debug!(path = %path.display(), "Loading configuration file");
        let content = fs::read_to_string(path).map_err(|source| Error::IoRead {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|e| Error::ConfigParse {
            message: format!("{}: {}", path.display(), e),
            source: Some(e),
        })
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::ConfigNotFound { path });
        }

        let search_paths = [
            PathBuf::from(CONFIG_FILE_NAME),
            dirs::config_dir()
                .map(|p| p.join("delegate-runtime").join("config.toml"))
                .unwrap_or_default(),
            PathBuf::from("/etc/delegate-runtime/config.toml"),
        ];

        for path in &search_paths {
            if !path.as_os_str().is_empty() && path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Some(n) = env_parse("DELEGATE_REGISTRY_CAPACITY") {
            self.registry.capacity = n;
        }

        if let Some(n) = env_parse("DELEGATE_RUNTIME_ARENA_BYTES") {
            self.memory.runtime_arena_bytes = n;
        }
        if let Some(n) = env_parse("DELEGATE_TEMP_ARENA_BYTES") {
            self.memory.temp_arena_bytes = n;
        }

        if let Ok(val) = std::env::var("DELEGATE_CPU_REF_ENABLED") {
            self.backends.cpu_ref.enabled = is_truthy(&val);
        }
        if let Some(n) = env_parse("DELEGATE_CPU_REF_THREADS") {
            self.backends.cpu_ref.num_threads = Some(n);
        }

        if let Ok(val) = std::env::var("DELEGATE_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("DELEGATE_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("DELEGATE_LOG_JSON") {
            self.logging.json_format = is_truthy(&val);
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.registry.capacity == 0 {
            return Err(Error::config_field_invalid(
                "registry.capacity",
                "registry.capacity must be at least 1",
            ));
        }

        if self.memory.runtime_arena_bytes == 0 {
            return Err(Error::config_field_invalid(
                "memory.runtime_arena_bytes",
                "memory.runtime_arena_bytes must be greater than 0",
            ));
        }
        if self.memory.temp_arena_bytes == 0 {
            return Err(Error::config_field_invalid(
                "memory.temp_arena_bytes",
                "memory.temp_arena_bytes must be greater than 0",
            ));
        }

        if self.backends.cpu_ref.num_threads == Some(0) {
            return Err(Error::config_field_invalid(
                "backends.cpu_ref.num_threads",
                "backends.cpu_ref.num_threads must be at least 1",
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        Ok(())
    }

    /// Render as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|val| val.trim().parse().ok())
}

fn is_truthy(val: &str) -> bool {
    val.eq_ignore_ascii_case("true") || val == "1"
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or(std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Default location for `config init`
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("delegate-runtime")
        .join("config.toml")
}

/// Initialize a new configuration file, returning its path
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(default_config_path);

    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    fs::write(&config_path, generate_default_config())?;
    info!(path = %config_path.display(), "Configuration file created");
    Ok(config_path)
}

/// Generate default configuration content with comments
pub fn generate_default_config() -> String {
    format!(
        r#"# Delegate Runtime Configuration

[registry]
# Maximum number of backends that can be registered
capacity = {capacity}

[memory]
# Bytes backends may allocate while initializing a delegate
runtime_arena_bytes = 67108864

# Scratch bytes available to each execute call
temp_arena_bytes = 16777216

[backends.cpu_ref]
# Register the portable CPU reference backend
enabled = true

# Worker threads (comment out to use one per core)
# num_threads = 4

[logging]
# Log level: trace, debug, info, warn, error
level = "warn"

# Log file path (comment out to disable file logging)
# file = "~/.local/state/delegate-runtime/runtime.log"

# Maximum log file size in MB before rotation
max_file_size_mb = 100

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false
"#,
        capacity = DEFAULT_REGISTRY_CAPACITY
    )
}
