//! Logging infrastructure using tracing + tracing-subscriber
//!
//! Console events go to stderr so `run` and `option get` output on stdout
//! stays machine-readable. A rolling file sink can be added from the
//! `[logging]` section, and RUST_LOG still tunes individual modules.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::LoggingSettings;
use crate::error::{Error, Result};

/// Target prefix of every event emitted by this crate
const CRATE_TARGET: &str = "delegate_runtime";

/// Fallback file name when `logging.file` names a directory
const DEFAULT_LOG_FILE: &str = "delegate-runtime.log";

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

/// Keeps the background file writer alive; drop it last
pub struct LogGuards {
    _file_guard: Option<WorkerGuard>,
}

/// Event encoding shared by every sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogFormat {
    Compact,
    Json,
}

impl LogFormat {
    fn from_settings(settings: &LoggingSettings) -> Self {
        if settings.json_format {
            LogFormat::Json
        } else {
            LogFormat::Compact
        }
    }
}

/// Install the global subscriber
///
/// `-q` wins over `-v`; without either flag the configured level applies.
pub fn init_logging(settings: &LoggingSettings, verbose: u8, quiet: bool) -> Result<LogGuards> {
    let level = determine_level(settings, verbose, quiet);
    let format = LogFormat::from_settings(settings);

    let console = sink_layer(format, std::io::stderr, true);
    let (file, file_guard) = match settings.file.as_deref() {
        Some(log_file) => {
            let appender = rolling_appender(log_file, settings.max_file_size_mb, settings.max_files)?;
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(sink_layer(format, writer, false)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(build_env_filter(level)?)
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))?;

    tracing::debug!(%level, ?format, file = ?settings.file, "Logging initialized");

    Ok(LogGuards {
        _file_guard: file_guard,
    })
}

/// Minimal stderr logging for commands that never touch a backend
pub fn init_simple(level: Level) -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .with(sink_layer(LogFormat::Compact, std::io::stderr, true))
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize logging: {}", e)))
}

fn determine_level(settings: &LoggingSettings, verbose: u8, quiet: bool) -> Level {
    match (quiet, verbose) {
        (true, _) => Level::ERROR,
        (false, 0) => parse_level(&settings.level),
        (false, 1) => Level::DEBUG,
        (false, _) => Level::TRACE,
    }
}

/// Parse a level name, falling back to INFO
pub(crate) fn parse_level(level_str: &str) -> Level {
    match level_str.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// RUST_LOG directives, with this crate pinned to `level`
fn build_env_filter(level: Level) -> Result<EnvFilter> {
    let base = level.to_string().to_lowercase();
    let own = format!("{}={}", CRATE_TARGET, base)
        .parse()
        .map_err(|e| Error::Config(format!("Invalid log directive: {}", e)))?;

    Ok(EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&base))
        .add_directive(own))
}

/// One fmt layer for `writer`
///
/// Interactive sinks get colors and a compact line; file sinks get thread
/// ids and source locations instead.
fn sink_layer<S, W>(format: LogFormat, writer: W, interactive: bool) -> BoxedLayer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(!interactive)
        .with_file(!interactive)
        .with_line_number(!interactive)
        .with_ansi(interactive);

    match format {
        LogFormat::Json => Box::new(layer.json()),
        LogFormat::Compact => Box::new(layer.compact()),
    }
}

/// Split `logging.file` into the directory to rotate in and a file prefix
fn log_file_parts(log_file: &str) -> (PathBuf, String) {
    let path = Path::new(log_file);
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let prefix = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(DEFAULT_LOG_FILE)
        .to_string();
    (directory, prefix)
}

/// tracing-appender rotates by time only; small size caps rotate hourly
fn rotation_for(max_size_mb: u64) -> Rotation {
    if max_size_mb > 0 && max_size_mb < 10 {
        Rotation::HOURLY
    } else {
        Rotation::DAILY
    }
}

fn rolling_appender(log_file: &str, max_size_mb: u64, max_files: u32) -> Result<RollingFileAppender> {
    let (directory, prefix) = log_file_parts(log_file);
    fs::create_dir_all(&directory).map_err(|e| {
        Error::Config(format!(
            "Failed to create log directory '{}': {}",
            directory.display(),
            e
        ))
    })?;

    RollingFileAppender::builder()
        .rotation(rotation_for(max_size_mb))
        .filename_prefix(prefix)
        .filename_suffix("log")
        .max_log_files(max_files as usize)
        .build(&directory)
        .map_err(|e| Error::Config(format!("Failed to create log file appender: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("trace"), Level::TRACE);
        assert_eq!(parse_level("DEBUG"), Level::DEBUG);
        assert_eq!(parse_level("warning"), Level::WARN);
        assert_eq!(parse_level("error"), Level::ERROR);
        assert_eq!(parse_level("bogus"), Level::INFO);
    }

    #[test]
    fn test_quiet_beats_verbose() {
        let settings = LoggingSettings::default();
        assert_eq!(determine_level(&settings, 2, true), Level::ERROR);
        assert_eq!(determine_level(&settings, 1, false), Level::DEBUG);
        assert_eq!(determine_level(&settings, 5, false), Level::TRACE);
        assert_eq!(determine_level(&settings, 0, false), Level::WARN);
    }

    #[test]
    fn test_build_env_filter() {
        assert!(build_env_filter(Level::DEBUG).is_ok());
    }

    #[test]
    fn test_format_follows_settings() {
        let mut settings = LoggingSettings::default();
        assert_eq!(LogFormat::from_settings(&settings), LogFormat::Compact);
        settings.json_format = true;
        assert_eq!(LogFormat::from_settings(&settings), LogFormat::Json);
    }

    #[test]
    fn test_log_file_parts() {
        let (dir, prefix) = log_file_parts("/var/log/rt/runtime.log");
        assert_eq!(dir, PathBuf::from("/var/log/rt"));
        assert_eq!(prefix, "runtime.log");

        let (dir, prefix) = log_file_parts("bare.log");
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(prefix, "bare.log");
    }

    #[test]
    fn test_rolling_appender_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let log_path = temp_dir.path().join("logs").join("runtime.log");

        assert!(rolling_appender(&log_path.to_string_lossy(), 5, 3).is_ok());
        assert!(temp_dir.path().join("logs").exists());
    }
}
