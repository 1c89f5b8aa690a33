//! Logging configuration
//!
//! Controls the internal logging behavior of glean. Logs go to stderr so
//! stdout carries only fetched items.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Log level
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level - very verbose
    Trace,
    /// Debug level - page fetches and retries
    Debug,
    /// Info level - fetch summaries (default)
    #[default]
    Info,
    /// Warn level - warnings only
    Warn,
    /// Error level - errors only
    Error,
}

impl LogLevel {
    /// Convert to tracing level filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable console output (default)
    #[default]
    Console,
    /// JSON structured logging
    Json,
}

/// Logging configuration
///
/// # Example
///
/// ```toml
/// [log]
/// level = "info"
/// format = "console"
/// ```
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    /// Default: info
    pub level: LogLevel,

    /// Output format (console, json)
    /// Default: console
    pub format: LogFormat,
}

/// The part of the configuration file this module reads
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LogSection {
    log: LogConfig,
}

impl LogConfig {
    /// Read the `[log]` section of a configuration file
    ///
    /// Other sections are ignored; a missing section gives the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::from_toml_str(&contents)
    }

    /// Parse the `[log]` section from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let section: LogSection =
            toml::from_str(contents).context("failed to parse [log] section")?;
        Ok(section.log)
    }
}

/// Resolve logging: CLI flag > config file > default "info"
///
/// A missing file gives the defaults; a file with a malformed `[log]`
/// section is an error.
pub fn resolve(
    cli_level: Option<&str>,
    config_path: Option<&Path>,
) -> Result<(String, LogFormat)> {
    let config = match config_path {
        Some(path) if path.exists() => LogConfig::from_file(path)?,
        _ => LogConfig::default(),
    };

    let level = cli_level
        .map(str::to_string)
        .unwrap_or_else(|| config.level.as_str().to_string());

    Ok((level, config.format))
}

/// Initialize the tracing subscriber for logging
pub fn init(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Console => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = LogConfig::default();
        assert_eq!(config.level, LogLevel::Info);
        assert_eq!(config.format, LogFormat::Console);
    }

    #[test]
    fn test_section_missing() {
        let config = LogConfig::from_toml_str("[connection]\nSSL_VERIFY = \"no\"\n").unwrap();
        assert_eq!(config, LogConfig::default());
    }

    #[test]
    fn test_section_full() {
        let toml = r#"
[sonarqube]
TARGET_METRIC_FIELDS = "bugs"

[log]
level = "debug"
format = "json"
"#;
        let config = LogConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.level, LogLevel::Debug);
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_level_rejected() {
        assert!(LogConfig::from_toml_str("[log]\nlevel = \"loud\"\n").is_err());
    }

    #[test]
    fn test_level_as_str() {
        assert_eq!(LogLevel::Trace.as_str(), "trace");
        assert_eq!(LogLevel::Debug.as_str(), "debug");
        assert_eq!(LogLevel::Info.as_str(), "info");
        assert_eq!(LogLevel::Warn.as_str(), "warn");
        assert_eq!(LogLevel::Error.as_str(), "error");
    }

    #[test]
    fn test_resolve_precedence() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[log]\nlevel = \"warn\"\nformat = \"json\"").unwrap();

        let (level, format) = resolve(Some("trace"), Some(file.path())).unwrap();
        assert_eq!(level, "trace");
        assert_eq!(format, LogFormat::Json);

        let (level, _) = resolve(None, Some(file.path())).unwrap();
        assert_eq!(level, "warn");

        let (level, format) = resolve(None, None).unwrap();
        assert_eq!(level, "info");
        assert_eq!(format, LogFormat::Console);
    }

    #[test]
    fn test_resolve_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let (level, _) = resolve(None, Some(&dir.path().join("absent.toml"))).unwrap();
        assert_eq!(level, "info");
    }

    #[test]
    fn test_resolve_malformed_section_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[log]\nlevel = \"loud\"").unwrap();

        assert!(resolve(None, Some(file.path())).is_err());
        assert!(resolve(Some("debug"), Some(file.path())).is_err());
    }
}
