//! Connector configuration types
//!
//! Resolves the connection policy (TLS verification, credential, retry
//! settings) and the default metric keys from a small TOML document.
//! Every key is optional; a missing file, section or key falls back to the
//! defaults below.
//!
//! # Example
//!
//! ```toml
//! [connection]
//! SSL_VERIFY = "false"       # "false", "no" and "n" (any case) disable verification
//! API_TOKEN = "squ_xxx"      # sent as HTTP Basic user with an empty password
//! TIMEOUT_SECS = 30          # optional, request timeout
//! MAX_RETRIES = 5            # optional, retry attempts
//!
//! [sonarqube]
//! TARGET_METRIC_FIELDS = "accessors,new_technical_debt"
//! HISTORY_PAGE_SIZE = 50     # optional, page size requested for history pages > 1
//! ```

use crate::error::ConnectorError;
use crate::resilience::{DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT_SECS, ResilienceConfig};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, info};

/// Page size requested for history pages beyond the first
pub const DEFAULT_HISTORY_PAGE_SIZE: u32 = 50;

/// Metric keys requested when neither the caller nor the file names any
pub const DEFAULT_METRIC_KEYS: &[&str] = &[
    "bugs",
    "vulnerabilities",
    "code_smells",
    "coverage",
    "duplicated_lines_density",
    "ncloc",
    "sqale_index",
    "reliability_rating",
    "security_rating",
    "sqale_rating",
];

/// Values recognized as "false" for `SSL_VERIFY` (compared case-insensitively)
const FALSE_VALUES: &[&str] = &["false", "no", "n"];

/// SonarQube connector configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SonarConnectorConfig {
    /// Verify the server's TLS certificate (default: true)
    pub tls_verify: bool,

    /// API token, sent as the HTTP Basic user (default: none, unauthenticated)
    pub credential: Option<String>,

    /// Metric keys used when a call does not name its own
    pub default_metric_keys: Vec<String>,

    /// Page size requested for history pages > 1 (default: 50)
    pub history_page_size: u32,

    /// Request timeout in seconds (default: 30)
    pub timeout_secs: u64,

    /// Maximum retry attempts for transient failures (default: 5)
    pub max_retries: u32,
}

impl Default for SonarConnectorConfig {
    fn default() -> Self {
        Self {
            tls_verify: true,
            credential: None,
            default_metric_keys: DEFAULT_METRIC_KEYS.iter().map(|k| k.to_string()).collect(),
            history_page_size: DEFAULT_HISTORY_PAGE_SIZE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl SonarConnectorConfig {
    /// Resolve configuration from an optional file
    ///
    /// `None` and a file that does not exist both resolve to the defaults.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConnectorError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConnectorError> {
        info!(path = %path.display(), "reading sonarqube connector configuration");

        match fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "configuration file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(ConnectorError::Config(format!(
                "failed to read '{}': {}",
                path.display(),
                e
            ))),
        }
    }

    /// Parse config from TOML text
    pub fn from_toml_str(contents: &str) -> Result<Self, ConnectorError> {
        let value: toml::Value = toml::from_str(contents)
            .map_err(|e| ConnectorError::Config(format!("Invalid sonarqube config: {}", e)))?;
        Self::from_toml(&value)
    }

    /// Parse config from raw TOML value
    pub fn from_toml(value: &toml::Value) -> Result<Self, ConnectorError> {
        let raw: RawConfig = value
            .clone()
            .try_into()
            .map_err(|e: toml::de::Error| {
                ConnectorError::Config(format!("Invalid sonarqube config: {}", e))
            })?;

        let defaults = Self::default();

        let tls_verify = raw
            .connection
            .ssl_verify
            .map(|flag| flag.is_enabled())
            .unwrap_or(true);

        let credential = raw.connection.api_token.filter(|token| !token.is_empty());

        let default_metric_keys = raw
            .sonarqube
            .target_metric_fields
            .map(|fields| split_metric_keys(&fields))
            .filter(|keys| !keys.is_empty())
            .unwrap_or(defaults.default_metric_keys);

        let history_page_size = match raw.sonarqube.history_page_size {
            Some(0) => {
                return Err(ConnectorError::Config(
                    "HISTORY_PAGE_SIZE must be greater than zero".to_string(),
                ));
            }
            Some(size) => size,
            None => defaults.history_page_size,
        };

        Ok(Self {
            tls_verify,
            credential,
            default_metric_keys,
            history_page_size,
            timeout_secs: raw.connection.timeout_secs.unwrap_or(defaults.timeout_secs),
            max_retries: raw.connection.max_retries.unwrap_or(defaults.max_retries),
        })
    }

    /// Default metric keys in the API's comma-separated form
    pub fn joined_metric_keys(&self) -> String {
        self.default_metric_keys.join(",")
    }

    /// Build resilience config from these settings
    pub fn resilience_config(&self) -> ResilienceConfig {
        ResilienceConfig {
            timeout_secs: self.timeout_secs,
            max_retries: self.max_retries,
            ..Default::default()
        }
    }
}

/// Split a comma-separated metric list, trimming entries and dropping blanks
pub fn split_metric_keys(fields: &str) -> Vec<String> {
    fields
        .split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(String::from)
        .collect()
}

/// Interpret an `SSL_VERIFY` string
///
/// Only the recognized false-values disable verification; anything else,
/// including an empty string, leaves it on.
pub fn ssl_verify_enabled(text: &str) -> bool {
    let lowered = text.to_lowercase();
    !FALSE_VALUES.contains(&lowered.as_str())
}

// --- File shape ---

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    connection: RawConnection,
    sonarqube: RawSonarqube,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConnection {
    #[serde(rename = "SSL_VERIFY")]
    ssl_verify: Option<FlagValue>,
    #[serde(rename = "API_TOKEN")]
    api_token: Option<String>,
    #[serde(rename = "TIMEOUT_SECS")]
    timeout_secs: Option<u64>,
    #[serde(rename = "MAX_RETRIES")]
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSonarqube {
    #[serde(rename = "TARGET_METRIC_FIELDS")]
    target_metric_fields: Option<String>,
    #[serde(rename = "HISTORY_PAGE_SIZE")]
    history_page_size: Option<u32>,
}

/// `SSL_VERIFY` may be written as a TOML boolean or as a string
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum FlagValue {
    Bool(bool),
    Text(String),
}

impl FlagValue {
    fn is_enabled(&self) -> bool {
        match self {
            FlagValue::Bool(b) => *b,
            FlagValue::Text(text) => ssl_verify_enabled(text),
        }
    }
}
