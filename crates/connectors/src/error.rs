//! Error types for connectors

use thiserror::Error;

/// Errors that can occur during connector operations
#[derive(Error, Debug)]
pub enum ConnectorError {
    /// Failed to initialize connector (e.g., HTTP client creation failed)
    #[error("failed to initialize connector: {0}")]
    Init(String),

    /// A required constructor argument was absent or empty
    #[error("missing mandatory argument: {0}")]
    MissingArgument(&'static str),

    /// Category outside the connector's fixed set
    #[error("unsupported category: {0}")]
    UnsupportedCategory(String),

    /// Failed to obtain or decode a response body
    #[error("remote request to {url} failed: {reason}")]
    Remote {
        /// Request URL
        url: String,
        /// HTTP status, if a response was received
        status: Option<u16>,
        /// What went wrong
        reason: String,
    },

    /// JSON serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Archive could not be read or written
    #[error("archive error: {0}")]
    Archive(String),

    /// Identifier hashing received an empty argument
    #[error("invalid identifier argument: {0}")]
    InvalidIdentifier(String),

    /// Date string not in a recognized format
    #[error("invalid date '{0}'")]
    InvalidDate(String),
}

impl ConnectorError {
    /// Create a Remote error
    pub fn remote(url: impl Into<String>, status: Option<u16>, reason: impl Into<String>) -> Self {
        Self::Remote {
            url: url.into(),
            status,
            reason: reason.into(),
        }
    }

    /// Map a reqwest failure onto a Remote error for `url`
    pub(crate) fn from_reqwest(url: &str, error: reqwest::Error) -> Self {
        Self::remote(url, error.status().map(|s| s.as_u16()), error.to_string())
    }

    /// Whether retrying the same request may succeed
    ///
    /// Connection failures and timeouts (no status), server errors (5xx) and
    /// rate limits (429) are transient. Everything else is permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Remote { status: None, .. } => true,
            Self::Remote {
                status: Some(code), ..
            } => *code >= 500 || *code == 429,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_argument_display() {
        let err = ConnectorError::MissingArgument("component");
        assert!(err.to_string().contains("component"));
    }

    #[test]
    fn test_unsupported_category_display() {
        let err = ConnectorError::UnsupportedCategory("issues".into());
        assert!(err.to_string().contains("issues"));
    }

    #[test]
    fn test_remote_display() {
        let err = ConnectorError::remote("https://sonar/api/metrics/search", Some(403), "Forbidden");
        let msg = err.to_string();
        assert!(msg.contains("metrics/search"));
        assert!(msg.contains("Forbidden"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(ConnectorError::remote("u", None, "timed out").is_retryable());
        assert!(ConnectorError::remote("u", Some(502), "bad gateway").is_retryable());
        assert!(ConnectorError::remote("u", Some(429), "slow down").is_retryable());
        assert!(!ConnectorError::remote("u", Some(401), "unauthorized").is_retryable());
        assert!(!ConnectorError::remote("u", Some(404), "not found").is_retryable());
        assert!(!ConnectorError::MissingArgument("component").is_retryable());
    }
}
