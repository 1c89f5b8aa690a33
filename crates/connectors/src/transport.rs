//! HTTP transport
//!
//! Performs GET requests for the API clients. The live transport retries
//! transient failures and can record every successful body into an
//! [`Archive`]; the replay transport serves bodies from an archive and never
//! touches the network.

use crate::archive::Archive;
use crate::error::ConnectorError;
use crate::resilience::{ResilienceConfig, RetryError, execute_with_retry};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

const USER_AGENT: &str = concat!("glean/", env!("CARGO_PKG_VERSION"));

/// A successful response
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw body text
    pub body: String,
}

/// Transport settings taken from connector configuration
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Verify the server's TLS certificate
    pub tls_verify: bool,
    /// Timeout and retry policy
    pub resilience: ResilienceConfig,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            tls_verify: true,
            resilience: ResilienceConfig::default(),
        }
    }
}

/// Live HTTP transport backed by reqwest
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    resilience: ResilienceConfig,
    /// Archive receiving every successful response
    recorder: Option<Arc<Archive>>,
}

impl HttpTransport {
    /// Create a new HTTP transport
    ///
    /// # Errors
    ///
    /// Returns error if HTTP client creation fails (e.g., TLS or proxy misconfiguration)
    pub fn new(config: TransportConfig) -> Result<Self, ConnectorError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.resilience.timeout_secs))
            .danger_accept_invalid_certs(!config.tls_verify)
            .build()
            .map_err(|e| ConnectorError::Init(format!("HTTP client: {}", e)))?;

        if !config.tls_verify {
            warn!("TLS certificate verification is disabled");
        }

        Ok(Self {
            client,
            resilience: config.resilience,
            recorder: None,
        })
    }

    /// Record every successful response into `archive`
    pub fn with_recorder(mut self, archive: Arc<Archive>) -> Self {
        self.recorder = Some(archive);
        self
    }

    /// Build a request with optional auth
    fn build_request(&self, url: &str, credential: Option<&str>) -> reqwest::RequestBuilder {
        let mut request = self.client.get(url);
        if let Some(token) = credential {
            request = request.basic_auth(token, Some(""));
        }
        request
    }

    /// Fetch once, no retry
    async fn fetch_once(
        &self,
        url: &str,
        credential: Option<&str>,
    ) -> Result<RawResponse, ConnectorError> {
        let response = self
            .build_request(url, credential)
            .send()
            .await
            .map_err(|e| ConnectorError::from_reqwest(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ConnectorError::remote(
                url,
                Some(status.as_u16()),
                status.canonical_reason().unwrap_or("unexpected status"),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ConnectorError::from_reqwest(url, e))?;

        Ok(RawResponse {
            status: status.as_u16(),
            body,
        })
    }

    /// Fetch with retry, recording the body when an archive is attached
    pub async fn fetch(
        &self,
        url: &str,
        credential: Option<&str>,
    ) -> Result<RawResponse, ConnectorError> {
        let result = execute_with_retry(&self.resilience, url, || self.fetch_once(url, credential)).await;

        let response = match result {
            Ok(response) => response,
            Err(RetryError::Exhausted {
                attempts,
                last_error,
            }) => {
                warn!(
                    url = %url,
                    attempts,
                    error = %last_error,
                    "request failed after retries"
                );
                return Err(ConnectorError::remote(
                    url,
                    None,
                    format!("failed after {} attempts: {}", attempts, last_error),
                ));
            }
            Err(RetryError::Permanent(e)) => return Err(e),
        };

        if let Some(archive) = &self.recorder {
            archive.insert(url, response.status, response.body.clone());
        }

        Ok(response)
    }
}

/// Transport selection without dyn dispatch
#[derive(Debug, Clone)]
pub enum Transport {
    /// Live HTTP requests
    Http(HttpTransport),
    /// Bodies served from a previously recorded archive
    Replay(Arc<Archive>),
}

impl Transport {
    /// GET `url`, authenticating with `credential` when given
    ///
    /// # Errors
    ///
    /// Returns `ConnectorError::Remote` when no successful response is obtained.
    pub async fn fetch(
        &self,
        url: &str,
        credential: Option<&str>,
    ) -> Result<RawResponse, ConnectorError> {
        match self {
            Transport::Http(http) => http.fetch(url, credential).await,
            Transport::Replay(archive) => {
                let archived = archive
                    .get(url)
                    .ok_or_else(|| ConnectorError::remote(url, None, "not found in archive"))?;

                debug!(url = %url, status = archived.status, "replaying archived response");

                if !(200..300).contains(&archived.status) {
                    return Err(ConnectorError::remote(
                        url,
                        Some(archived.status),
                        "archived response is not a success",
                    ));
                }

                Ok(RawResponse {
                    status: archived.status,
                    body: archived.body,
                })
            }
        }
    }

    /// Whether responses come from an archive rather than the network
    pub fn replays_archive(&self) -> bool {
        matches!(self, Transport::Replay(_))
    }
}
