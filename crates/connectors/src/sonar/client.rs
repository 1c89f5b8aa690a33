//! SonarQube web API client
//!
//! Builds endpoint URLs, walks the paged history endpoint and decodes the
//! JSON bodies returned by the transport.

use super::types::{ComponentMeasures, HistoryPage, MetricCatalog, MetricHistory, Paging};
use crate::config::{SonarConnectorConfig, split_metric_keys};
use crate::error::ConnectorError;
use crate::transport::Transport;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

/// Public SonarQube instance used when no base URL is given
pub const SONAR_URL: &str = "https://sonarcloud.io/";

/// Client for the SonarQube web API of a single component
#[derive(Debug, Clone)]
pub struct SonarClient {
    component: String,
    api_url: String,
    credential: Option<String>,
    default_metric_keys: String,
    history_page_size: u32,
    transport: Transport,
}

impl SonarClient {
    /// Create a client for `component` on the server at `base_url`
    ///
    /// # Errors
    ///
    /// Returns `MissingArgument` if `component` is empty.
    pub fn new(
        component: &str,
        base_url: &str,
        config: &SonarConnectorConfig,
        transport: Transport,
    ) -> Result<Self, ConnectorError> {
        if component.is_empty() {
            return Err(ConnectorError::MissingArgument("component"));
        }

        Ok(Self {
            component: component.to_string(),
            api_url: urijoin(base_url, &["api"]),
            credential: config.credential.clone(),
            default_metric_keys: config.joined_metric_keys(),
            history_page_size: config.history_page_size,
            transport,
        })
    }

    /// Resolved API root (`<base_url>/api`)
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// Component this client queries
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Whether responses come from an archive rather than the server
    pub fn replays_archive(&self) -> bool {
        self.transport.replays_archive()
    }

    /// Metric catalog declared by the server (single request, not paged)
    pub async fn list_configured_metrics(&self) -> Result<MetricCatalog, ConnectorError> {
        let url = format!("{}/metrics/search", self.api_url);
        self.get_json(&url).await
    }

    /// Current values of `metric_keys` (comma-separated) for the component
    ///
    /// Falls back to the configured default keys when `metric_keys` is `None`.
    pub async fn get_measures(
        &self,
        metric_keys: Option<&str>,
    ) -> Result<ComponentMeasures, ConnectorError> {
        let url = format!(
            "{}/measures/component?component={}&metricKeys={}",
            self.api_url,
            self.component,
            self.metric_keys_param(metric_keys)
        );
        self.get_json(&url).await
    }

    /// Histories of `metric_keys` (comma-separated) for the component
    ///
    /// Walks every page of the history endpoint. The first page is requested
    /// without paging parameters; page N > 1 appends `&ps=<size>&p=<N>`.
    /// Whether another page follows is decided from the paging block of the
    /// page just received, since the server may change its page size.
    pub async fn get_history(
        &self,
        metric_keys: Option<&str>,
    ) -> Result<MetricHistory, ConnectorError> {
        let endpoint = format!(
            "{}/measures/search_history?component={}&metrics={}",
            self.api_url,
            self.component,
            self.metric_keys_param(metric_keys)
        );

        let mut history = MetricHistory::default();
        let mut page = 1;

        loop {
            let paging = self.fetch_history_page(&endpoint, page, &mut history).await?;
            if !paging.has_more() {
                break;
            }
            page += 1;
        }

        debug!(
            component = %self.component,
            pages = page,
            metrics = history.len(),
            "history pagination complete"
        );

        Ok(history)
    }

    /// Fetch page `page` of the history endpoint into `history`
    async fn fetch_history_page(
        &self,
        endpoint: &str,
        page: u64,
        history: &mut MetricHistory,
    ) -> Result<Paging, ConnectorError> {
        let url = if page > 1 {
            format!("{}&ps={}&p={}", endpoint, self.history_page_size, page)
        } else {
            endpoint.to_string()
        };

        let HistoryPage { paging, measures } = self.get_json(&url).await?;

        debug!(
            url = %url,
            page,
            page_index = paging.page_index,
            page_size = paging.page_size,
            total = paging.total,
            "fetched history page"
        );

        for record in measures {
            history.extend(record.metric, record.history);
        }

        // A page asking for more without moving the cursor forward would repeat forever
        if paging.has_more() && (paging.page_size == 0 || paging.page_index < page) {
            return Err(ConnectorError::remote(
                url,
                None,
                format!(
                    "paging did not advance (pageIndex={}, pageSize={}, requested page {})",
                    paging.page_index, paging.page_size, page
                ),
            ));
        }

        Ok(paging)
    }

    /// GET `url` and decode its body
    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ConnectorError> {
        let response = self
            .transport
            .fetch(url, self.credential.as_deref())
            .await?;
        decode_body(url, &response.body, self.transport.replays_archive())
    }

    /// Metric keys as a query value, commas encoded as `%2C`
    fn metric_keys_param(&self, metric_keys: Option<&str>) -> String {
        let keys = metric_keys.unwrap_or(&self.default_metric_keys);
        split_metric_keys(keys)
            .iter()
            .map(|key| urlencoding::encode(key).into_owned())
            .collect::<Vec<_>>()
            .join("%2C")
    }
}

/// Decode a JSON response body
///
/// Some archived bodies lost their final character when they were recorded.
/// With `repair_truncated` set, a body that is not valid JSON gets one `}`
/// appended and is parsed once more before giving up.
pub(crate) fn decode_body<T: DeserializeOwned>(
    url: &str,
    body: &str,
    repair_truncated: bool,
) -> Result<T, ConnectorError> {
    let value: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(e) if repair_truncated => {
            warn!(url = %url, error = %e, "archived body is not valid JSON, retrying with closing brace");
            serde_json::from_str(&format!("{}}}", body))
                .map_err(|e| ConnectorError::remote(url, None, format!("invalid JSON body: {}", e)))?
        }
        Err(e) => {
            return Err(ConnectorError::remote(
                url,
                None,
                format!("invalid JSON body: {}", e),
            ));
        }
    };

    serde_json::from_value(value)
        .map_err(|e| ConnectorError::remote(url, None, format!("unexpected response shape: {}", e)))
}

/// Join URL segments with single slashes
///
/// Leading and trailing slashes of every segment are dropped, so
/// `urijoin("https://host/", &["api"])` gives `https://host/api`.
pub fn urijoin(base: &str, parts: &[&str]) -> String {
    let mut url = base.trim_end_matches('/').to_string();
    for part in parts {
        let part = part.trim_matches('/');
        if !part.is_empty() {
            url.push('/');
            url.push_str(part);
        }
    }
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::Archive;
    use std::sync::Arc;

    #[test]
    fn test_urijoin() {
        assert_eq!(urijoin("https://sonarcloud.io/", &["api"]), "https://sonarcloud.io/api");
        assert_eq!(urijoin("https://sonar.example.com", &["/api/"]), "https://sonar.example.com/api");
        assert_eq!(urijoin("https://host/sonar/", &["api", "metrics"]), "https://host/sonar/api/metrics");
    }

    #[test]
    fn test_new_requires_component() {
        let transport = Transport::Replay(Arc::new(Archive::in_memory()));
        let result = SonarClient::new("", SONAR_URL, &SonarConnectorConfig::default(), transport);
        assert!(matches!(result, Err(ConnectorError::MissingArgument("component"))));
    }

    #[test]
    fn test_new_resolves_api_root() {
        let transport = Transport::Replay(Arc::new(Archive::in_memory()));
        let client =
            SonarClient::new("a_component", SONAR_URL, &SonarConnectorConfig::default(), transport)
                .unwrap();
        assert_eq!(client.api_url(), "https://sonarcloud.io/api");
        assert_eq!(client.component(), "a_component");
    }

    #[test]
    fn test_metric_keys_param_encodes_commas() {
        let config = SonarConnectorConfig {
            default_metric_keys: vec!["accessors".into(), "new_technical_debt".into()],
            ..Default::default()
        };
        let transport = Transport::Replay(Arc::new(Archive::in_memory()));
        let client = SonarClient::new("c01", SONAR_URL, &config, transport).unwrap();

        assert_eq!(client.metric_keys_param(None), "accessors%2Cnew_technical_debt");
        assert_eq!(client.metric_keys_param(Some("bugs,ncloc")), "bugs%2Cncloc");
    }

    #[test]
    fn test_decode_valid_body() {
        let catalog: MetricCatalog =
            decode_body("u", r#"{"metrics":[{"key":"bugs"}]}"#, false).unwrap();
        assert_eq!(catalog.metrics.len(), 1);
    }

    #[test]
    fn test_decode_repairs_one_missing_brace() {
        let catalog: MetricCatalog =
            decode_body("u", r#"{"metrics":[{"key":"bugs"}]"#, true).unwrap();
        assert_eq!(catalog.metrics[0].key, "bugs");
    }

    #[test]
    fn test_decode_repair_only_when_replaying() {
        let result: Result<MetricCatalog, _> = decode_body("u", r#"{"metrics":[]"#, false);
        assert!(matches!(result, Err(ConnectorError::Remote { .. })));
    }

    #[test]
    fn test_decode_rejects_two_missing_characters() {
        let result: Result<MetricCatalog, _> = decode_body("u", r#"{"metrics":[{"key":"bugs"}"#, true);
        assert!(matches!(result, Err(ConnectorError::Remote { .. })));

        let result: Result<MetricCatalog, _> = decode_body("u", "<html>oops</html>", true);
        assert!(matches!(result, Err(ConnectorError::Remote { .. })));
    }

    #[test]
    fn test_decode_wrong_shape() {
        let result: Result<ComponentMeasures, _> = decode_body("u", r#"{"metrics":[]}"#, false);
        assert!(matches!(result, Err(ConnectorError::Remote { .. })));
    }
}
