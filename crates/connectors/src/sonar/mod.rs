//! SonarQube connector for pulling code-quality metrics
//!
//! Fetches the metric catalog, current measures and measure histories of one
//! component and turns them into a uniform item stream. Every item carries the
//! capture time of the fetch that produced it; history points also keep the
//! server's observation date.
//!
//! Items are produced lazily, one forward pass per fetch. Iterating again
//! needs a new fetch.

mod client;
mod types;

pub use client::{SONAR_URL, SonarClient, urijoin};
pub use types::{
    Category, ComponentMeasures, HistoryPoint, HistoryValue, Item, Measure, MeasuredComponent,
    MetricCatalog, MetricDefinition, MetricHistory, Paging,
};

use crate::archive::Archive;
use crate::config::SonarConnectorConfig;
use crate::datetime::{DEFAULT_DATETIME, unix_seconds};
use crate::envelope::Envelope;
use crate::error::ConnectorError;
use crate::ident::uuid;
use crate::traits::Connector;
use crate::transport::{HttpTransport, Transport, TransportConfig};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use std::vec;
use tracing::{debug, info};

/// Name reported in item envelopes
pub const BACKEND_NAME: &str = "Sonar";

/// Item format version reported in item envelopes
pub const BACKEND_VERSION: &str = "0.5.0";

/// Fields every metric catalog entry carries
const METRIC_FIELDS: [&str; 9] = [
    "key",
    "type",
    "name",
    "description",
    "domain",
    "direction",
    "qualitative",
    "hidden",
    "custom",
];

/// Fields every current measure carries
const MEASURE_FIELDS: [&str; 3] = ["metric", "value", "bestValue"];

/// SonarQube connector configuration (simple version for CLI)
#[derive(Debug, Clone)]
pub struct SonarConfig {
    /// Server URL (default: https://sonarcloud.io/)
    pub base_url: String,
    /// Label for fetched items (default: the API origin)
    pub tag: Option<String>,
    /// Connection policy and default metric keys
    pub connection: SonarConnectorConfig,
}

impl Default for SonarConfig {
    fn default() -> Self {
        Self {
            base_url: SONAR_URL.to_string(),
            tag: None,
            connection: SonarConnectorConfig::default(),
        }
    }
}

/// Per-fetch arguments
#[derive(Debug, Clone, Default)]
pub struct FetchArgs {
    /// Lower bound on item dates. Accepted and normalized, but the SonarQube
    /// endpoints used here take no date filter, so it is not sent.
    pub from_date: Option<DateTime<Utc>>,
    /// Comma-separated metric keys (default: the configured keys)
    pub metric_keys: Option<String>,
}

impl FetchArgs {
    /// The from-date, defaulting to [`DEFAULT_DATETIME`]
    pub fn from_date(&self) -> DateTime<Utc> {
        self.from_date.unwrap_or(DEFAULT_DATETIME)
    }
}

/// SonarQube connector for one component
pub struct Sonar {
    component: String,
    origin: String,
    tag: String,
    client: SonarClient,
}

impl Sonar {
    /// Create a connector that fetches from the live server
    ///
    /// # Errors
    ///
    /// Returns `MissingArgument` if `component` is empty, or an error if HTTP
    /// client creation fails.
    pub fn new(component: &str, config: SonarConfig) -> Result<Self, ConnectorError> {
        let transport = Self::http_transport(&config.connection)?;
        Self::build(component, config, Transport::Http(transport))
    }

    /// Create a live connector that records every response into `archive`
    ///
    /// # Errors
    ///
    /// Same as [`Sonar::new`].
    pub fn with_archive(
        component: &str,
        config: SonarConfig,
        archive: Arc<Archive>,
    ) -> Result<Self, ConnectorError> {
        let transport = Self::http_transport(&config.connection)?.with_recorder(archive);
        Self::build(component, config, Transport::Http(transport))
    }

    /// Create a connector that replays responses from `archive`
    ///
    /// # Errors
    ///
    /// Returns `MissingArgument` if `component` is empty.
    pub fn from_archive(
        component: &str,
        config: SonarConfig,
        archive: Arc<Archive>,
    ) -> Result<Self, ConnectorError> {
        Self::build(component, config, Transport::Replay(archive))
    }

    fn http_transport(connection: &SonarConnectorConfig) -> Result<HttpTransport, ConnectorError> {
        HttpTransport::new(TransportConfig {
            tls_verify: connection.tls_verify,
            resilience: connection.resilience_config(),
        })
    }

    fn build(
        component: &str,
        config: SonarConfig,
        transport: Transport,
    ) -> Result<Self, ConnectorError> {
        if component.is_empty() {
            return Err(ConnectorError::MissingArgument("component"));
        }

        let client = SonarClient::new(component, &config.base_url, &config.connection, transport)?;
        let origin = client.api_url().to_string();
        let tag = config.tag.unwrap_or_else(|| origin.clone());

        Ok(Self {
            component: component.to_string(),
            origin,
            tag,
            client,
        })
    }

    /// Component this connector fetches
    pub fn component(&self) -> &str {
        &self.component
    }

    /// API client in use
    pub fn client(&self) -> &SonarClient {
        &self.client
    }

    /// Categories this connector supports
    pub fn categories() -> &'static [Category] {
        &Category::ALL
    }

    /// Items can be recorded into an archive while fetching
    pub fn has_archiving() -> bool {
        true
    }

    /// An interrupted fetch can be started again
    pub fn has_resuming() -> bool {
        true
    }

    /// Whether responses come from an archive rather than the server
    pub fn is_replaying(&self) -> bool {
        self.client.replays_archive()
    }

    /// Fetch items of `category` (default: measures), wrapped in envelopes
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedCategory` for an unknown category, or the first
    /// remote failure.
    pub async fn fetch(
        &self,
        category: Option<&str>,
        args: FetchArgs,
    ) -> Result<Envelopes<'_>, ConnectorError> {
        let category = category.unwrap_or(Category::default().as_str());
        let args = FetchArgs {
            from_date: Some(args.from_date()),
            ..args
        };

        let items = self.fetch_items(category, &args).await?;
        Ok(Envelopes {
            connector: self,
            items,
            finished: false,
        })
    }

    /// Fetch raw items of `category`
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedCategory` for an unknown category, or the first
    /// remote failure.
    pub async fn fetch_items(
        &self,
        category: &str,
        args: &FetchArgs,
    ) -> Result<Items, ConnectorError> {
        let category: Category = category.parse()?;

        debug!(
            connector = "sonarqube",
            component = %self.component,
            category = %category,
            from_date = %args.from_date(),
            replay = self.is_replaying(),
            "fetching items"
        );

        match category {
            Category::Metric => self.fetch_metrics().await,
            Category::Measures => self.fetch_measures(args).await,
            Category::History => self.fetch_history(args).await,
        }
    }

    /// Metric catalog entries, each stamped with the capture time
    async fn fetch_metrics(&self) -> Result<Items, ConnectorError> {
        let fetched_on = unix_seconds(Utc::now());
        let catalog = self.client.list_configured_metrics().await?;

        Ok(Items::new(
            Category::Metric,
            &self.component,
            fetched_on,
            Pending::Metrics(catalog.metrics.into_iter()),
        ))
    }

    /// Current measures, identified by component, metric and capture time
    async fn fetch_measures(&self, args: &FetchArgs) -> Result<Items, ConnectorError> {
        let fetched_on = unix_seconds(Utc::now());
        let response = self.client.get_measures(args.metric_keys.as_deref()).await?;

        Ok(Items::new(
            Category::Measures,
            &self.component,
            fetched_on,
            Pending::Measures {
                component_key: response.component.key,
                measures: response.component.measures.into_iter(),
            },
        ))
    }

    /// History points, identified by component, metric and observation date
    async fn fetch_history(&self, args: &FetchArgs) -> Result<Items, ConnectorError> {
        let fetched_on = unix_seconds(Utc::now());
        let history = self.client.get_history(args.metric_keys.as_deref()).await?;

        Ok(Items::new(
            Category::History,
            &self.component,
            fetched_on,
            Pending::History {
                metrics: history.into_iter(),
                current: None,
            },
        ))
    }

    /// Identifier of a fetched item in its flat JSON form
    pub fn metadata_id(item: &Value) -> Option<String> {
        match item.get("id")? {
            Value::String(id) => Some(id.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Update time of a fetched item: its capture time, not a server date
    pub fn metadata_updated_on(item: &Value) -> Option<f64> {
        item.get("fetched_on")?.as_f64()
    }

    /// Infer the category of a flat JSON item from the fields it carries
    ///
    /// Catalog fields win over measure fields; anything else is history.
    /// Items produced by this crate also know their category directly through
    /// [`Item::category`].
    pub fn metadata_category(item: &Value) -> Category {
        let has_all = |fields: &[&str]| {
            item.as_object()
                .is_some_and(|object| fields.iter().all(|field| object.contains_key(*field)))
        };

        if has_all(&METRIC_FIELDS) {
            Category::Metric
        } else if has_all(&MEASURE_FIELDS) {
            Category::Measures
        } else {
            Category::History
        }
    }
}

impl Connector for Sonar {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    fn version(&self) -> &'static str {
        BACKEND_VERSION
    }

    fn origin(&self) -> &str {
        &self.origin
    }

    fn tag(&self) -> &str {
        &self.tag
    }
}

/// Decoded payload still waiting to be turned into items
enum Pending {
    Metrics(vec::IntoIter<MetricDefinition>),
    Measures {
        component_key: String,
        measures: vec::IntoIter<Measure>,
    },
    History {
        metrics: vec::IntoIter<(String, Vec<HistoryValue>)>,
        current: Option<(String, vec::IntoIter<HistoryValue>)>,
    },
}

/// Items of one fetch, produced in a single forward pass
///
/// Iteration stops after the first error. Items already yielded stay valid.
/// Completion counts are logged once the sequence is exhausted.
pub struct Items {
    category: Category,
    component: String,
    fetched_on: f64,
    pending: Pending,
    yielded: usize,
    metrics_done: usize,
    finished: bool,
}

impl Items {
    fn new(category: Category, component: &str, fetched_on: f64, pending: Pending) -> Self {
        Self {
            category,
            component: component.to_string(),
            fetched_on,
            pending,
            yielded: 0,
            metrics_done: 0,
            finished: false,
        }
    }

    /// Category of the items
    pub fn category(&self) -> Category {
        self.category
    }

    /// Capture time shared by every item of this fetch
    pub fn fetched_on(&self) -> f64 {
        self.fetched_on
    }

    fn next_item(&mut self) -> Option<Result<Item, ConnectorError>> {
        let fetched_on = self.fetched_on;

        match &mut self.pending {
            Pending::Metrics(metrics) => {
                let mut metric = metrics.next()?;
                metric.fetched_on = fetched_on;
                Some(Ok(Item::Metric(metric)))
            }
            Pending::Measures {
                component_key,
                measures,
            } => {
                let mut measure = measures.next()?;
                let captured = format!("{:?}", fetched_on);
                Some(
                    uuid(&[component_key.as_str(), measure.metric.as_str(), captured.as_str()]).map(|id| {
                        measure.id = id;
                        measure.fetched_on = fetched_on;
                        Item::Measure(measure)
                    }),
                )
            }
            Pending::History { metrics, current } => loop {
                if let Some((metric, values)) = current {
                    if let Some(value) = values.next() {
                        return Some(history_point(&self.component, metric, value, fetched_on));
                    }
                    self.metrics_done += 1;
                    *current = None;
                }

                let (metric, values) = metrics.next()?;
                *current = Some((metric, values.into_iter()));
            },
        }
    }

    fn log_completion(&self) {
        match self.category {
            Category::Metric => info!(
                connector = "sonarqube",
                component = %self.component,
                count = self.yielded,
                "fetch process completed: metric keys fetched"
            ),
            Category::Measures => info!(
                connector = "sonarqube",
                component = %self.component,
                count = self.yielded,
                "fetch process completed: metrics fetched"
            ),
            Category::History => info!(
                connector = "sonarqube",
                component = %self.component,
                count = self.metrics_done,
                "fetch process completed: histories for metrics fetched"
            ),
        }
    }
}

impl Iterator for Items {
    type Item = Result<Item, ConnectorError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.next_item() {
            Some(Ok(item)) => {
                self.yielded += 1;
                Some(Ok(item))
            }
            Some(Err(e)) => {
                self.finished = true;
                Some(Err(e))
            }
            None => {
                self.finished = true;
                self.log_completion();
                None
            }
        }
    }
}

/// Build one history item; its id depends on the observation date only
fn history_point(
    component: &str,
    metric: &str,
    value: HistoryValue,
    fetched_on: f64,
) -> Result<Item, ConnectorError> {
    let id = uuid(&[component, metric, value.date.as_str()])?;
    Ok(Item::History(HistoryPoint {
        id,
        metric: metric.to_string(),
        value: value.value,
        measured_on: value.date,
        fetched_on,
    }))
}

/// Items of one fetch wrapped in envelopes
pub struct Envelopes<'a> {
    connector: &'a Sonar,
    items: Items,
    finished: bool,
}

impl Envelopes<'_> {
    /// Category of the wrapped items
    pub fn category(&self) -> Category {
        self.items.category()
    }

    fn wrap(&self, item: Item) -> Result<Envelope, ConnectorError> {
        let data = item.to_value()?;
        Envelope::wrap(
            self.connector,
            &item.id(),
            item.category().as_str(),
            item.fetched_on(),
            data,
        )
    }
}

impl Iterator for Envelopes<'_> {
    type Item = Result<Envelope, ConnectorError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let result = match self.items.next()? {
            Ok(item) => self.wrap(item),
            Err(e) => Err(e),
        };
        if result.is_err() {
            self.finished = true;
        }
        Some(result)
    }
}
