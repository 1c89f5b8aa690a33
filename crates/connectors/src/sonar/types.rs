//! SonarQube API payloads and the items built from them

use crate::error::ConnectorError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Item categories the connector can fetch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Metric catalog declared by the server
    Metric,
    /// Current value of each metric for the component
    #[default]
    Measures,
    /// Historical values of each metric for the component
    History,
}

impl Category {
    /// All supported categories
    pub const ALL: [Category; 3] = [Category::Metric, Category::Measures, Category::History];

    /// Category name as used on the command line and in envelopes
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Metric => "metric",
            Self::Measures => "measures",
            Self::History => "history",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ConnectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "metric" => Ok(Self::Metric),
            "measures" => Ok(Self::Measures),
            "history" => Ok(Self::History),
            other => Err(ConnectorError::UnsupportedCategory(other.to_string())),
        }
    }
}

// --- Items ---

/// Metric catalog entry, as declared by the server
///
/// Fields the server sends beyond the known ones are kept in `extra` so the
/// entry is passed on unchanged apart from `fetched_on`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricDefinition {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub key: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qualitative: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    /// Capture time (UNIX seconds), stamped by the connector
    #[serde(default)]
    pub fetched_on: f64,
}

/// Current value of one metric for one component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measure {
    #[serde(default)]
    pub id: String,
    pub metric: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(rename = "bestValue", default, skip_serializing_if = "Option::is_none")]
    pub best_value: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    /// Capture time (UNIX seconds), stamped by the connector
    #[serde(default)]
    pub fetched_on: f64,
}

/// One historical observation of one metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub id: String,
    pub metric: String,
    pub value: Option<Value>,
    /// Server-provided observation date, verbatim
    pub measured_on: String,
    /// Capture time (UNIX seconds), shared by the whole fetch
    pub fetched_on: f64,
}

/// An item produced by the connector, tagged with its category
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Item {
    Metric(MetricDefinition),
    Measure(Measure),
    History(HistoryPoint),
}

impl Item {
    /// Category this item was fetched under
    pub fn category(&self) -> Category {
        match self {
            Item::Metric(_) => Category::Metric,
            Item::Measure(_) => Category::Measures,
            Item::History(_) => Category::History,
        }
    }

    /// Item identifier
    ///
    /// Catalog entries use the server's `id`, or their key when the server
    /// sends none.
    pub fn id(&self) -> String {
        match self {
            Item::Metric(metric) => match &metric.id {
                Some(Value::String(id)) => id.clone(),
                Some(id) => id.to_string(),
                None => metric.key.clone(),
            },
            Item::Measure(measure) => measure.id.clone(),
            Item::History(point) => point.id.clone(),
        }
    }

    /// Capture time (UNIX seconds)
    pub fn fetched_on(&self) -> f64 {
        match self {
            Item::Metric(metric) => metric.fetched_on,
            Item::Measure(measure) => measure.fetched_on,
            Item::History(point) => point.fetched_on,
        }
    }

    /// Flat JSON form of the item
    pub fn to_value(&self) -> Result<Value, ConnectorError> {
        Ok(serde_json::to_value(self)?)
    }
}

// --- API Response Types ---

/// `GET /metrics/search`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MetricCatalog {
    #[serde(default)]
    pub metrics: Vec<MetricDefinition>,
}

/// `GET /measures/component`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ComponentMeasures {
    pub component: MeasuredComponent,
}

/// Component block of a measures response
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct MeasuredComponent {
    pub key: String,
    #[serde(default)]
    pub measures: Vec<Measure>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Paging block of a partial result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Paging {
    pub page_index: u64,
    pub page_size: u64,
    pub total: u64,
}

impl Paging {
    /// Whether the result set continues past this page
    pub fn has_more(&self) -> bool {
        self.page_index.saturating_mul(self.page_size) < self.total
    }
}

/// `GET /measures/search_history`, one page
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct HistoryPage {
    pub paging: Paging,
    #[serde(default)]
    pub measures: Vec<MetricHistoryRecord>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub(crate) struct MetricHistoryRecord {
    pub metric: String,
    #[serde(default)]
    pub history: Vec<HistoryValue>,
}

/// One (date, value) observation as sent by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryValue {
    pub date: String,
    #[serde(default)]
    pub value: Option<Value>,
}

/// Metric histories accumulated across pages
///
/// Metrics keep the order in which they first appeared; each metric's
/// observations keep page order, then in-page order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricHistory {
    entries: Vec<(String, Vec<HistoryValue>)>,
}

impl MetricHistory {
    /// Append observations for `metric`
    pub fn extend(&mut self, metric: String, values: Vec<HistoryValue>) {
        match self.entries.iter_mut().find(|(key, _)| *key == metric) {
            Some((_, existing)) => existing.extend(values),
            None => self.entries.push((metric, values)),
        }
    }

    /// Observations for `metric`
    pub fn get(&self, metric: &str) -> Option<&[HistoryValue]> {
        self.entries
            .iter()
            .find(|(key, _)| key == metric)
            .map(|(_, values)| values.as_slice())
    }

    /// Metric keys, in first-seen order
    pub fn metrics(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    /// Number of metrics
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no metric was returned
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for MetricHistory {
    type Item = (String, Vec<HistoryValue>);
    type IntoIter = std::vec::IntoIter<(String, Vec<HistoryValue>)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_category_from_str() {
        assert_eq!("metric".parse::<Category>().unwrap(), Category::Metric);
        assert_eq!("measures".parse::<Category>().unwrap(), Category::Measures);
        assert_eq!("history".parse::<Category>().unwrap(), Category::History);
    }

    #[test]
    fn test_category_unsupported() {
        for name in ["issues", "Measures", "", "metrics"] {
            assert!(matches!(
                name.parse::<Category>(),
                Err(ConnectorError::UnsupportedCategory(_))
            ));
        }
    }

    #[test]
    fn test_category_default_and_display() {
        assert_eq!(Category::default(), Category::Measures);
        assert_eq!(Category::History.to_string(), "history");
    }

    #[test]
    fn test_paging_has_more() {
        let paging = |page_index, page_size, total| Paging {
            page_index,
            page_size,
            total,
        };
        assert!(paging(1, 20, 64).has_more());
        assert!(paging(3, 20, 64).has_more());
        assert!(!paging(4, 20, 64).has_more());
        assert!(!paging(1, 100, 100).has_more());
    }

    #[test]
    fn test_metric_definition_keeps_unknown_fields() {
        let raw = json!({
            "id": "2",
            "key": "ncloc",
            "type": "INT",
            "name": "Lines of code",
            "domain": "Size",
            "direction": -1,
            "qualitative": false,
            "hidden": false,
            "custom": false,
            "decimalScale": 0
        });
        let metric: MetricDefinition = serde_json::from_value(raw).unwrap();
        assert_eq!(metric.kind.as_deref(), Some("INT"));
        assert_eq!(metric.extra.get("decimalScale"), Some(&json!(0)));

        let value = serde_json::to_value(&metric).unwrap();
        assert_eq!(value["decimalScale"], json!(0));
        assert_eq!(value["type"], json!("INT"));
        assert!(value.get("description").is_none());
    }

    #[test]
    fn test_item_id_for_metric() {
        let mut metric: MetricDefinition =
            serde_json::from_value(json!({"key": "bugs", "id": 12})).unwrap();
        assert_eq!(Item::Metric(metric.clone()).id(), "12");

        metric.id = None;
        assert_eq!(Item::Metric(metric).id(), "bugs");
    }

    #[test]
    fn test_metric_history_accumulates_in_order() {
        let point = |date: &str| HistoryValue {
            date: date.to_string(),
            value: Some(json!("1")),
        };

        let mut history = MetricHistory::default();
        history.extend("bugs".into(), vec![point("d1"), point("d2")]);
        history.extend("ncloc".into(), vec![point("d1")]);
        history.extend("bugs".into(), vec![point("d3")]);

        assert_eq!(history.len(), 2);
        assert_eq!(history.metrics().collect::<Vec<_>>(), vec!["bugs", "ncloc"]);
        let dates: Vec<_> = history
            .get("bugs")
            .unwrap()
            .iter()
            .map(|p| p.date.as_str())
            .collect();
        assert_eq!(dates, vec!["d1", "d2", "d3"]);
    }
}
