//! Glean - Connectors
//!
//! Pull-based connectors that fetch code-quality data from external servers
//! and normalize it into uniform item streams.
//!
//! # Available Connectors
//!
//! - **SonarQube** - Metric catalog, current measures and measure history
//!
//! # Design Principles
//!
//! - **Pull-based**: Connectors fetch data on demand, one component at a time
//! - **Deterministic ids**: Item ids are hashes of the fields that identify them
//! - **Replayable**: Every response can be recorded into an archive and served
//!   again later without network access
//! - **Simple interface**: Each connector implements the `Connector` trait
//!
//! # Feature Flags
//!
//! Connectors can be selectively compiled using feature flags:
//!
//! ```toml
//! [dependencies]
//! glean-connectors = { version = "0.1", default-features = false, features = ["sonarqube"] }
//! ```
//!
//! Available features:
//! - `sonarqube` (default) - SonarQube metrics
//!
//! # Example
//!
//! ```ignore
//! use glean_connectors::{FetchArgs, Sonar, SonarConfig};
//!
//! let sonar = Sonar::new("my_project", SonarConfig::default())?;
//!
//! for envelope in sonar.fetch(Some("history"), FetchArgs::default()).await? {
//!     let envelope = envelope?;
//!     println!("{} {}", envelope.uuid, envelope.data["metric"]);
//! }
//! ```

pub mod archive;
pub mod config;
pub mod datetime;
mod envelope;
mod error;
pub mod ident;
pub mod resilience;
pub mod transport;
mod traits;

// Conditionally compiled connectors
#[cfg(feature = "sonarqube")]
mod sonar;

// Re-exports
pub use archive::Archive;
pub use envelope::{Envelope, SearchFields};
pub use error::ConnectorError;
pub use traits::Connector;

#[cfg(feature = "sonarqube")]
pub use config::SonarConnectorConfig;
#[cfg(feature = "sonarqube")]
pub use sonar::{
    BACKEND_NAME, BACKEND_VERSION, Category, ComponentMeasures, Envelopes, FetchArgs,
    HistoryPoint, HistoryValue, Item, Items, Measure, MeasuredComponent, MetricCatalog,
    MetricDefinition, MetricHistory, Paging, SONAR_URL, Sonar, SonarClient, SonarConfig, urijoin,
};

/// List of available connector types (compiled in)
pub fn available_connectors() -> &'static [&'static str] {
    &[
        #[cfg(feature = "sonarqube")]
        "sonarqube",
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_available_connectors() {
        let connectors = available_connectors();
        #[cfg(feature = "sonarqube")]
        assert!(connectors.contains(&"sonarqube"));
        let _ = connectors;
    }
}
