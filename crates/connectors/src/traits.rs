//! Connector trait definition

/// Identity of a pull-based connector
///
/// Connectors fetch items from external services and hand them to the
/// envelope layer, which needs to know where each item came from.
pub trait Connector: Send + Sync {
    /// Returns the connector name (e.g., "Sonar")
    fn name(&self) -> &'static str;

    /// Version of the item format this connector produces
    fn version(&self) -> &'static str;

    /// URL the items are fetched from
    fn origin(&self) -> &str;

    /// Label attached to every item (defaults to the origin)
    fn tag(&self) -> &str;
}
