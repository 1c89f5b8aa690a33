//! Item envelopes
//!
//! Wraps each raw item with the metadata downstream archival needs: where it
//! came from, a stable identifier and when it was last updated.

use crate::datetime::unix_seconds;
use crate::error::ConnectorError;
use crate::ident::uuid;
use crate::traits::Connector;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Fields downstream indexes search items by
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchFields {
    pub item_id: String,
}

/// A fetched item plus its metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub backend_name: String,
    pub backend_version: String,
    /// Wrap time (UNIX seconds)
    pub timestamp: f64,
    pub origin: String,
    /// Hash of origin and item id
    pub uuid: String,
    /// Item update time (UNIX seconds)
    pub updated_on: f64,
    pub category: String,
    pub search_fields: SearchFields,
    pub tag: String,
    pub data: Value,
}

impl Envelope {
    /// Wrap `data` fetched by `connector`
    ///
    /// # Errors
    ///
    /// Returns `InvalidIdentifier` if the origin or the item id is empty.
    pub fn wrap<C: Connector>(
        connector: &C,
        item_id: &str,
        category: &str,
        updated_on: f64,
        data: Value,
    ) -> Result<Self, ConnectorError> {
        let origin = connector.origin();

        Ok(Self {
            backend_name: connector.name().to_string(),
            backend_version: connector.version().to_string(),
            timestamp: unix_seconds(Utc::now()),
            origin: origin.to_string(),
            uuid: uuid(&[origin, item_id])?,
            updated_on,
            category: category.to_string(),
            search_fields: SearchFields {
                item_id: item_id.to_string(),
            },
            tag: connector.tag().to_string(),
            data,
        })
    }
}
