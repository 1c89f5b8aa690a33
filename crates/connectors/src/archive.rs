//! Response archive
//!
//! Stores raw response bodies keyed by request URL so a fetch can be
//! replayed later without touching the network. Archives live in memory and
//! can be saved to / loaded from a JSON file.

use crate::error::ConnectorError;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

/// A recorded response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArchivedResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw body as received
    pub body: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ArchiveFile {
    entries: BTreeMap<String, ArchivedResponse>,
}

/// URL-keyed store of recorded responses
#[derive(Debug, Default)]
pub struct Archive {
    path: Option<PathBuf>,
    entries: Mutex<BTreeMap<String, ArchivedResponse>>,
}

impl Archive {
    /// Create an empty archive that is never written to disk
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open an archive file, starting empty if it does not exist yet
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConnectorError> {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(contents) => {
                let file: ArchiveFile = serde_json::from_str(&contents).map_err(|e| {
                    ConnectorError::Archive(format!("invalid archive '{}': {}", path.display(), e))
                })?;
                file.entries
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                return Err(ConnectorError::Archive(format!(
                    "failed to read '{}': {}",
                    path.display(),
                    e
                )));
            }
        };

        debug!(path = %path.display(), entries = entries.len(), "opened archive");

        Ok(Self {
            path: Some(path),
            entries: Mutex::new(entries),
        })
    }

    /// Path backing this archive, if any
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Record a response for `url`, replacing any previous one
    pub fn insert(&self, url: impl Into<String>, status: u16, body: impl Into<String>) {
        self.entries.lock().insert(
            url.into(),
            ArchivedResponse {
                status,
                body: body.into(),
            },
        );
    }

    /// Look up the response recorded for `url`
    pub fn get(&self, url: &str) -> Option<ArchivedResponse> {
        self.entries.lock().get(url).cloned()
    }

    /// Number of recorded responses
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Check if nothing has been recorded
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Write the archive back to its file
    ///
    /// In-memory archives have nothing to write and succeed immediately.
    ///
    /// # Errors
    ///
    /// Returns error if serialization or the write fails.
    pub fn save(&self) -> Result<(), ConnectorError> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let file = ArchiveFile {
            entries: self.entries.lock().clone(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| ConnectorError::Archive(format!("failed to serialize archive: {}", e)))?;
        fs::write(path, json).map_err(|e| {
            ConnectorError::Archive(format!("failed to write '{}': {}", path.display(), e))
        })?;

        debug!(path = %path.display(), entries = file.entries.len(), "saved archive");
        Ok(())
    }
}
