//! Persisted source → wrapper mapping.
//!
//! The title search that locates wrappers is a weak uniqueness guarantee:
//! under concurrent syncs it can race, and ambiguous matches are resolved
//! by guesswork. This index records every resolved pair in a small JSON
//! file so warm lookups bypass the search entirely. The tracker remains
//! the source of truth; a missing or stale index only costs a search.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::wrapper::SourceRef;

/// One resolved mapping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Wrapper issue number in the meta repository.
    pub wrapper: u64,
    /// When this mapping was last confirmed.
    pub last_seen: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexFile {
    entries: BTreeMap<String, IndexEntry>,
}

/// File-backed map from `owner/repo#number` to wrapper issue number.
///
/// Loaded once at startup, written through on every update. All I/O
/// failures degrade to "no index" behavior with a warning.
#[derive(Debug)]
pub struct WrapperIndex {
    path: Option<PathBuf>,
    state: Mutex<BTreeMap<String, IndexEntry>>,
}

impl WrapperIndex {
    /// Load the index from disk. A missing or unreadable file yields an
    /// empty index.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(content) => match serde_json::from_str::<IndexFile>(&content) {
                Ok(file) => {
                    debug!(path = %path.display(), entries = file.entries.len(), "Loaded wrapper index");
                    file.entries
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Wrapper index is corrupt, starting empty");
                    BTreeMap::new()
                }
            },
            Err(e) => {
                debug!(path = %path.display(), error = %e, "No wrapper index on disk, starting empty");
                BTreeMap::new()
            }
        };

        Self {
            path: Some(path),
            state: Mutex::new(entries),
        }
    }

    /// An index that never touches disk.
    #[must_use]
    pub fn in_memory() -> Self {
        Self {
            path: None,
            state: Mutex::new(BTreeMap::new()),
        }
    }

    /// Look up the wrapper number for a source issue.
    pub async fn get(&self, source: &SourceRef) -> Option<u64> {
        let state = self.state.lock().await;
        state.get(&key(source)).map(|entry| entry.wrapper)
    }

    /// Record a resolved mapping and write the index through to disk.
    pub async fn record(&self, source: &SourceRef, wrapper: u64) {
        let mut state = self.state.lock().await;
        state.insert(
            key(source),
            IndexEntry {
                wrapper,
                last_seen: Utc::now(),
            },
        );

        if let Some(path) = &self.path {
            let file = IndexFile {
                entries: state.clone(),
            };
            match serde_json::to_string_pretty(&file) {
                Ok(content) => {
                    if let Err(e) = tokio::fs::write(path, content).await {
                        warn!(path = %path.display(), error = %e, "Failed to persist wrapper index");
                    }
                }
                Err(e) => warn!(error = %e, "Failed to serialize wrapper index"),
            }
        }
    }
}

fn key(source: &SourceRef) -> String {
    source.to_string()
}
