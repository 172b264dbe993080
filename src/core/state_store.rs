//! Persisted dedup ledger and poll cursor.
//!
//! The store owns one JSON document holding the cursor, the processed and
//! ignored id lists, and the pipeline settings. Every mutation:
//!
//! 1. takes the in-process mutex,
//! 2. takes the cross-process file lock,
//! 3. re-reads the document from disk,
//! 4. applies the change and replaces the file atomically.
//!
//! Re-reading under the lock means a `minutes reset` from another process
//! is never overwritten by a stale in-memory copy.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

use super::persist::{self, PersistError};
use crate::domain::PipelineSettings;

/// Errors from the state store
#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("State file error ({path}): {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: PersistError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("State task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// The persisted document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StateDocument {
    #[serde(default)]
    pub cursor: Option<DateTime<Utc>>,

    #[serde(default)]
    pub processed: Vec<String>,

    #[serde(default)]
    pub ignored: Vec<String>,

    #[serde(default)]
    pub settings: PipelineSettings,
}

impl StateDocument {
    fn handled(&self, id: &str) -> Option<Handled> {
        if self.processed.iter().any(|p| p == id) {
            Some(Handled::Processed)
        } else if self.ignored.iter().any(|i| i == id) {
            Some(Handled::Ignored)
        } else {
            None
        }
    }
}

/// Which list an id is recorded in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Handled {
    Processed,
    Ignored,
}

/// Result of marking an id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkResult {
    /// Newly recorded
    Marked,

    /// Already recorded in the same list (no write happened)
    AlreadyMarked,

    /// Already recorded in the other list; the first write wins
    Rejected(Handled),
}

/// Counts removed by a reset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResetSummary {
    pub processed: usize,
    pub ignored: usize,
}

/// Read-only view for status output
#[derive(Debug, Clone)]
pub struct StateSummary {
    pub path: PathBuf,
    pub cursor: Option<DateTime<Utc>>,
    pub processed: usize,
    pub ignored: usize,
    pub settings: PipelineSettings,
}

/// Owned, serialized access to the processing state
pub struct StateStore {
    path: PathBuf,
    doc: Mutex<StateDocument>,
}

impl StateStore {
    /// Open the store at `path`. A missing file is an empty state; nothing
    /// is written until the first mutation.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, StateStoreError> {
        let path = path.into();
        let doc = load(path.clone()).await?;
        Ok(Self {
            path,
            doc: Mutex::new(doc),
        })
    }

    /// Open the store in the default location (~/.minutes/state.json)
    pub async fn open_default() -> anyhow::Result<Self> {
        let path = crate::config::paths::state_file()?;
        Ok(Self::open(path).await?)
    }

    /// Path of the backing document
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reload from disk, picking up changes made by other processes
    pub async fn refresh(&self) -> Result<(), StateStoreError> {
        let mut guard = self.doc.lock().await;
        *guard = load(self.path.clone()).await?;
        Ok(())
    }

    /// True if `id` is recorded as processed or ignored
    pub async fn is_handled(&self, id: &str) -> bool {
        self.doc.lock().await.handled(id).is_some()
    }

    /// Which list `id` is recorded in, if any
    pub async fn handled(&self, id: &str) -> Option<Handled> {
        self.doc.lock().await.handled(id)
    }

    pub async fn cursor(&self) -> Option<DateTime<Utc>> {
        self.doc.lock().await.cursor
    }

    pub async fn settings(&self) -> PipelineSettings {
        self.doc.lock().await.settings.clone()
    }

    pub async fn summary(&self) -> StateSummary {
        let doc = self.doc.lock().await;
        StateSummary {
            path: self.path.clone(),
            cursor: doc.cursor,
            processed: doc.processed.len(),
            ignored: doc.ignored.len(),
            settings: doc.settings.clone(),
        }
    }

    /// Record `id` as processed
    pub async fn mark_processed(&self, id: &str) -> Result<MarkResult, StateStoreError> {
        self.mark(id, Handled::Processed).await
    }

    /// Record `id` as ignored
    pub async fn mark_ignored(&self, id: &str) -> Result<MarkResult, StateStoreError> {
        self.mark(id, Handled::Ignored).await
    }

    async fn mark(&self, id: &str, target: Handled) -> Result<MarkResult, StateStoreError> {
        let owned = id.to_string();
        let result = self
            .mutate(move |doc| match doc.handled(&owned) {
                Some(existing) if existing == target => (MarkResult::AlreadyMarked, false),
                Some(existing) => (MarkResult::Rejected(existing), false),
                None => {
                    match target {
                        Handled::Processed => doc.processed.push(owned),
                        Handled::Ignored => doc.ignored.push(owned),
                    }
                    (MarkResult::Marked, true)
                }
            })
            .await?;

        if let MarkResult::Rejected(existing) = result {
            tracing::warn!(
                artifact = %id,
                "Refusing to mark as {:?}: already recorded as {:?}",
                target,
                existing
            );
        }
        Ok(result)
    }

    /// Advance the cursor. Returns false (and writes nothing) if `t` is not
    /// later than the stored cursor.
    pub async fn set_cursor(&self, t: DateTime<Utc>) -> Result<bool, StateStoreError> {
        self.mutate(move |doc| match doc.cursor {
            Some(current) if current >= t => (false, false),
            _ => {
                doc.cursor = Some(t);
                (true, true)
            }
        })
        .await
    }

    /// Clear both handled lists. The cursor and settings are kept.
    pub async fn reset(&self) -> Result<ResetSummary, StateStoreError> {
        self.mutate(|doc| {
            let summary = ResetSummary {
                processed: doc.processed.len(),
                ignored: doc.ignored.len(),
            };
            doc.processed.clear();
            doc.ignored.clear();
            (summary, true)
        })
        .await
    }

    /// Apply an edit to the persisted settings
    pub async fn update_settings<F, E>(
        &self,
        edit: F,
    ) -> Result<Result<PipelineSettings, E>, StateStoreError>
    where
        F: FnOnce(&mut PipelineSettings) -> Result<(), E> + Send + 'static,
        E: Send + 'static,
    {
        self.mutate(move |doc| {
            let mut next = doc.settings.clone();
            match edit(&mut next) {
                Ok(()) => {
                    doc.settings = next.clone();
                    (Ok(next), true)
                }
                Err(e) => (Err(e), false),
            }
        })
        .await
    }

    /// Run `change` against the freshest on-disk document under both locks.
    /// `change` returns its output and whether the document must be written.
    async fn mutate<F, T>(&self, change: F) -> Result<T, StateStoreError>
    where
        F: FnOnce(&mut StateDocument) -> (T, bool) + Send + 'static,
        T: Send + 'static,
    {
        let mut guard = self.doc.lock().await;
        let path = self.path.clone();

        let (doc, output) = tokio::task::spawn_blocking(move || {
            let _lock = persist::lock(&path)?;
            let mut doc: StateDocument =
                persist::read_or_default(&path).map_err(|source| StateStoreError::Persist {
                    path: path.clone(),
                    source,
                })?;
            let (output, dirty) = change(&mut doc);
            if dirty {
                persist::write_atomic(&path, &doc).map_err(|source| StateStoreError::Persist {
                    path: path.clone(),
                    source,
                })?;
            }
            Ok::<_, StateStoreError>((doc, output))
        })
        .await??;

        *guard = doc;
        Ok(output)
    }
}

async fn load(path: PathBuf) -> Result<StateDocument, StateStoreError> {
    tokio::task::spawn_blocking(move || {
        persist::read_or_default(&path).map_err(|source| StateStoreError::Persist { path, source })
    })
    .await?
}
