//! Items held for manual review.
//!
//! The router never files issues on its own. It appends stories and action
//! items here and an operator picks which ones go to the issue tracker with
//! `minutes review post <id>...`. Stories are filed as Story issues, action
//! items as Task issues.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::persist::{self, PersistError};
use crate::adapters::{IssuePayload, IssueTracker};
use crate::domain::{ActionItem, ArtifactMeta, StoryItem};

/// Errors from the review queue
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Review file error ({path}): {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: PersistError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Review task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("No pending item with id: {0}")]
    NotFound(String),
}

/// What is waiting for review
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReviewItem {
    Story(StoryItem),
    Action(ActionItem),
}

impl ReviewItem {
    /// One-line title for listings
    pub fn summary(&self) -> &str {
        match self {
            ReviewItem::Story(story) => &story.summary,
            ReviewItem::Action(action) => &action.title,
        }
    }

    /// Tag shown next to the id
    pub fn kind(&self) -> &'static str {
        match self {
            ReviewItem::Story(_) => "STORY",
            ReviewItem::Action(_) => "TASK",
        }
    }

    /// The tracker payload for this item
    pub fn to_issue(&self, project_key: &str, meeting_title: &str) -> IssuePayload {
        match self {
            ReviewItem::Story(story) => IssuePayload::from_story(project_key, story, meeting_title),
            ReviewItem::Action(action) => {
                IssuePayload::from_action(project_key, action, meeting_title)
            }
        }
    }
}

/// An item waiting for an operator decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingItem {
    /// Short id shown to the operator
    pub id: String,
    pub artifact_id: String,
    pub meeting_title: String,
    pub queued_at: DateTime<Utc>,
    pub item: ReviewItem,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ReviewDocument {
    #[serde(default)]
    pending: Vec<PendingItem>,
}

/// Outcome of posting selected items
#[derive(Debug, Default)]
pub struct PostReport {
    /// (pending id, issue key)
    pub created: Vec<(String, String)>,
    /// (pending id, error)
    pub failed: Vec<(String, String)>,
}

/// File-backed review queue
pub struct ReviewQueue {
    path: PathBuf,
    guard: Mutex<()>,
}

impl ReviewQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    /// Open the queue in the default location (~/.minutes/reviews.json)
    pub fn open_default() -> anyhow::Result<Self> {
        Ok(Self::new(crate::config::paths::reviews_file()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Hold stories and action items from one meeting; returns their
    /// pending ids, stories first
    pub async fn hold(
        &self,
        meta: &ArtifactMeta,
        stories: &[StoryItem],
        actions: &[ActionItem],
    ) -> Result<Vec<String>, ReviewError> {
        if stories.is_empty() && actions.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let items = stories
            .iter()
            .cloned()
            .map(ReviewItem::Story)
            .chain(actions.iter().cloned().map(ReviewItem::Action));
        let entries: Vec<PendingItem> = items
            .map(|item| PendingItem {
                id: short_id(),
                artifact_id: meta.artifact_id.clone(),
                meeting_title: meta.title.clone(),
                queued_at: now,
                item,
            })
            .collect();
        let ids = entries.iter().map(|e| e.id.clone()).collect();

        self.mutate(move |doc| {
            doc.pending.extend(entries);
            ((), true)
        })
        .await?;

        Ok(ids)
    }

    /// All pending items, oldest first
    pub async fn list(&self) -> Result<Vec<PendingItem>, ReviewError> {
        let _guard = self.guard.lock().await;
        let path = self.path.clone();
        let doc = tokio::task::spawn_blocking(move || read(&path)).await??;
        Ok(doc.pending)
    }

    /// Drop items without filing them; returns how many were removed
    pub async fn discard(&self, ids: &[String]) -> Result<usize, ReviewError> {
        let ids = ids.to_vec();
        self.mutate(move |doc| {
            let before = doc.pending.len();
            doc.pending.retain(|p| !ids.contains(&p.id));
            let removed = before - doc.pending.len();
            (removed, removed > 0)
        })
        .await
    }

    /// File the selected items with the tracker.
    ///
    /// Each item is submitted on its own task. Items that were filed are
    /// removed from the queue; failures stay queued for another attempt.
    pub async fn post(
        &self,
        ids: &[String],
        tracker: Arc<dyn IssueTracker>,
        project_key: &str,
    ) -> Result<PostReport, ReviewError> {
        let pending = self.list().await?;
        let mut selected = Vec::new();
        for id in ids {
            match pending.iter().find(|p| &p.id == id) {
                Some(p) => selected.push(p.clone()),
                None => return Err(ReviewError::NotFound(id.clone())),
            }
        }

        let mut handles = Vec::new();
        for entry in selected {
            let tracker = Arc::clone(&tracker);
            let issue = entry.item.to_issue(project_key, &entry.meeting_title);
            handles.push((
                entry.id,
                tokio::spawn(async move { tracker.create_issue(&issue).await }),
            ));
        }

        let mut report = PostReport::default();
        for (id, handle) in handles {
            match handle.await {
                Ok(Ok(key)) => {
                    tracing::info!(pending = %id, issue = %key, "Review item filed");
                    report.created.push((id, key));
                }
                Ok(Err(e)) => {
                    tracing::warn!(pending = %id, "Failed to file review item: {}", e);
                    report.failed.push((id, e.to_string()));
                }
                Err(e) => {
                    tracing::warn!(pending = %id, "Review submission task failed: {}", e);
                    report.failed.push((id, e.to_string()));
                }
            }
        }

        let filed: Vec<String> = report.created.iter().map(|(id, _)| id.clone()).collect();
        self.discard(&filed).await?;

        Ok(report)
    }

    async fn mutate<F, T>(&self, change: F) -> Result<T, ReviewError>
    where
        F: FnOnce(&mut ReviewDocument) -> (T, bool) + Send + 'static,
        T: Send + 'static,
    {
        let _guard = self.guard.lock().await;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || {
            let _lock = persist::lock(&path)?;
            let mut doc = read(&path)?;
            let (output, dirty) = change(&mut doc);
            if dirty {
                persist::write_atomic(&path, &doc).map_err(|source| ReviewError::Persist {
                    path: path.clone(),
                    source,
                })?;
            }
            Ok::<_, ReviewError>(output)
        })
        .await?
    }
}

fn read(path: &Path) -> Result<ReviewDocument, ReviewError> {
    persist::read_or_default(path).map_err(|source| ReviewError::Persist {
        path: path.to_path_buf(),
        source,
    })
}

fn short_id() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn meta() -> ArtifactMeta {
        ArtifactMeta {
            artifact_id: "msg-1".to_string(),
            title: "Backlog Grooming".to_string(),
            received_at: Utc::now(),
            recording_link: None,
        }
    }

    fn story(summary: &str) -> StoryItem {
        StoryItem {
            summary: summary.to_string(),
            description: String::new(),
            acceptance_criteria: vec![],
            estimate_points: None,
            assignees: vec![],
            labels: vec!["AIGen-ReviewRqd".to_string()],
        }
    }

    fn action(title: &str) -> ActionItem {
        ActionItem {
            title: title.to_string(),
            description: String::new(),
            owner: Some("Dana".to_string()),
            due_date_hint: None,
            related_decision: None,
        }
    }

    #[test]
    fn test_item_kind_is_tagged_on_disk() {
        let json = serde_json::to_value(ReviewItem::Action(action("Send deck"))).unwrap();
        assert_eq!(json["kind"], "action");
        assert_eq!(json["title"], "Send deck");

        let back: ReviewItem = serde_json::from_value(json).unwrap();
        assert_eq!(back.to_issue("PLAT", "Standup").issue_type, crate::adapters::IssueType::Task);
    }

    #[tokio::test]
    async fn test_hold_and_list() {
        let temp = TempDir::new().unwrap();
        let queue = ReviewQueue::new(temp.path().join("reviews.json"));

        let ids = queue
            .hold(&meta(), &[story("A"), story("B")], &[action("Send deck")])
            .await
            .unwrap();
        assert_eq!(ids.len(), 3);
        assert_ne!(ids[0], ids[1]);

        let pending = queue.list().await.unwrap();
        assert_eq!(pending.len(), 3);
        assert_eq!(pending[0].item.summary(), "A");
        assert_eq!(pending[0].meeting_title, "Backlog Grooming");
        assert_eq!(pending[2].item.kind(), "TASK");
        assert_eq!(pending[2].item.summary(), "Send deck");
    }

    #[tokio::test]
    async fn test_hold_nothing_writes_nothing() {
        let temp = TempDir::new().unwrap();
        let queue = ReviewQueue::new(temp.path().join("reviews.json"));
        assert!(queue.hold(&meta(), &[], &[]).await.unwrap().is_empty());
        assert!(!queue.path().exists());
    }

    #[tokio::test]
    async fn test_discard() {
        let temp = TempDir::new().unwrap();
        let queue = ReviewQueue::new(temp.path().join("reviews.json"));
        let ids = queue.hold(&meta(), &[story("A"), story("B")], &[]).await.unwrap();

        assert_eq!(queue.discard(&ids[..1]).await.unwrap(), 1);
        assert_eq!(queue.discard(&ids[..1]).await.unwrap(), 0);
        let pending = queue.list().await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, ids[1]);
    }
}
