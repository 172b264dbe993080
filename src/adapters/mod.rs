//! Adapter interfaces for external systems.
//!
//! The pipeline talks to six collaborators, each behind a trait:
//! - `Mailbox`: supplies candidate meeting artifacts
//! - `TranscriptSource`: looks up transcripts the mail only links to
//! - `Generator`: the text-generation service
//! - `TaskSink`: receives action items
//! - `IssueTracker`: receives reviewed stories
//! - `ChatNotifier`: receives the meeting digest
//!
//! One concrete implementation of each ships with the crate.

pub mod generator;
pub mod jira;
pub mod mailbox;
pub mod recordings;
pub mod tasks;
pub mod webex;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::request::ExtractionRequest;
use crate::domain::{ActionItem, Artifact, StoryItem, REVIEW_LABEL};

pub use generator::ChatCompletionsGenerator;
pub use jira::JiraTracker;
pub use mailbox::DirectoryMailbox;
pub use recordings::WebexRecordings;
pub use tasks::JsonlTaskSink;
pub use webex::WebexNotifier;

/// Maximum issue summary length
pub const MAX_SUMMARY_CHARS: usize = 255;

/// Maximum issue description length
pub const MAX_DESCRIPTION_CHARS: usize = 32_000;

/// Maximum chat message length
pub const MAX_MESSAGE_CHARS: usize = 7_439;

/// Title words that raise task priority
pub const URGENT_KEYWORDS: &[&str] = &["urgent", "asap", "immediately", "critical"];

/// Errors from any collaborator
#[derive(Debug, Error)]
pub enum AdapterError {
    /// A credential or required setting is absent; the branch is skipped
    #[error("Configuration missing: {0}")]
    ConfigurationMissing(String),

    /// Network failure or timeout
    #[error("Transport error: {0}")]
    Transport(String),

    /// The remote answered but refused the request
    #[error("{service} rejected request ({status}): {body}")]
    Rejected {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// The remote answered with something we could not read
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl AdapterError {
    pub fn is_configuration(&self) -> bool {
        matches!(self, AdapterError::ConfigurationMissing(_))
    }
}

impl From<reqwest::Error> for AdapterError {
    fn from(e: reqwest::Error) -> Self {
        AdapterError::Transport(e.to_string())
    }
}

/// Source of meeting artifacts
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Fail unless `folder` exists and is reachable
    async fn ensure_folder(&self, folder: &str) -> Result<(), AdapterError>;

    /// Up to `limit` most recent items in `folder`, newest first
    async fn list_recent(&self, folder: &str, limit: usize) -> Result<Vec<Artifact>, AdapterError>;

    /// Full body of one item
    async fn get_body(&self, id: &str) -> Result<String, AdapterError>;
}

/// What is known about a meeting whose transcript is not in the mail
#[derive(Debug, Clone, PartialEq)]
pub struct TranscriptLookup {
    /// Normalized meeting title
    pub title: String,
    /// Meeting id or key found in the mail, if any
    pub meeting_id: Option<String>,
}

/// Remote store of meeting transcripts
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    fn name(&self) -> &str;

    /// Transcript text for the meeting, or `None` when no recording matches
    async fn fetch_transcript(
        &self,
        lookup: &TranscriptLookup,
    ) -> Result<Option<String>, AdapterError>;
}

/// Text-generation service
#[async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;

    /// Run one extraction request and return the raw response text
    async fn generate(&self, request: &ExtractionRequest) -> Result<String, AdapterError>;
}

/// Receives action items as tasks
#[async_trait]
pub trait TaskSink: Send + Sync {
    fn name(&self) -> &str;

    /// Create a task; returns the sink's identifier for it
    async fn create_task(&self, task: &TaskRequest) -> Result<String, AdapterError>;
}

/// Receives reviewed stories as issues
#[async_trait]
pub trait IssueTracker: Send + Sync {
    fn name(&self) -> &str;

    /// Create an issue; returns the tracker's issue key
    async fn create_issue(&self, issue: &IssuePayload) -> Result<String, AdapterError>;
}

/// Receives the human-readable meeting digest
#[async_trait]
pub trait ChatNotifier: Send + Sync {
    fn name(&self) -> &str;

    async fn notify(&self, recipient: &str, markdown: &str) -> Result<(), AdapterError>;
}

// ============================================================================
// Payloads
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    Normal,
    High,
}

/// One task handed to the task sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRequest {
    pub title: String,
    pub description: String,
    pub due_date: NaiveDate,
    pub category: String,
    pub priority: TaskPriority,
}

impl TaskRequest {
    /// Build a task from an action item
    pub fn from_action(
        action: &ActionItem,
        meeting_title: &str,
        due_date: NaiveDate,
        category: &str,
    ) -> Self {
        let mut description = format!("From meeting: {}", meeting_title);
        if !action.description.is_empty() {
            description.push_str("\n\n");
            description.push_str(&action.description);
        }
        if let Some(owner) = &action.owner {
            description.push_str(&format!("\n\nOwner: {}", owner));
        }
        if let Some(decision) = &action.related_decision {
            description.push_str(&format!("\nRelated decision: {}", decision));
        }

        Self {
            title: action.title.clone(),
            description,
            due_date,
            category: category.to_string(),
            priority: priority_for(&action.title),
        }
    }
}

/// High priority when the title carries an urgency keyword
pub fn priority_for(title: &str) -> TaskPriority {
    let lower = title.to_lowercase();
    if URGENT_KEYWORDS.iter().any(|k| lower.contains(k)) {
        TaskPriority::High
    } else {
        TaskPriority::Normal
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IssueType {
    Story,
    Task,
}

impl IssueType {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::Story => "Story",
            IssueType::Task => "Task",
        }
    }
}

/// One issue handed to the tracker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IssuePayload {
    pub project_key: String,
    pub summary: String,
    pub description: String,
    pub issue_type: IssueType,
    #[serde(default)]
    pub labels: Vec<String>,
    /// Acceptance criteria, also rendered into the description
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
}

impl IssuePayload {
    /// Build a story issue
    pub fn from_story(project_key: &str, story: &StoryItem, meeting_title: &str) -> Self {
        let mut description = story.description.clone();
        if !story.acceptance_criteria.is_empty() {
            description.push_str("\n\nAcceptance criteria:\n");
            for criterion in &story.acceptance_criteria {
                description.push_str(&format!("- {}\n", criterion));
            }
        }
        if let Some(points) = story.estimate_points {
            description.push_str(&format!("\nEstimate: {} points", points));
        }
        if !story.assignees.is_empty() {
            description.push_str(&format!("\nSuggested assignees: {}", story.assignees.join(", ")));
        }
        description.push_str(&format!("\n\nFrom meeting: {}", meeting_title));

        Self {
            project_key: project_key.to_string(),
            summary: truncate_chars(&story.summary, MAX_SUMMARY_CHARS),
            description: truncate_chars(&description, MAX_DESCRIPTION_CHARS),
            issue_type: IssueType::Story,
            labels: story.labels.clone(),
            acceptance_criteria: story.acceptance_criteria.clone(),
        }
    }

    /// Build a task issue from an action item
    pub fn from_action(project_key: &str, action: &ActionItem, meeting_title: &str) -> Self {
        let mut description = action.description.clone();
        if let Some(owner) = &action.owner {
            description.push_str(&format!("\n\nOwner: {}", owner));
        }
        if let Some(hint) = &action.due_date_hint {
            description.push_str(&format!("\nDue: {}", hint));
        }
        description.push_str(&format!("\n\nFrom meeting: {}", meeting_title));

        Self {
            project_key: project_key.to_string(),
            summary: truncate_chars(&action.title, MAX_SUMMARY_CHARS),
            description: truncate_chars(description.trim_start(), MAX_DESCRIPTION_CHARS),
            issue_type: IssueType::Task,
            labels: vec![REVIEW_LABEL.to_string()],
            acceptance_criteria: Vec::new(),
        }
    }
}

/// Truncate to at most `max` characters on a char boundary
pub fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn action(title: &str) -> ActionItem {
        ActionItem {
            title: title.to_string(),
            description: "Send the deck to security".to_string(),
            owner: Some("Dana".to_string()),
            due_date_hint: Some("next week".to_string()),
            related_decision: Some("Ship in March".to_string()),
        }
    }

    #[test]
    fn test_priority_keywords() {
        assert_eq!(priority_for("URGENT: fix login"), TaskPriority::High);
        assert_eq!(priority_for("Critical path review"), TaskPriority::High);
        assert_eq!(priority_for("Book a room"), TaskPriority::Normal);
    }

    #[test]
    fn test_task_from_action() {
        let due = NaiveDate::from_ymd_opt(2024, 1, 8).unwrap();
        let task =
            TaskRequest::from_action(&action("Share deck asap"), "Standup", due, "Webex Recording");
        assert_eq!(task.priority, TaskPriority::High);
        assert!(task.description.starts_with("From meeting: Standup"));
        assert!(task.description.contains("Owner: Dana"));
        assert!(task.description.contains("Related decision: Ship in March"));
        assert_eq!(task.category, "Webex Recording");
    }

    #[test]
    fn test_issue_from_story_truncates() {
        let story = StoryItem {
            summary: "x".repeat(300),
            description: "d".repeat(40_000),
            acceptance_criteria: vec!["works".to_string()],
            estimate_points: Some(5),
            assignees: vec![],
            labels: vec!["AIGen-ReviewRqd".to_string()],
        };
        let issue = IssuePayload::from_story("PROJ", &story, "Grooming");
        assert_eq!(issue.summary.chars().count(), MAX_SUMMARY_CHARS);
        assert_eq!(issue.description.chars().count(), MAX_DESCRIPTION_CHARS);
        assert_eq!(issue.issue_type, IssueType::Story);
        assert_eq!(issue.labels[0], "AIGen-ReviewRqd");
    }

    #[test]
    fn test_issue_from_action_is_task() {
        let issue = IssuePayload::from_action("PROJ", &action("Share deck"), "Standup");
        assert_eq!(issue.issue_type, IssueType::Task);
        assert!(issue.description.contains("Due: next week"));
        assert_eq!(issue.labels, vec![REVIEW_LABEL.to_string()]);
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("abc", 10), "abc");
        assert_eq!(truncate_chars("", 3), "");
    }
}
