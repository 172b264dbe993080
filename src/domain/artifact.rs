//! Meeting artifacts supplied by the mailbox.
//!
//! An artifact is one externally supplied meeting record. It is immutable
//! once observed; everything downstream works from a borrowed reference.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One meeting record considered for processing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    /// Opaque identifier, unique within the mailbox
    pub id: String,

    /// Subject line as delivered
    pub subject: String,

    /// When the mailbox received the item
    pub received_at: DateTime<Utc>,

    /// Raw body (text, HTML or WebVTT). May be empty when the mailbox
    /// defers body retrieval to `Mailbox::get_body`.
    #[serde(default)]
    pub body: String,
}

impl Artifact {
    /// Create a new artifact
    pub fn new(
        id: impl Into<String>,
        subject: impl Into<String>,
        received_at: DateTime<Utc>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            subject: subject.into(),
            received_at,
            body: body.into(),
        }
    }

    /// Case-insensitive substring test against the configured subject pattern
    pub fn matches_subject(&self, pattern: &str) -> bool {
        if pattern.is_empty() {
            return true;
        }
        self.subject
            .to_lowercase()
            .contains(&pattern.to_lowercase())
    }
}

/// Metadata the router carries alongside a generation response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactMeta {
    /// Identifier of the source artifact
    pub artifact_id: String,

    /// Normalized meeting title
    pub title: String,

    /// When the source artifact was received
    pub received_at: DateTime<Utc>,

    /// Recording link found in the body, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recording_link: Option<String>,
}

impl ArtifactMeta {
    /// Build metadata from an artifact and its normalized title
    pub fn from_artifact(artifact: &Artifact, title: impl Into<String>) -> Self {
        Self {
            artifact_id: artifact.id.clone(),
            title: title.into(),
            received_at: artifact.received_at,
            recording_link: None,
        }
    }

    /// Attach a recording link
    pub fn with_recording_link(mut self, link: Option<String>) -> Self {
        self.recording_link = link;
        self
    }
}
