//! Domain types for the meeting pipeline.
//!
//! This module contains the core data structures:
//! - Artifact: A meeting record from the mailbox
//! - Extraction: Stories and action items parsed from a generation response
//! - Verdict: Classifier output
//! - Settings: Persisted pipeline settings

pub mod artifact;
pub mod extraction;
pub mod settings;
pub mod verdict;

// Re-export commonly used types
pub use artifact::{Artifact, ArtifactMeta};
pub use extraction::{ActionItem, ExtractionResult, StoryItem, REVIEW_LABEL};
pub use settings::{ClassifierSettings, PipelineSettings, SettingsError};
pub use verdict::{ClassificationVerdict, MeetingType};
