//! minutes - Meeting transcript intake, classification and routing
//!
//! Watches a mailbox folder for meeting-recording notifications, asks a
//! human to approve each one, and turns approved transcripts into tasks,
//! review-held stories and actions, and a chat digest.
//!
//! # Architecture
//!
//! ```text
//! Mailbox → SourceMonitor → ApprovalGate → Pipeline
//!                                            ├─ TranscriptSource (linked recordings)
//!                                            ├─ Classifier
//!                                            ├─ ExtractionRequest → Generator
//!                                            └─ ResultRouter ─┬─ TaskSink
//!                                                             ├─ ReviewQueue → IssueTracker
//!                                                             └─ ChatNotifier
//! ```
//!
//! Every artifact the monitor presents ends up in exactly one of the
//! processed or ignored sets of the [`StateStore`], so it is never presented
//! twice.
//!
//! # Modules
//!
//! - `adapters`: External system integrations (mailbox, generator, Jira, Webex, recordings)
//! - `core`: Pipeline logic (StateStore, Classifier, Router, Monitor)
//! - `domain`: Data structures (Artifact, ExtractionResult, settings)
//! - `ingest`: Transcript derivation from mail bodies
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Watch the mailbox, approving on the terminal
//! minutes watch
//!
//! # Try the classifier on a saved transcript
//! minutes classify standup.vtt
//!
//! # File reviewed items as Jira issues
//! minutes review post 3f9a1c2b
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod ingest;

// Re-export main types at crate root for convenience
pub use core::{ApprovalGate, Pipeline, ResultRouter, ReviewQueue, SourceMonitor, StateStore};
pub use domain::{
    ActionItem, Artifact, ClassificationVerdict, ExtractionResult, MeetingType, PipelineSettings,
    StoryItem,
};
