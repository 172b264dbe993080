//! Core pipeline logic.
//!
//! This module contains:
//! - StateStore: persisted dedup ledger, poll cursor and settings
//! - Classifier: keyword scoring of meeting transcripts
//! - DueDate: hint → business-day due date
//! - Request: extraction request construction
//! - Router: response parsing and fan-out to the sinks
//! - Review: stories and actions held for manual review
//! - Approval: human approval rendezvous
//! - Pipeline: per-artifact processing
//! - Monitor: mailbox polling loop

pub mod approval;
pub mod classifier;
pub mod due_date;
pub mod monitor;
pub mod persist;
pub mod pipeline;
pub mod request;
pub mod review;
pub mod router;
pub mod state_store;

// Re-export commonly used types
pub use approval::{spawn_auto_responder, ApprovalError, ApprovalGate, ApprovalRequest};
pub use monitor::{MonitorError, MonitorState, PollSummary, SourceMonitor};
pub use persist::PersistError;
pub use pipeline::{Pipeline, PipelineReport};
pub use request::{ExtractionRequest, Template};
pub use review::{PendingItem, PostReport, ReviewError, ReviewItem, ReviewQueue};
pub use router::{BranchOutcome, ParsedResponse, ResultRouter, RouteOptions, RoutingOutcome};
pub use state_store::{Handled, MarkResult, ResetSummary, StateStore, StateStoreError, StateSummary};
