//! Human approval before an artifact is processed.
//!
//! The monitor task calls [`ApprovalGate::request_approval`], which
//! registers a one-shot channel for the artifact, publishes an
//! [`ApprovalRequest`] to whatever decision surface is attached, and waits
//! under a timeout. The surface answers through [`ApprovalGate::resolve`],
//! exactly once per request. No answer by the deadline means declined.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;

use crate::domain::Artifact;

/// Capacity of the request channel to the decision surface
const SURFACE_CHANNEL_CAPACITY: usize = 16;

#[derive(Debug, Error)]
pub enum ApprovalError {
    #[error("No pending approval for artifact: {0}")]
    NotFound(String),
}

/// What the decision surface is shown
#[derive(Debug, Clone)]
pub struct ApprovalRequest {
    pub artifact_id: String,
    pub subject: String,
    pub received_at: DateTime<Utc>,
    pub timeout: Duration,
}

type PendingApprovals = Arc<Mutex<HashMap<String, oneshot::Sender<bool>>>>;

/// Cross-task approval rendezvous. Cheap to clone.
#[derive(Clone)]
pub struct ApprovalGate {
    pending: PendingApprovals,
    surface: mpsc::Sender<ApprovalRequest>,
}

impl ApprovalGate {
    /// Create a gate and the receiver a decision surface reads from
    pub fn new() -> (Self, mpsc::Receiver<ApprovalRequest>) {
        let (tx, rx) = mpsc::channel(SURFACE_CHANNEL_CAPACITY);
        (
            Self {
                pending: Arc::new(Mutex::new(HashMap::new())),
                surface: tx,
            },
            rx,
        )
    }

    /// Ask for a decision and wait at most `timeout` for it
    pub async fn request_approval(&self, artifact: &Artifact, timeout: Duration) -> bool {
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            if pending.insert(artifact.id.clone(), tx).is_some() {
                tracing::warn!(artifact = %artifact.id, "Replaced an earlier pending approval");
            }
        }

        let request = ApprovalRequest {
            artifact_id: artifact.id.clone(),
            subject: artifact.subject.clone(),
            received_at: artifact.received_at,
            timeout,
        };
        // Handing the request to a busy surface counts against the same deadline
        let wait = async {
            if self.surface.send(request).await.is_err() {
                tracing::warn!(artifact = %artifact.id, "No approval surface attached, declining");
                return false;
            }
            match rx.await {
                Ok(decision) => decision,
                Err(_) => {
                    tracing::warn!(artifact = %artifact.id, "Approval channel closed, declining");
                    false
                }
            }
        };

        let approved = match tokio::time::timeout(timeout, wait).await {
            Ok(decision) => decision,
            Err(_) => {
                tracing::info!(artifact = %artifact.id, ?timeout, "Approval timed out, declining");
                false
            }
        };

        // Clean up on timeout so a late answer gets NotFound
        self.pending.lock().await.remove(&artifact.id);
        approved
    }

    /// Deliver a decision for a pending request
    pub async fn resolve(&self, artifact_id: &str, approved: bool) -> Result<(), ApprovalError> {
        let tx = {
            let mut pending = self.pending.lock().await;
            pending.remove(artifact_id)
        }
        .ok_or_else(|| ApprovalError::NotFound(artifact_id.to_string()))?;

        if tx.send(approved).is_err() {
            tracing::warn!(artifact = %artifact_id, "Approval receiver already dropped");
        }
        Ok(())
    }

    /// Number of requests still waiting for a decision
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }
}

/// Answer every request with the same decision (for unattended runs)
pub fn spawn_auto_responder(
    gate: ApprovalGate,
    mut requests: mpsc::Receiver<ApprovalRequest>,
    approve: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(request) = requests.recv().await {
            tracing::info!(
                artifact = %request.artifact_id,
                subject = %request.subject,
                approve,
                "Auto-deciding approval"
            );
            if let Err(e) = gate.resolve(&request.artifact_id, approve).await {
                tracing::warn!("Auto decision not delivered: {}", e);
            }
        }
    })
}
