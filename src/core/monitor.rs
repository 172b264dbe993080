//! Mailbox polling loop.
//!
//! The monitor owns one background task. Each poll lists the newest items in
//! the configured folder, drops the ones already handled or not matching the
//! subject pattern, and walks the rest newest first:
//!
//! ```text
//! candidate → approval gate ─ approved → pipeline → mark processed
//!                           └ declined / timed out → mark ignored
//! ```
//!
//! Settings are re-read from the state document at every poll, so edits made
//! from another process take effect on the next cycle.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use super::approval::ApprovalGate;
use super::pipeline::{Pipeline, PipelineReport};
use super::state_store::{MarkResult, StateStore, StateStoreError};
use crate::adapters::{AdapterError, Mailbox};
use crate::domain::{Artifact, PipelineSettings};

/// Granularity of interruptible sleeps
const SLEEP_SLICE: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("Monitor is already running")]
    AlreadyRunning,

    #[error("Monitor failed to start: {0}")]
    StartupFailure(#[source] AdapterError),

    #[error("Mailbox error: {0}")]
    Mailbox(#[from] AdapterError),

    #[error("State error: {0}")]
    State(#[from] StateStoreError),

    #[error("Monitor task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Stopped,
    Running,
}

/// Counters for one poll
#[derive(Debug, Clone, Default)]
pub struct PollSummary {
    /// Items returned by the mailbox
    pub listed: usize,
    /// Subject did not match the pattern
    pub unmatched: usize,
    /// Already processed or ignored
    pub already_handled: usize,
    pub processed: usize,
    pub ignored: usize,
    pub errors: usize,
}

impl PollSummary {
    /// Items presented for approval
    pub fn presented(&self) -> usize {
        self.processed + self.ignored
    }
}

struct MonitorInner {
    mailbox: Arc<dyn Mailbox>,
    state: Arc<StateStore>,
    gate: ApprovalGate,
    pipeline: Arc<Pipeline>,
    running: AtomicBool,
}

/// Polls the mailbox on a background task until stopped
pub struct SourceMonitor {
    inner: Arc<MonitorInner>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SourceMonitor {
    pub fn new(
        mailbox: Arc<dyn Mailbox>,
        state: Arc<StateStore>,
        gate: ApprovalGate,
        pipeline: Arc<Pipeline>,
    ) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                mailbox,
                state,
                gate,
                pipeline,
                running: AtomicBool::new(false),
            }),
            task: Mutex::new(None),
        }
    }

    pub fn state(&self) -> MonitorState {
        if self.inner.is_running() {
            MonitorState::Running
        } else {
            MonitorState::Stopped
        }
    }

    /// Validate the folder and start polling.
    ///
    /// Nothing is written to the state document unless the folder check
    /// passes.
    pub async fn start(&self) -> Result<(), MonitorError> {
        if self
            .inner
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(MonitorError::AlreadyRunning);
        }

        if let Err(e) = self.prepare().await {
            self.inner.running.store(false, Ordering::SeqCst);
            return Err(e);
        }

        let inner = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move { inner.run().await });
        *self.task.lock().await = Some(handle);

        tracing::info!(mailbox = self.inner.mailbox.name(), "Monitor started");
        Ok(())
    }

    async fn prepare(&self) -> Result<(), MonitorError> {
        self.inner.state.refresh().await?;
        let settings = self.inner.state.settings().await;

        self.inner
            .mailbox
            .ensure_folder(&settings.folder)
            .await
            .map_err(MonitorError::StartupFailure)?;

        if self.inner.state.cursor().await.is_none() {
            self.inner.state.set_cursor(Utc::now()).await?;
        }
        Ok(())
    }

    /// Stop polling and wait for the task to finish its current item
    pub async fn stop(&self) -> Result<(), MonitorError> {
        self.inner.running.store(false, Ordering::SeqCst);

        let handle = self.task.lock().await.take();
        if let Some(handle) = handle {
            handle.await?;
            tracing::info!("Monitor stopped");
        }
        Ok(())
    }

    /// Run a single poll on the caller's task. Item delays only apply
    /// while the background loop is running.
    pub async fn poll_once(&self) -> Result<PollSummary, MonitorError> {
        self.inner.poll(false).await
    }
}

impl MonitorInner {
    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn run(&self) {
        while self.is_running() {
            match self.poll(true).await {
                Ok(summary) => tracing::info!(
                    listed = summary.listed,
                    processed = summary.processed,
                    ignored = summary.ignored,
                    errors = summary.errors,
                    "Poll complete"
                ),
                Err(e) => tracing::error!("Poll failed: {}", e),
            }

            let interval = self.state.settings().await.poll_interval_secs;
            self.pause(Duration::from_secs(interval)).await;
        }
    }

    /// One pass over the folder. With `interruptible`, stops between items
    /// once the running flag is cleared.
    async fn poll(&self, interruptible: bool) -> Result<PollSummary, MonitorError> {
        self.state.refresh().await?;
        let settings = self.state.settings().await;

        let mut listed = self
            .mailbox
            .list_recent(&settings.folder, settings.window)
            .await?;
        // Newest first, whatever order the mailbox returned
        listed.sort_by(|a, b| b.received_at.cmp(&a.received_at));

        let mut summary = PollSummary {
            listed: listed.len(),
            ..PollSummary::default()
        };

        let window_full = listed.len() >= settings.window;
        let oldest_id = listed.last().map(|a| a.id.clone());

        let mut candidates = Vec::new();
        for artifact in listed {
            if !artifact.matches_subject(&settings.subject_pattern) {
                summary.unmatched += 1;
            } else if self.state.is_handled(&artifact.id).await {
                summary.already_handled += 1;
            } else {
                candidates.push(artifact);
            }
        }

        if window_full {
            if let Some(oldest) = oldest_id.filter(|id| candidates.iter().any(|a| &a.id == id)) {
                tracing::warn!(
                    window = settings.window,
                    oldest = %oldest,
                    "Listing window is full of unhandled items; older items may be out of reach"
                );
            }
        }

        for artifact in candidates {
            if interruptible && !self.is_running() {
                break;
            }

            self.handle(artifact, &settings, &mut summary).await;

            // Every handled item is followed by the delay, the last one included
            if interruptible && settings.item_delay_secs > 0 {
                self.pause(Duration::from_secs(settings.item_delay_secs)).await;
            }
        }

        self.state.set_cursor(Utc::now()).await?;
        Ok(summary)
    }

    async fn handle(
        &self,
        mut artifact: Artifact,
        settings: &PipelineSettings,
        summary: &mut PollSummary,
    ) {
        let timeout = Duration::from_secs(settings.approval_timeout_secs);
        tracing::info!(artifact = %artifact.id, subject = %artifact.subject, "Requesting approval");

        if !self.gate.request_approval(&artifact, timeout).await {
            tracing::info!(artifact = %artifact.id, "Declined");
            match self.state.mark_ignored(&artifact.id).await {
                Ok(_) => summary.ignored += 1,
                Err(e) => {
                    tracing::error!(artifact = %artifact.id, "Failed to record decline: {}", e);
                    summary.errors += 1;
                }
            }
            return;
        }

        if artifact.body.is_empty() {
            match self.mailbox.get_body(&artifact.id).await {
                Ok(body) => artifact.body = body,
                Err(e) => tracing::warn!(artifact = %artifact.id, "Failed to fetch body: {}", e),
            }
        }

        let report = self.pipeline.process(&artifact, settings).await;
        if matches!(report, PipelineReport::GenerationFailed { .. }) {
            summary.errors += 1;
        }

        // Approved items are never re-presented, whatever the pipeline reported
        match self.state.mark_processed(&artifact.id).await {
            Ok(MarkResult::Rejected(_)) => summary.errors += 1,
            Ok(_) => summary.processed += 1,
            Err(e) => {
                tracing::error!(artifact = %artifact.id, "Failed to record processing: {}", e);
                summary.errors += 1;
            }
        }
    }

    /// Sleep for `total` in short slices, returning early when stopped
    async fn pause(&self, total: Duration) {
        let mut remaining = total;
        while !remaining.is_zero() && self.is_running() {
            let slice = remaining.min(SLEEP_SLICE);
            tokio::time::sleep(slice).await;
            remaining = remaining.saturating_sub(slice);
        }
    }
}
