//! Parse a generation response and fan its items out to the sinks.
//!
//! Three branches run side by side and are collected afterwards:
//! - actions → task sink (one submission per item)
//! - stories and actions → review queue (filed later by an operator)
//! - digest → chat notifier
//!
//! A failing branch is logged and reported in its own `BranchOutcome`; it
//! never affects the other branches or the caller.

use std::sync::{Arc, OnceLock};

use chrono::{Local, NaiveDate, Utc};
use regex::Regex;
use serde::Serialize;

use super::due_date;
use super::review::ReviewQueue;
use crate::adapters::{truncate_chars, ChatNotifier, TaskRequest, TaskSink, MAX_MESSAGE_CHARS};
use crate::domain::{ArtifactMeta, ExtractionResult, PipelineSettings};

/// Longest action description shown in the digest
const DIGEST_DESCRIPTION_CHARS: usize = 100;

/// How the raw response was interpreted
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedResponse {
    /// A JSON object with (possibly empty) item lists
    Structured(ExtractionResult),

    /// Nothing parseable; the raw text is kept for the notifier only
    Unstructured(String),
}

impl ParsedResponse {
    pub fn result(&self) -> ExtractionResult {
        match self {
            ParsedResponse::Structured(r) => r.clone(),
            ParsedResponse::Unstructured(_) => ExtractionResult::default(),
        }
    }
}

/// Result of one fan-out branch
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BranchOutcome {
    Delivered { count: usize },
    Partial { delivered: usize, failed: usize },
    Skipped { reason: String },
    Failed { error: String },
}

impl BranchOutcome {
    fn skipped(reason: impl Into<String>) -> Self {
        BranchOutcome::Skipped {
            reason: reason.into(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, BranchOutcome::Failed { .. } | BranchOutcome::Partial { .. })
    }
}

/// Everything `route` did for one artifact
#[derive(Debug, Clone)]
pub struct RoutingOutcome {
    pub parsed: ParsedResponse,
    pub tasks: BranchOutcome,
    pub reviews: BranchOutcome,
    pub notification: BranchOutcome,
}

/// Routing switches, taken from the persisted settings
#[derive(Debug, Clone)]
pub struct RouteOptions {
    pub create_tasks: bool,
    pub notify: bool,
    pub recipient: Option<String>,
    pub task_category: String,
}

impl From<&PipelineSettings> for RouteOptions {
    fn from(s: &PipelineSettings) -> Self {
        Self {
            create_tasks: s.auto_create_tasks,
            notify: s.notify,
            recipient: s.notify_recipient.clone(),
            task_category: s.task_category.clone(),
        }
    }
}

/// Fans parsed items out to the sinks
pub struct ResultRouter {
    tasks: Option<Arc<dyn TaskSink>>,
    reviews: Arc<ReviewQueue>,
    notifier: Option<Arc<dyn ChatNotifier>>,
}

impl ResultRouter {
    pub fn new(
        tasks: Option<Arc<dyn TaskSink>>,
        reviews: Arc<ReviewQueue>,
        notifier: Option<Arc<dyn ChatNotifier>>,
    ) -> Self {
        Self {
            tasks,
            reviews,
            notifier,
        }
    }

    /// Route a response, resolving due dates against today's local date
    pub async fn route(
        &self,
        raw: &str,
        meta: &ArtifactMeta,
        options: &RouteOptions,
    ) -> RoutingOutcome {
        self.route_at(raw, meta, options, Local::now().date_naive()).await
    }

    /// Route a response with an explicit reference date
    pub async fn route_at(
        &self,
        raw: &str,
        meta: &ArtifactMeta,
        options: &RouteOptions,
        today: NaiveDate,
    ) -> RoutingOutcome {
        let parsed = parse_response(raw);
        let result = parsed.result();

        if let ParsedResponse::Unstructured(_) = parsed {
            tracing::warn!(
                artifact = %meta.artifact_id,
                "Response was not valid JSON, using unstructured fallback"
            );
        }

        let (tasks, reviews, notification) = tokio::join!(
            self.route_actions(&result, meta, options, today),
            self.route_reviews(&result, meta),
            self.route_digest(&parsed, meta, options),
        );

        tracing::info!(
            artifact = %meta.artifact_id,
            stories = result.stories.len(),
            actions = result.actions.len(),
            tasks = ?tasks,
            reviews = ?reviews,
            notification = ?notification,
            "Routed extraction result"
        );

        RoutingOutcome {
            parsed,
            tasks,
            reviews,
            notification,
        }
    }

    async fn route_actions(
        &self,
        result: &ExtractionResult,
        meta: &ArtifactMeta,
        options: &RouteOptions,
        today: NaiveDate,
    ) -> BranchOutcome {
        if result.actions.is_empty() {
            return BranchOutcome::skipped("no action items");
        }
        if !options.create_tasks {
            return BranchOutcome::skipped("task creation disabled");
        }
        let Some(sink) = &self.tasks else {
            tracing::warn!(
                "No task sink configured, skipping {} action items",
                result.actions.len()
            );
            return BranchOutcome::skipped("no task sink configured");
        };

        let mut delivered = 0;
        let mut failed = 0;
        let mut last_error = None;
        for action in &result.actions {
            let due = due_date::resolve(action.due_date_hint.as_deref(), today);
            let task = TaskRequest::from_action(action, &meta.title, due, &options.task_category);
            match sink.create_task(&task).await {
                Ok(id) => {
                    tracing::debug!(task = %id, title = %task.title, due = %due, "Task created");
                    delivered += 1;
                }
                Err(e) if e.is_configuration() => {
                    tracing::warn!("Task sink {} not configured: {}", sink.name(), e);
                    return BranchOutcome::skipped(e.to_string());
                }
                Err(e) => {
                    tracing::warn!(title = %task.title, "Failed to create task: {}", e);
                    failed += 1;
                    last_error = Some(e.to_string());
                }
            }
        }

        match (delivered, failed) {
            (d, 0) => BranchOutcome::Delivered { count: d },
            (0, _) => BranchOutcome::Failed {
                error: last_error.unwrap_or_default(),
            },
            (d, f) => BranchOutcome::Partial {
                delivered: d,
                failed: f,
            },
        }
    }

    async fn route_reviews(&self, result: &ExtractionResult, meta: &ArtifactMeta) -> BranchOutcome {
        if result.is_empty() {
            return BranchOutcome::skipped("nothing to review");
        }

        let mut stories = result.stories.clone();
        for story in &mut stories {
            story.enforce_review_label();
        }

        match self.reviews.hold(meta, &stories, &result.actions).await {
            Ok(ids) => BranchOutcome::Delivered { count: ids.len() },
            Err(e) => {
                tracing::warn!("Failed to hold items for review: {}", e);
                BranchOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    async fn route_digest(
        &self,
        parsed: &ParsedResponse,
        meta: &ArtifactMeta,
        options: &RouteOptions,
    ) -> BranchOutcome {
        let markdown = match parsed {
            ParsedResponse::Structured(result) if result.is_empty() => {
                return BranchOutcome::skipped("nothing to report");
            }
            ParsedResponse::Structured(result) => render_digest(result, meta),
            ParsedResponse::Unstructured(text) if text.trim().is_empty() => {
                return BranchOutcome::skipped("nothing to report");
            }
            ParsedResponse::Unstructured(text) => render_fallback(text, meta),
        };

        if !options.notify {
            return BranchOutcome::skipped("notification disabled");
        }
        let Some(recipient) = options.recipient.as_deref() else {
            tracing::warn!("No notification recipient configured, skipping digest");
            return BranchOutcome::skipped("no recipient configured");
        };
        let Some(notifier) = &self.notifier else {
            tracing::warn!("No chat notifier configured, skipping digest");
            return BranchOutcome::skipped("no notifier configured");
        };

        match notifier.notify(recipient, &markdown).await {
            Ok(()) => BranchOutcome::Delivered { count: 1 },
            Err(e) if e.is_configuration() => {
                tracing::warn!("Notifier {} not configured: {}", notifier.name(), e);
                BranchOutcome::skipped(e.to_string())
            }
            Err(e) => {
                tracing::warn!("Failed to send digest: {}", e);
                BranchOutcome::Failed {
                    error: e.to_string(),
                }
            }
        }
    }
}

// ============================================================================
// Response parsing
// ============================================================================

fn fence_regex() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?s)```(?:json|JSON)?\s*(\{.*?\})\s*```").ok())
        .as_ref()
}

/// Interpret a raw generation response
pub fn parse_response(raw: &str) -> ParsedResponse {
    match extract_json(raw) {
        Some(value) => match serde_json::from_value::<ExtractionResult>(value) {
            Ok(result) => ParsedResponse::Structured(result),
            Err(e) => {
                tracing::debug!("JSON did not match the extraction shape: {}", e);
                ParsedResponse::Unstructured(raw.to_string())
            }
        },
        None => ParsedResponse::Unstructured(raw.to_string()),
    }
}

/// Find a JSON object in `raw`: a fenced block first, then the whole text,
/// then the outermost brace span
pub fn extract_json(raw: &str) -> Option<serde_json::Value> {
    let as_object = |s: &str| match serde_json::from_str::<serde_json::Value>(s.trim()) {
        Ok(v) if v.is_object() => Some(v),
        _ => None,
    };

    if let Some(fence) = fence_regex() {
        for caps in fence.captures_iter(raw) {
            if let Some(v) = caps.get(1).and_then(|m| as_object(m.as_str())) {
                return Some(v);
            }
        }
    }

    if let Some(v) = as_object(raw) {
        return Some(v);
    }

    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end > start {
        as_object(&raw[start..=end])
    } else {
        None
    }
}

// ============================================================================
// Digest rendering
// ============================================================================

/// Markdown digest of a structured result, capped at the chat limit
pub fn render_digest(result: &ExtractionResult, meta: &ArtifactMeta) -> String {
    let mut md = format!(
        "# Meeting Analysis: {}\n\n**Analyzed:** {}\n\n",
        meta.title,
        Utc::now().format("%Y-%m-%d %H:%M UTC")
    );

    if !result.actions.is_empty() {
        md.push_str(&format!("## Action Items ({})\n\n", result.actions.len()));
        for (i, action) in result.actions.iter().enumerate() {
            md.push_str(&format!("{}. **{}**\n", i + 1, action.title));
            if let Some(owner) = &action.owner {
                md.push_str(&format!("   - Owner: {}\n", owner));
            }
            if let Some(hint) = &action.due_date_hint {
                md.push_str(&format!("   - Due: {}\n", hint));
            }
            if !action.description.is_empty() {
                let desc = if action.description.chars().count() > DIGEST_DESCRIPTION_CHARS {
                    format!("{}...", truncate_chars(&action.description, DIGEST_DESCRIPTION_CHARS))
                } else {
                    action.description.clone()
                };
                md.push_str(&format!("   - {}\n", desc));
            }
        }
        md.push('\n');
    }

    if !result.stories.is_empty() {
        md.push_str(&format!("## User Stories ({}) - pending review\n\n", result.stories.len()));
        for (i, story) in result.stories.iter().enumerate() {
            md.push_str(&format!("{}. **{}**\n", i + 1, story.summary));
            if let Some(points) = story.estimate_points {
                md.push_str(&format!("   - Points: {}\n", points));
            }
            if !story.labels.is_empty() {
                md.push_str(&format!("   - Labels: {}\n", story.labels.join(", ")));
            }
        }
        md.push('\n');
    }

    if let Some(link) = &meta.recording_link {
        md.push_str(&format!("[View recording]({})\n", link));
    }

    truncate_chars(&md, MAX_MESSAGE_CHARS)
}

/// Digest for a response that could not be parsed
pub fn render_fallback(text: &str, meta: &ArtifactMeta) -> String {
    let md = format!(
        "# Meeting Analysis: {}\n\n_The analysis could not be structured; raw output follows._\n\n{}\n",
        meta.title,
        text.trim()
    );
    truncate_chars(&md, MAX_MESSAGE_CHARS)
}
