//! Routing Integration Tests
//!
//! Tests for fan-out of generation responses to tasks, the review queue and
//! the chat notifier, and for filing reviewed items.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use minutes::adapters::{
    AdapterError, ChatNotifier, IssuePayload, IssueTracker, IssueType, TaskPriority, TaskRequest,
    TaskSink,
};
use minutes::core::{
    BranchOutcome, ParsedResponse, ResultRouter, ReviewError, ReviewItem, ReviewQueue, RouteOptions,
};
use minutes::domain::{ArtifactMeta, REVIEW_LABEL};
use tempfile::TempDir;

/// Task sink that records tasks and rejects titles containing "fail"
#[derive(Default)]
struct RecordingTasks {
    created: Mutex<Vec<TaskRequest>>,
}

#[async_trait]
impl TaskSink for RecordingTasks {
    fn name(&self) -> &str {
        "recording"
    }

    async fn create_task(&self, task: &TaskRequest) -> Result<String, AdapterError> {
        if task.title.to_lowercase().contains("fail") {
            return Err(AdapterError::Rejected {
                service: "tasks",
                status: 500,
                body: "boom".to_string(),
            });
        }
        let mut created = self.created.lock().unwrap();
        created.push(task.clone());
        Ok(format!("task-{}", created.len()))
    }
}

#[derive(Default)]
struct RecordingNotifier {
    sent: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl ChatNotifier for RecordingNotifier {
    fn name(&self) -> &str {
        "recording"
    }

    async fn notify(&self, recipient: &str, markdown: &str) -> Result<(), AdapterError> {
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), markdown.to_string()));
        Ok(())
    }
}

/// Tracker that fails stories whose summary contains "flaky"
#[derive(Default)]
struct RecordingTracker {
    filed: Mutex<Vec<IssuePayload>>,
}

#[async_trait]
impl IssueTracker for RecordingTracker {
    fn name(&self) -> &str {
        "recording"
    }

    async fn create_issue(&self, issue: &IssuePayload) -> Result<String, AdapterError> {
        if issue.summary.contains("flaky") {
            return Err(AdapterError::Transport("timed out".to_string()));
        }
        let mut filed = self.filed.lock().unwrap();
        filed.push(issue.clone());
        Ok(format!("{}-{}", issue.project_key, 100 + filed.len()))
    }
}

struct Fixture {
    _temp: TempDir,
    tasks: Arc<RecordingTasks>,
    notifier: Arc<RecordingNotifier>,
    reviews: Arc<ReviewQueue>,
    router: ResultRouter,
}

fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let tasks = Arc::new(RecordingTasks::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let reviews = Arc::new(ReviewQueue::new(temp.path().join("reviews.json")));
    let router = ResultRouter::new(
        Some(tasks.clone() as Arc<dyn TaskSink>),
        reviews.clone(),
        Some(notifier.clone() as Arc<dyn ChatNotifier>),
    );
    Fixture {
        _temp: temp,
        tasks,
        notifier,
        reviews,
        router,
    }
}

fn meta() -> ArtifactMeta {
    ArtifactMeta {
        artifact_id: "m1".to_string(),
        title: "Sprint Planning".to_string(),
        received_at: Utc::now(),
        recording_link: None,
    }
}

fn options() -> RouteOptions {
    RouteOptions {
        create_tasks: true,
        notify: true,
        recipient: Some("dana@example.com".to_string()),
        task_category: "Webex Recording".to_string(),
    }
}

/// Monday
fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

#[tokio::test]
async fn test_fenced_response_routes_all_branches() {
    let f = fixture();
    let raw = r#"Here is the analysis:
```json
{
  "stories": [{"summary": "CSV export", "labels": ["backend"], "estimate_points": 5}],
  "actions": [
    {"title": "URGENT: rotate keys", "owner": "Lee", "due_date_hint": "tomorrow"},
    {"title": "Book a room", "due_date_hint": "next week"}
  ]
}
```"#;

    let outcome = f.router.route_at(raw, &meta(), &options(), today()).await;

    assert!(matches!(outcome.parsed, ParsedResponse::Structured(_)));
    assert_eq!(outcome.tasks, BranchOutcome::Delivered { count: 2 });
    // One story and two actions held for review
    assert_eq!(outcome.reviews, BranchOutcome::Delivered { count: 3 });
    assert_eq!(outcome.notification, BranchOutcome::Delivered { count: 1 });

    let tasks = f.tasks.created.lock().unwrap();
    assert_eq!(tasks[0].priority, TaskPriority::High);
    assert_eq!(tasks[0].due_date, NaiveDate::from_ymd_opt(2024, 1, 2).unwrap());
    assert_eq!(tasks[1].priority, TaskPriority::Normal);
    assert_eq!(tasks[1].due_date, NaiveDate::from_ymd_opt(2024, 1, 8).unwrap());

    let held = f.reviews.list().await.unwrap();
    assert_eq!(held.len(), 3);
    let ReviewItem::Story(story) = &held[0].item else {
        panic!("stories are held first");
    };
    assert_eq!(story.labels, vec![REVIEW_LABEL, "backend"]);
    assert_eq!(held[0].meeting_title, "Sprint Planning");
    assert!(matches!(held[1].item, ReviewItem::Action(_)));

    let sent = f.notifier.sent.lock().unwrap();
    assert_eq!(sent[0].0, "dana@example.com");
    assert!(sent[0].1.contains("# Meeting Analysis: Sprint Planning"));
    assert!(sent[0].1.contains("URGENT: rotate keys"));
}

#[tokio::test]
async fn test_failing_task_does_not_stop_others_or_notifier() {
    let f = fixture();
    let raw = r#"{"actions": [
        {"title": "This will fail"},
        {"title": "Send the deck"},
        {"title": "Share notes"}
    ]}"#;

    let outcome = f.router.route_at(raw, &meta(), &options(), today()).await;

    assert_eq!(
        outcome.tasks,
        BranchOutcome::Partial {
            delivered: 2,
            failed: 1
        }
    );
    assert!(outcome.tasks.is_failure());
    assert_eq!(outcome.notification, BranchOutcome::Delivered { count: 1 });
    assert_eq!(outcome.reviews, BranchOutcome::Delivered { count: 3 });

    // Default due date: ten business days
    let tasks = f.tasks.created.lock().unwrap();
    assert_eq!(tasks[0].due_date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
}

#[tokio::test]
async fn test_garbage_response_sends_fallback_only() {
    let f = fixture();
    let outcome = f
        .router
        .route_at("I could not find any items, sorry.", &meta(), &options(), today())
        .await;

    assert!(matches!(outcome.parsed, ParsedResponse::Unstructured(_)));
    assert!(matches!(outcome.tasks, BranchOutcome::Skipped { .. }));
    assert!(matches!(outcome.reviews, BranchOutcome::Skipped { .. }));
    assert_eq!(outcome.notification, BranchOutcome::Delivered { count: 1 });

    let sent = f.notifier.sent.lock().unwrap();
    assert!(sent[0].1.contains("I could not find any items, sorry."));
    assert!(f.tasks.created.lock().unwrap().is_empty());
    assert!(f.reviews.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_switches_and_missing_recipient_skip_branches() {
    let f = fixture();
    let raw = r#"{"actions": [{"title": "Send the deck"}]}"#;
    let opts = RouteOptions {
        create_tasks: false,
        recipient: None,
        ..options()
    };

    let outcome = f.router.route_at(raw, &meta(), &opts, today()).await;

    assert!(matches!(outcome.tasks, BranchOutcome::Skipped { .. }));
    assert!(matches!(outcome.notification, BranchOutcome::Skipped { .. }));
    assert!(f.tasks.created.lock().unwrap().is_empty());
    assert!(f.notifier.sent.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_post_files_stories_and_keeps_failures() {
    let f = fixture();
    let raw = r#"{"stories": [
        {"summary": "CSV export", "acceptance_criteria": ["Header row present"]},
        {"summary": "flaky importer fix"}
    ]}"#;
    f.router.route_at(raw, &meta(), &options(), today()).await;

    let held = f.reviews.list().await.unwrap();
    let ids: Vec<String> = held.iter().map(|p| p.id.clone()).collect();
    assert_eq!(ids.len(), 2);

    let tracker = Arc::new(RecordingTracker::default());
    let report = f.reviews.post(&ids, tracker.clone(), "PLAT").await.unwrap();

    assert_eq!(report.created.len(), 1);
    assert_eq!(report.created[0].1, "PLAT-101");
    assert_eq!(report.failed.len(), 1);

    let filed = tracker.filed.lock().unwrap();
    assert_eq!(filed[0].issue_type, IssueType::Story);
    assert_eq!(filed[0].labels[0], REVIEW_LABEL);
    assert!(filed[0].description.contains("Header row present"));
    drop(filed);

    // The failed story stays queued for another attempt
    let remaining = f.reviews.list().await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].item.summary(), "flaky importer fix");
}

#[tokio::test]
async fn test_empty_result_reaches_no_sink() {
    let f = fixture();
    let outcome = f
        .router
        .route_at(r#"{"stories": [], "actions": []}"#, &meta(), &options(), today())
        .await;

    assert!(matches!(outcome.parsed, ParsedResponse::Structured(_)));
    assert!(matches!(outcome.tasks, BranchOutcome::Skipped { .. }));
    assert!(matches!(outcome.reviews, BranchOutcome::Skipped { .. }));
    assert!(matches!(outcome.notification, BranchOutcome::Skipped { .. }));

    assert!(f.tasks.created.lock().unwrap().is_empty());
    assert!(f.notifier.sent.lock().unwrap().is_empty());
    assert!(!f.reviews.path().exists());
}

#[tokio::test]
async fn test_malformed_story_does_not_block_valid_action() {
    let f = fixture();
    let raw = r#"{
        "actions": [{"title": "Send deck", "owner": "Lee"}],
        "stories": [
            {"summary": "CSV export", "estimate_points": "5"},
            {"summary": null, "labels": "backend"}
        ]
    }"#;

    let outcome = f.router.route_at(raw, &meta(), &options(), today()).await;

    assert!(matches!(outcome.parsed, ParsedResponse::Structured(_)));
    assert_eq!(outcome.tasks, BranchOutcome::Delivered { count: 1 });
    assert_eq!(f.tasks.created.lock().unwrap()[0].title, "Send deck");

    let held = f.reviews.list().await.unwrap();
    assert_eq!(held.len(), 2);
    let ReviewItem::Story(story) = &held[0].item else {
        panic!("expected the surviving story first");
    };
    assert_eq!(story.summary, "CSV export");
    assert_eq!(story.estimate_points, Some(5));
}

#[tokio::test]
async fn test_post_action_files_task_issue() {
    let f = fixture();
    f.router
        .route_at(
            r#"{"actions": [{"title": "Rotate keys", "owner": "Lee"}]}"#,
            &meta(),
            &options(),
            today(),
        )
        .await;

    let held = f.reviews.list().await.unwrap();
    assert_eq!(held.len(), 1);
    assert_eq!(held[0].item.kind(), "TASK");

    let tracker = Arc::new(RecordingTracker::default());
    let report = f
        .reviews
        .post(&[held[0].id.clone()], tracker.clone(), "PLAT")
        .await
        .unwrap();
    assert_eq!(report.created.len(), 1);

    let filed = tracker.filed.lock().unwrap();
    assert_eq!(filed[0].issue_type, IssueType::Task);
    assert_eq!(filed[0].summary, "Rotate keys");
    assert!(filed[0].description.contains("Owner: Lee"));
    drop(filed);

    assert!(f.reviews.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_post_unknown_id_files_nothing() {
    let f = fixture();
    f.router
        .route_at(r#"{"stories": [{"summary": "CSV export"}]}"#, &meta(), &options(), today())
        .await;

    let tracker = Arc::new(RecordingTracker::default());
    let err = f
        .reviews
        .post(&["nope".to_string()], tracker.clone(), "PLAT")
        .await
        .unwrap_err();

    assert!(matches!(err, ReviewError::NotFound(_)));
    assert!(tracker.filed.lock().unwrap().is_empty());
    assert_eq!(f.reviews.list().await.unwrap().len(), 1);
}
