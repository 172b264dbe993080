//! Local task sink: appends tasks to a JSONL file.
//!
//! Each line is one created task with its id and creation time. Appends
//! hold an exclusive file lock so several processes can share the file.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{AdapterError, TaskRequest, TaskSink};

/// One line of the tasks file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub created_at: DateTime<Utc>,
    #[serde(flatten)]
    pub task: TaskRequest,
}

/// JSONL-backed task sink
pub struct JsonlTaskSink {
    path: PathBuf,
}

impl JsonlTaskSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All tasks recorded so far, in creation order
    pub async fn read_all(&self) -> Result<Vec<TaskRecord>, AdapterError> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || read_records(&path))
            .await?
    }
}

#[async_trait]
impl TaskSink for JsonlTaskSink {
    fn name(&self) -> &str {
        "tasks-file"
    }

    async fn create_task(&self, task: &TaskRequest) -> Result<String, AdapterError> {
        let record = TaskRecord {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            task: task.clone(),
        };
        let id = record.id.clone();
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || append_record(&path, &record))
            .await??;

        Ok(id)
    }
}

fn append_record(path: &Path, record: &TaskRecord) -> Result<(), AdapterError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.lock_exclusive()?;

    let json = serde_json::to_string(record)?;
    writeln!(file, "{}", json)?;
    file.flush()?;

    // Lock is released when file is dropped
    Ok(())
}

fn read_records(path: &Path) -> Result<Vec<TaskRecord>, AdapterError> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let mut records = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str(&line) {
            Ok(record) => records.push(record),
            Err(e) => tracing::warn!("Skipping malformed task line: {}", e),
        }
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::TaskPriority;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn task(title: &str) -> TaskRequest {
        TaskRequest {
            title: title.to_string(),
            description: "From meeting: Standup".to_string(),
            due_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            category: "Webex Recording".to_string(),
            priority: TaskPriority::Normal,
        }
    }

    #[tokio::test]
    async fn test_create_and_read_back() {
        let temp = TempDir::new().unwrap();
        let sink = JsonlTaskSink::new(temp.path().join("nested/tasks.jsonl"));

        let first = sink.create_task(&task("Send deck")).await.unwrap();
        let second = sink.create_task(&task("Book room")).await.unwrap();
        assert_ne!(first, second);

        let records = sink.read_all().await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, first);
        assert_eq!(records[1].task.title, "Book room");
    }

    #[tokio::test]
    async fn test_missing_file_reads_empty() {
        let temp = TempDir::new().unwrap();
        let sink = JsonlTaskSink::new(temp.path().join("tasks.jsonl"));
        assert!(sink.read_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_line_skipped() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("tasks.jsonl");
        let sink = JsonlTaskSink::new(&path);
        sink.create_task(&task("Send deck")).await.unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"not json\n")
            .unwrap();

        assert_eq!(sink.read_all().await.unwrap().len(), 1);
    }
}
