//! Directory-backed mailbox.
//!
//! Each folder is a directory under the mailbox root holding `.eml`
//! messages (RFC 822, as saved by most mail clients) and bare `.vtt`
//! caption files. Message ids come from the Message-ID header, or a
//! content hash when there is none.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mail_parser::{MessageParser, MimeHeaders};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;

use super::{AdapterError, Mailbox};
use crate::domain::Artifact;

/// File extensions read as mailbox items
const ITEM_EXTENSIONS: &[&str] = &["eml", "vtt"];

/// Mailbox over a local directory tree
pub struct DirectoryMailbox {
    root: PathBuf,
    /// Artifact id → file, filled by `list_recent`
    index: Mutex<HashMap<String, PathBuf>>,
}

impl DirectoryMailbox {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index: Mutex::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn folder_path(&self, folder: &str) -> PathBuf {
        self.root.join(folder)
    }
}

#[async_trait]
impl Mailbox for DirectoryMailbox {
    fn name(&self) -> &str {
        "directory"
    }

    async fn ensure_folder(&self, folder: &str) -> Result<(), AdapterError> {
        let path = self.folder_path(folder);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            _ => Err(AdapterError::FolderNotFound(path.display().to_string())),
        }
    }

    async fn list_recent(&self, folder: &str, limit: usize) -> Result<Vec<Artifact>, AdapterError> {
        self.ensure_folder(folder).await?;
        let dir = self.folder_path(folder);

        let items = tokio::task::spawn_blocking(move || scan_folder(&dir, limit)).await??;

        let mut index = self.index.lock().await;
        for (artifact, path) in &items {
            index.insert(artifact.id.clone(), path.clone());
        }

        Ok(items.into_iter().map(|(artifact, _)| artifact).collect())
    }

    async fn get_body(&self, id: &str) -> Result<String, AdapterError> {
        let path = self
            .index
            .lock()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| AdapterError::NotFound(id.to_string()))?;

        let item = tokio::task::spawn_blocking(move || read_item(&path)).await??;
        Ok(item.body)
    }
}

/// Newest `limit` items in `dir`, newest first
fn scan_folder(dir: &Path, limit: usize) -> Result<Vec<(Artifact, PathBuf)>, AdapterError> {
    let mut items = Vec::new();

    for ext in ITEM_EXTENSIONS {
        let pattern = format!("{}/*.{}", glob::Pattern::escape(&dir.to_string_lossy()), ext);
        let paths = glob::glob(&pattern)
            .map_err(|e| AdapterError::MalformedResponse(format!("bad folder pattern: {}", e)))?;

        for path in paths.flatten() {
            match read_item(&path) {
                Ok(artifact) => items.push((artifact, path)),
                Err(e) => tracing::warn!("Skipping unreadable item {}: {}", path.display(), e),
            }
        }
    }

    items.sort_by(|a, b| b.0.received_at.cmp(&a.0.received_at));
    items.truncate(limit);
    Ok(items)
}

/// Parse one file into an artifact, body included
fn read_item(path: &Path) -> Result<Artifact, AdapterError> {
    let bytes = std::fs::read(path)?;
    let modified: DateTime<Utc> = std::fs::metadata(path)?.modified()?.into();

    let is_vtt = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("vtt"))
        .unwrap_or(false);

    if is_vtt {
        let subject = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        return Ok(Artifact::new(
            content_id(&bytes),
            subject,
            modified,
            String::from_utf8_lossy(&bytes).to_string(),
        ));
    }

    let message = MessageParser::default()
        .parse(bytes.as_slice())
        .ok_or_else(|| {
            AdapterError::MalformedResponse(format!("not a mail message: {}", path.display()))
        })?;

    let id = message
        .message_id()
        .map(|s| s.to_string())
        .unwrap_or_else(|| content_id(&bytes));
    let subject = message.subject().unwrap_or_default().to_string();
    let received_at = message
        .date()
        .and_then(|d| DateTime::<Utc>::from_timestamp(d.to_timestamp(), 0))
        .unwrap_or(modified);

    Ok(Artifact::new(id, subject, received_at, message_body(&message)))
}

/// Caption attachment first, then the text part, then the HTML part
fn message_body(message: &mail_parser::Message) -> String {
    for part in message.attachments() {
        let is_captions = MimeHeaders::attachment_name(part)
            .map(|n| n.to_lowercase().ends_with(".vtt"))
            .unwrap_or(false);
        if is_captions {
            if let Ok(text) = std::str::from_utf8(part.contents()) {
                return text.to_string();
            }
        }
    }

    if let Some(text) = message.body_text(0) {
        return text.to_string();
    }
    message.body_html(0).map(|h| h.to_string()).unwrap_or_default()
}

/// First 16 hex chars of the content's SHA-256
fn content_id(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(digest)[..16].to_string()
}
