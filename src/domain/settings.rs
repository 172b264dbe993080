//! Pipeline settings persisted alongside the processing state.
//!
//! These live in `state.json` so an operator can change them with
//! `minutes settings set` while the monitor is running; the monitor picks
//! them up on its next poll.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from editing settings
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Unknown setting: {0}")]
    UnknownKey(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Weights and thresholds for the meeting classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierSettings {
    pub title_weight: f64,
    pub body_weight: f64,
    pub action_weight: f64,
    pub min_confidence: f64,
    pub dominance_factor: f64,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            title_weight: 2.0,
            body_weight: 1.0,
            action_weight: 1.0,
            min_confidence: 1.5,
            dominance_factor: 1.3,
        }
    }
}

/// Everything the monitor and router read at runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSettings {
    /// Mailbox folder to watch
    pub folder: String,

    /// Case-insensitive subject substring that marks a meeting artifact
    pub subject_pattern: String,

    pub poll_interval_secs: u64,

    /// Rate limit between items within one poll
    pub item_delay_secs: u64,

    pub approval_timeout_secs: u64,

    /// How many of the newest mailbox items each poll considers
    pub window: usize,

    /// Run classification and generation at all
    pub enable_analysis: bool,

    /// Send action items to the task sink
    pub auto_create_tasks: bool,

    /// Send the digest to the chat notifier
    pub notify: bool,

    /// Keep a copy of each approved transcript
    pub save_transcripts: bool,

    pub notify_recipient: Option<String>,

    pub task_category: String,

    pub classifier: ClassifierSettings,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            folder: "Inbox".to_string(),
            subject_pattern: "Your Webex meeting content is available:".to_string(),
            poll_interval_secs: 60,
            item_delay_secs: 60,
            approval_timeout_secs: 300,
            window: 50,
            enable_analysis: true,
            auto_create_tasks: true,
            notify: true,
            save_transcripts: true,
            notify_recipient: None,
            task_category: "Webex Recording".to_string(),
            classifier: ClassifierSettings::default(),
        }
    }
}

impl PipelineSettings {
    /// Setting keys accepted by [`PipelineSettings::set`]
    pub const KEYS: &'static [&'static str] = &[
        "folder",
        "subject_pattern",
        "poll_interval_secs",
        "item_delay_secs",
        "approval_timeout_secs",
        "window",
        "enable_analysis",
        "auto_create_tasks",
        "notify",
        "save_transcripts",
        "notify_recipient",
        "task_category",
        "classifier.title_weight",
        "classifier.body_weight",
        "classifier.action_weight",
        "classifier.min_confidence",
        "classifier.dominance_factor",
    ];

    /// Update one setting from its string form
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), SettingsError> {
        let c = &mut self.classifier;
        match key {
            "folder" => self.folder = value.to_string(),
            "subject_pattern" => self.subject_pattern = value.to_string(),
            "poll_interval_secs" => self.poll_interval_secs = parse(key, value)?,
            "item_delay_secs" => self.item_delay_secs = parse(key, value)?,
            "approval_timeout_secs" => self.approval_timeout_secs = parse(key, value)?,
            "window" => {
                let window: usize = parse(key, value)?;
                if window == 0 {
                    return Err(invalid(key, value));
                }
                self.window = window;
            }
            "enable_analysis" => self.enable_analysis = parse(key, value)?,
            "auto_create_tasks" => self.auto_create_tasks = parse(key, value)?,
            "notify" => self.notify = parse(key, value)?,
            "save_transcripts" => self.save_transcripts = parse(key, value)?,
            "notify_recipient" => {
                self.notify_recipient = match value.trim() {
                    "" | "none" => None,
                    v => Some(v.to_string()),
                }
            }
            "task_category" => self.task_category = value.to_string(),
            "classifier.title_weight" => c.title_weight = parse_weight(key, value)?,
            "classifier.body_weight" => c.body_weight = parse_weight(key, value)?,
            "classifier.action_weight" => c.action_weight = parse_weight(key, value)?,
            "classifier.min_confidence" => c.min_confidence = parse_weight(key, value)?,
            "classifier.dominance_factor" => c.dominance_factor = parse_weight(key, value)?,
            _ => return Err(SettingsError::UnknownKey(key.to_string())),
        }
        Ok(())
    }
}

fn invalid(key: &str, value: &str) -> SettingsError {
    SettingsError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, SettingsError> {
    value.trim().parse().map_err(|_| invalid(key, value))
}

/// Weights must be finite and non-negative so scores stay non-negative
fn parse_weight(key: &str, value: &str) -> Result<f64, SettingsError> {
    let w: f64 = parse(key, value)?;
    if !w.is_finite() || w < 0.0 {
        return Err(invalid(key, value));
    }
    Ok(w)
}
