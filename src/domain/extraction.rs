//! Structured items extracted from a meeting transcript.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Label every generated story carries first, marking it for human review
pub const REVIEW_LABEL: &str = "AIGen-ReviewRqd";

/// A backlog story proposed from a refinement discussion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryItem {
    pub summary: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    /// Ordered acceptance criteria
    #[serde(default, deserialize_with = "null_as_default")]
    pub acceptance_criteria: Vec<String>,

    /// Accepts integers, whole floats and numeric strings
    #[serde(default, deserialize_with = "lenient_points")]
    pub estimate_points: Option<u32>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub assignees: Vec<String>,

    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: Vec<String>,
}

impl StoryItem {
    /// Ensure the review label is present and first
    pub fn enforce_review_label(&mut self) {
        self.labels.retain(|l| l != REVIEW_LABEL);
        self.labels.insert(0, REVIEW_LABEL.to_string());
    }
}

/// A follow-up task agreed in a meeting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionItem {
    pub title: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    #[serde(default, deserialize_with = "lenient_text")]
    pub owner: Option<String>,

    /// Free-text due date as spoken in the meeting
    #[serde(default)]
    pub due_date_hint: Option<String>,

    #[serde(default)]
    pub related_decision: Option<String>,
}

/// The parsed generation result. Missing or null lists are empty.
///
/// Items are read one at a time: an item that does not fit its type is
/// logged and dropped without affecting its siblings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    #[serde(default, deserialize_with = "item_list")]
    pub stories: Vec<StoryItem>,

    #[serde(default, deserialize_with = "item_list")]
    pub actions: Vec<ActionItem>,
}

impl ExtractionResult {
    pub fn is_empty(&self) -> bool {
        self.stories.is_empty() && self.actions.is_empty()
    }

    pub fn item_count(&self) -> usize {
        self.stories.len() + self.actions.len()
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn item_list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items = match Value::deserialize(deserializer)? {
        Value::Array(items) => items,
        Value::Null => return Ok(Vec::new()),
        other => {
            tracing::warn!("Expected a list of items, got {}", kind_of(&other));
            return Ok(Vec::new());
        }
    };

    Ok(items
        .into_iter()
        .enumerate()
        .filter_map(|(idx, item)| match serde_json::from_value::<T>(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                tracing::warn!(index = idx, "Dropping malformed item: {}", e);
                None
            }
        })
        .collect())
}

fn lenient_points<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let points = match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().map(|p| p as f64).or_else(|| n.as_f64()),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(points
        .filter(|p| p.is_finite() && *p >= 0.0 && *p <= f64::from(u32::MAX))
        .map(|p| p.round() as u32))
}

fn lenient_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let text = match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Array(values) => {
            let parts: Vec<String> = values
                .iter()
                .filter_map(|v| match v {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    _ => None,
                })
                .collect();
            Some(parts.join(", "))
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    };
    Ok(text.filter(|t| !t.trim().is_empty()))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_lists_are_empty() {
        let result: ExtractionResult = serde_json::from_str("{}").unwrap();
        assert!(result.is_empty());

        let result: ExtractionResult =
            serde_json::from_str(r#"{"stories": null, "actions": null}"#).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_story_with_sparse_fields() {
        let json = r#"{
            "stories": [{"summary": "Export CSV", "acceptance_criteria": null, "estimate_points": 3}],
            "meeting_type": "refinement"
        }"#;
        let result: ExtractionResult = serde_json::from_str(json).unwrap();
        assert_eq!(result.stories.len(), 1);
        assert_eq!(result.stories[0].estimate_points, Some(3));
        assert!(result.stories[0].acceptance_criteria.is_empty());
        assert!(result.actions.is_empty());
    }

    #[test]
    fn test_malformed_item_does_not_sink_siblings() {
        let json = r#"{
            "stories": [
                {"summary": null},
                {"summary": "CSV export", "estimate_points": "5"},
                {"summary": "Audit log", "estimate_points": 2.5}
            ],
            "actions": [
                {"title": "Send deck", "owner": ["Dana", "Lee"]},
                {"owner": "Nobody"}
            ]
        }"#;
        let result: ExtractionResult = serde_json::from_str(json).unwrap();

        assert_eq!(result.stories.len(), 2);
        assert_eq!(result.stories[0].estimate_points, Some(5));
        assert_eq!(result.stories[1].estimate_points, Some(3));
        assert_eq!(result.actions.len(), 1);
        assert_eq!(result.actions[0].owner.as_deref(), Some("Dana, Lee"));
    }

    #[test]
    fn test_list_of_wrong_kind_is_empty() {
        let result: ExtractionResult =
            serde_json::from_str(r#"{"actions": "none", "stories": {"summary": "x"}}"#).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn test_review_label_moved_to_front() {
        let mut story = StoryItem {
            summary: "s".to_string(),
            description: String::new(),
            acceptance_criteria: vec![],
            estimate_points: None,
            assignees: vec![],
            labels: vec!["backend".to_string(), REVIEW_LABEL.to_string()],
        };
        story.enforce_review_label();
        assert_eq!(story.labels, vec![REVIEW_LABEL.to_string(), "backend".to_string()]);

        story.labels.clear();
        story.enforce_review_label();
        assert_eq!(story.labels, vec![REVIEW_LABEL.to_string()]);
    }
}
