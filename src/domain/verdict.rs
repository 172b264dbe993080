//! Classifier verdicts.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Meeting intent as decided by the classifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeetingType {
    /// Backlog refinement: produces stories
    Refinement,

    /// General meeting: produces action items
    General,

    /// Both signals present without a clear winner
    Mixed,

    /// No signal at all
    Unknown,
}

impl fmt::Display for MeetingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MeetingType::Refinement => "refinement",
            MeetingType::General => "general",
            MeetingType::Mixed => "mixed",
            MeetingType::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Classifier output: the decision plus the evidence behind it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationVerdict {
    pub meeting_type: MeetingType,
    pub refinement_score: f64,
    pub action_score: f64,

    /// Title keywords that matched, in keyword-list order
    pub title_hits: Vec<String>,

    /// Refinement body keywords that matched
    pub refinement_hits: Vec<String>,

    /// Action body keywords that matched
    pub action_hits: Vec<String>,
}
