//! Keyword heuristic deciding meeting intent.
//!
//! The keyword lists are plain data. Scoring counts non-overlapping,
//! case-insensitive occurrences of each phrase independently, so two
//! overlapping phrases ("story point" and "story points") both count.

use crate::domain::{ClassificationVerdict, ClassifierSettings, MeetingType};

/// Scores below this are treated as no signal
pub const NO_SIGNAL: f64 = 0.1;

/// Phrases in a meeting title that point at backlog refinement
pub const TITLE_KEYWORDS: &[&str] = &[
    "refinement",
    "backlog grooming",
    "grooming",
    "story workshop",
    "story refinement",
    "sprint planning",
    "planning poker",
    "estimation",
];

/// Phrases in a transcript that point at backlog refinement
pub const REFINEMENT_KEYWORDS: &[&str] = &[
    "story point",
    "story points",
    "sp ",
    "estimate this",
    "estimate it",
    "acceptance criteria",
    "given when then",
    "given/when/then",
    "backlog item",
    "refine this",
    "split this story",
    "split the story",
    "create a story",
    "create a user story",
    "epic",
    "feature ticket",
    "technical spike",
    "sprint backlog",
    "product backlog",
    "groom the backlog",
    "definition of ready",
    "definition of done",
];

/// Phrases in a transcript that point at follow-up actions
pub const ACTION_KEYWORDS: &[&str] = &[
    "next step",
    "next steps",
    "action item",
    "action items",
    "follow up",
    "follow-up",
    "take this away",
    "take an action",
    "can you send",
    "can you share",
    "please send",
    "please share",
    "schedule a meeting",
    "set up a meeting",
    "set up a call",
    "reach out to",
    "ping",
    "email them",
    "by when",
    "due date",
    "deadline",
    "owner",
    "who will own",
    "assign this",
    "we need to decide",
    "decision",
];

/// Classify a meeting from its title and transcript
pub fn classify(title: &str, body: &str, settings: &ClassifierSettings) -> ClassificationVerdict {
    let title = title.to_lowercase();
    let body = body.to_lowercase();

    let (title_count, title_hits) = score(&title, TITLE_KEYWORDS);
    let (refinement_count, refinement_hits) = score(&body, REFINEMENT_KEYWORDS);
    let (action_count, action_hits) = score(&body, ACTION_KEYWORDS);

    let refinement_score = title_count as f64 * settings.title_weight
        + refinement_count as f64 * settings.body_weight;
    let action_score = action_count as f64 * settings.action_weight;

    let meeting_type = decide(refinement_score, action_score, settings);

    tracing::debug!(
        %meeting_type,
        refinement_score,
        action_score,
        title_hits = ?title_hits,
        refinement_hits = ?refinement_hits,
        action_hits = ?action_hits,
        "Classified meeting"
    );

    ClassificationVerdict {
        meeting_type,
        refinement_score,
        action_score,
        title_hits,
        refinement_hits,
        action_hits,
    }
}

/// Map the two scores to a verdict
pub fn decide(refinement: f64, action: f64, settings: &ClassifierSettings) -> MeetingType {
    if refinement < NO_SIGNAL && action < NO_SIGNAL {
        MeetingType::Unknown
    } else if refinement >= settings.min_confidence
        && refinement >= action * settings.dominance_factor
    {
        MeetingType::Refinement
    } else if action >= settings.min_confidence
        && action >= refinement * settings.dominance_factor
    {
        MeetingType::General
    } else {
        MeetingType::Mixed
    }
}

/// Total occurrences across `keywords` plus the phrases that hit at least once.
/// `text` must already be lowercase.
fn score(text: &str, keywords: &[&str]) -> (usize, Vec<String>) {
    let mut total = 0;
    let mut hits = Vec::new();
    for keyword in keywords {
        let count = text.matches(keyword).count();
        if count > 0 {
            total += count;
            hits.push((*keyword).to_string());
        }
    }
    (total, hits)
}
