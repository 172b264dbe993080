//! Extraction requests for the generation service.
//!
//! One request per artifact, built from the classifier verdict:
//! - refinement → stories only
//! - general → actions only
//! - mixed / unknown → stories and actions
//!
//! Every template demands a single JSON object with no commentary and
//! spells out the empty-array shape to return when nothing is found.

use serde::Serialize;

use crate::domain::{ClassificationVerdict, MeetingType, REVIEW_LABEL};

/// Default response cap in tokens
pub const DEFAULT_MAX_TOKENS: u32 = 8000;

/// Sampling temperature for extraction
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

const SYSTEM_INSTRUCTION: &str = "\
You convert meeting transcripts into JSON for a product delivery team.

Rules:
- Output exactly one JSON object that follows the requested shape. No prose, no markdown.
- When information is not clearly present, use null or an empty array.
- Never make up owners, due dates, estimates or acceptance criteria the transcript does not support.

The user message names the meeting_type; it decides whether you produce stories, actions, or both.";

/// Which lists a template asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Template {
    Stories,
    Actions,
    Combined,
}

impl Template {
    pub fn for_meeting(meeting_type: MeetingType) -> Self {
        match meeting_type {
            MeetingType::Refinement => Template::Stories,
            MeetingType::General => Template::Actions,
            MeetingType::Mixed | MeetingType::Unknown => Template::Combined,
        }
    }
}

/// A schema-constrained request, built fresh per artifact
#[derive(Debug, Clone, Serialize)]
pub struct ExtractionRequest {
    pub system: String,
    pub user: String,
    pub meeting_type: MeetingType,
    pub template: Template,
    pub max_tokens: u32,
    pub temperature: f32,
}

/// Build the request for one meeting
pub fn build(verdict: &ClassificationVerdict, title: &str, transcript: &str) -> ExtractionRequest {
    let template = Template::for_meeting(verdict.meeting_type);
    let user = match template {
        Template::Stories => stories_prompt(title, transcript),
        Template::Actions => actions_prompt(title, transcript),
        Template::Combined => combined_prompt(verdict.meeting_type, title, transcript),
    };

    ExtractionRequest {
        system: SYSTEM_INSTRUCTION.to_string(),
        user,
        meeting_type: verdict.meeting_type,
        template,
        max_tokens: DEFAULT_MAX_TOKENS,
        temperature: DEFAULT_TEMPERATURE,
    }
}

fn inputs(title: &str, transcript: &str) -> String {
    format!(
        "Meeting title: \"{title}\"\n\
         Transcript (automatic captions, may be partial or noisy):\n\
         <<<\n{transcript}\n>>>"
    )
}

fn story_rules() -> String {
    format!(
        "For each backlog item that is ready to become a user story, produce:\n\
         - summary: a short story title suitable for an issue tracker\n\
         - description: two to six sentences of context, problem and constraints\n\
         - acceptance_criteria: concrete, testable conditions (Given/When/Then or bullets); \
         only criteria that were actually discussed, otherwise []\n\
         - estimate_points: the integer if a number was stated (\"3 points\", \"5 SP\"), otherwise null\n\
         - assignees: names clearly given the story, otherwise []\n\
         - labels: \"{REVIEW_LABEL}\" MUST be the first label; add any tags that were mentioned\n\
         Skip meeting logistics (sharing decks, booking rooms) unless they belong to a story."
    )
}

fn action_rules() -> &'static str {
    "For each commitment someone made to do something after the meeting, produce:\n\
     - title: a short imperative phrase\n\
     - description: one to three sentences of context, or \"\"\n\
     - owner: the person who agreed or was asked to do it, as named; null if unclear\n\
     - due_date_hint: the timeframe exactly as said, or an ISO date (YYYY-MM-DD) when one \
     was stated; null if no timeframe was given. Do not guess.\n\
     - related_decision: the decision this action follows from, or null\n\
     Skip vague remarks that nobody committed to."
}

const STORY_SHAPE: &str = r#"{
      "summary": "string",
      "description": "string",
      "acceptance_criteria": ["string"],
      "estimate_points": null,
      "assignees": [],
      "labels": ["AIGen-ReviewRqd"]
    }"#;

const ACTION_SHAPE: &str = r#"{
      "title": "string",
      "description": "string",
      "owner": null,
      "due_date_hint": null,
      "related_decision": null
    }"#;

fn stories_prompt(title: &str, transcript: &str) -> String {
    format!(
        "meeting_type: \"refinement\"\n\n\
         This meeting is mainly backlog refinement.\n\n\
         {inputs}\n\n\
         {rules}\n\n\
         Respond with only this JSON object:\n\
         {{\n  \"meeting_type\": \"refinement\",\n  \"stories\": [\n    {STORY_SHAPE}\n  ]\n}}\n\n\
         If there are no stories, respond with:\n\
         {{\"meeting_type\": \"refinement\", \"stories\": []}}",
        inputs = inputs(title, transcript),
        rules = story_rules(),
    )
}

fn actions_prompt(title: &str, transcript: &str) -> String {
    format!(
        "meeting_type: \"general\"\n\n\
         This is a general meeting; the output is follow-up action items, not stories.\n\n\
         {inputs}\n\n\
         {rules}\n\n\
         Respond with only this JSON object:\n\
         {{\n  \"meeting_type\": \"general\",\n  \"actions\": [\n    {ACTION_SHAPE}\n  ]\n}}\n\n\
         If there are no action items, respond with:\n\
         {{\"meeting_type\": \"general\", \"actions\": []}}",
        inputs = inputs(title, transcript),
        rules = action_rules(),
    )
}

fn combined_prompt(meeting_type: MeetingType, title: &str, transcript: &str) -> String {
    format!(
        "meeting_type: \"{meeting_type}\"\n\n\
         This meeting may contain backlog refinement and follow-up actions. Extract both.\n\n\
         {inputs}\n\n\
         Stories:\n{story_rules}\n\n\
         Actions:\n{action_rules}\n\n\
         Respond with only this JSON object:\n\
         {{\n  \"meeting_type\": \"{meeting_type}\",\n  \"stories\": [\n    {STORY_SHAPE}\n  ],\n  \"actions\": [\n    {ACTION_SHAPE}\n  ]\n}}\n\n\
         If nothing is found, respond with empty arrays:\n\
         {{\"meeting_type\": \"{meeting_type}\", \"stories\": [], \"actions\": []}}",
        inputs = inputs(title, transcript),
        story_rules = story_rules(),
        action_rules = action_rules(),
    )
}
