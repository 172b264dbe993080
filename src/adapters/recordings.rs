//! Webex recordings adapter for transcripts that are not in the mail.
//!
//! Notification mails often carry only a link to the recording. This
//! adapter searches the caller's recent recordings, picks the one that
//! belongs to the meeting, and downloads its transcript.
//!
//! Matching order:
//! 1. a recording whose `meetingId` contains the id found in the mail
//! 2. the recording whose topic shares the most words with the title

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::webex::{WebexConfig, DEFAULT_API_BASE};
use super::{AdapterError, TranscriptLookup, TranscriptSource};
use crate::ingest::transcript;

/// How far back recordings are searched
pub const SEARCH_DAYS: i64 = 30;

/// Recordings requested per search
const LIST_LIMIT: &str = "100";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// One entry from GET /v1/recordings
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordingSummary {
    pub id: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub meeting_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RecordingList {
    #[serde(default)]
    items: Vec<RecordingSummary>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordingDetail {
    #[serde(default)]
    temporary_direct_download_links: Option<DownloadLinks>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DownloadLinks {
    #[serde(default)]
    transcript_download_link: Option<String>,
}

/// Webex recordings client
pub struct WebexRecordings {
    /// User access token with the recordings read scope
    access_token: Option<String>,
    api_base: String,
    client: reqwest::Client,
}

impl WebexRecordings {
    pub fn new(access_token: Option<String>, api_base: impl Into<String>) -> Self {
        Self {
            access_token: access_token.filter(|t| !t.trim().is_empty()),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn from_config(config: WebexConfig) -> Self {
        let base = config.api_base.unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let token = config.access_token.or(config.bot_token);
        Self::new(token, base)
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.api_base, path)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, AdapterError> {
        let response = request.timeout(REQUEST_TIMEOUT).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AdapterError::Rejected {
                service: "webex",
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .await
            .map_err(|e| AdapterError::MalformedResponse(e.to_string()))
    }
}

#[async_trait]
impl TranscriptSource for WebexRecordings {
    fn name(&self) -> &str {
        "webex-recordings"
    }

    async fn fetch_transcript(
        &self,
        lookup: &TranscriptLookup,
    ) -> Result<Option<String>, AdapterError> {
        let token = self
            .access_token
            .as_deref()
            .ok_or_else(|| AdapterError::ConfigurationMissing("Webex access token".to_string()))?;

        let (from, to) = search_window(Utc::now());
        let list: RecordingList = self
            .get_json(
                self.client
                    .get(self.api_url("recordings"))
                    .bearer_auth(token)
                    .query(&[
                        ("max", LIST_LIMIT),
                        ("from", from.as_str()),
                        ("to", to.as_str()),
                    ]),
            )
            .await?;
        tracing::debug!(recordings = list.items.len(), "Listed recent recordings");

        let Some(recording) = select_recording(&list.items, lookup) else {
            tracing::info!(title = %lookup.title, "No recording matches the meeting");
            return Ok(None);
        };
        tracing::info!(recording = %recording.id, topic = %recording.topic, "Matched recording");

        let detail: RecordingDetail = self
            .get_json(
                self.client
                    .get(self.api_url(&format!("recordings/{}", recording.id)))
                    .bearer_auth(token),
            )
            .await?;

        let Some(link) = detail
            .temporary_direct_download_links
            .and_then(|links| links.transcript_download_link)
        else {
            tracing::info!(recording = %recording.id, "Recording has no transcript");
            return Ok(None);
        };

        // Temporary links are pre-signed; no bearer token
        let response = self
            .client
            .get(&link)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AdapterError::Rejected {
                service: "webex",
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }
        let body = response.text().await?;

        let text = if transcript::is_vtt(&body) {
            transcript::vtt_to_text(&body)
        } else {
            body
        };
        Ok(Some(text))
    }
}

/// `from`/`to` query values covering the last [`SEARCH_DAYS`] days
pub fn search_window(now: DateTime<Utc>) -> (String, String) {
    const FORMAT: &str = "%Y-%m-%dT%H:%M:%S.000Z";
    let from = now - chrono::Duration::days(SEARCH_DAYS);
    (from.format(FORMAT).to_string(), now.format(FORMAT).to_string())
}

/// Pick the recording that belongs to the meeting in `lookup`
pub fn select_recording<'a>(
    recordings: &'a [RecordingSummary],
    lookup: &TranscriptLookup,
) -> Option<&'a RecordingSummary> {
    if let Some(id) = lookup.meeting_id.as_deref().filter(|id| !id.is_empty()) {
        let by_id = recordings
            .iter()
            .find(|r| r.meeting_id.as_deref().is_some_and(|m| m.contains(id)));
        if by_id.is_some() {
            return by_id;
        }
    }

    let title_words = words(&lookup.title);
    let mut best: Option<(&RecordingSummary, usize)> = None;
    for recording in recordings {
        let overlap = words(&recording.topic).intersection(&title_words).count();
        if overlap > 0 && best.map_or(true, |(_, score)| overlap > score) {
            best = Some((recording, overlap));
        }
    }
    best.map(|(recording, _)| recording)
}

fn words(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}
