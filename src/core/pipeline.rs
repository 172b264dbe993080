//! Per-artifact processing: derive → classify → build → generate → route.
//!
//! When the mail only links to a recording, the transcript is looked up
//! through the configured [`TranscriptSource`] before giving up.
//!
//! Runs sequentially on the caller's task. Every failure inside is logged
//! and reported in the returned [`PipelineReport`]; the caller marks the
//! artifact processed whatever the report says.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use super::classifier;
use super::request;
use super::router::{ResultRouter, RouteOptions, RoutingOutcome};
use crate::adapters::{Generator, TranscriptLookup, TranscriptSource};
use crate::domain::{Artifact, ArtifactMeta, ClassificationVerdict, PipelineSettings};
use crate::ingest::transcript;

/// What happened to one artifact
#[derive(Debug)]
pub enum PipelineReport {
    /// Body held no usable transcript
    NoTranscript,

    /// Analysis switched off in settings; transcript was only saved
    AnalysisDisabled,

    /// The generation call failed
    GenerationFailed {
        verdict: ClassificationVerdict,
        error: String,
    },

    /// Response routed to the sinks
    Routed {
        verdict: ClassificationVerdict,
        outcome: RoutingOutcome,
    },
}

/// The analysis pipeline shared by the monitor and the CLI
pub struct Pipeline {
    generator: Arc<dyn Generator>,
    router: ResultRouter,
    transcripts_dir: Option<PathBuf>,
    transcripts: Option<Arc<dyn TranscriptSource>>,
}

impl Pipeline {
    pub fn new(generator: Arc<dyn Generator>, router: ResultRouter) -> Self {
        Self {
            generator,
            router,
            transcripts_dir: None,
            transcripts: None,
        }
    }

    /// Look up transcripts the mail only links to
    pub fn with_transcript_source(mut self, source: Arc<dyn TranscriptSource>) -> Self {
        self.transcripts = Some(source);
        self
    }

    /// Keep a copy of each transcript in `dir` (when settings allow it)
    pub fn with_transcripts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.transcripts_dir = Some(dir.into());
        self
    }

    /// Process one artifact whose body has already been fetched
    #[instrument(skip_all, fields(artifact = %artifact.id))]
    pub async fn process(
        &self,
        artifact: &Artifact,
        settings: &PipelineSettings,
    ) -> PipelineReport {
        let title = transcript::normalize_title(&artifact.subject, &settings.subject_pattern);
        let meta = ArtifactMeta::from_artifact(artifact, title.clone())
            .with_recording_link(transcript::recording_link(&artifact.body));

        let text = match transcript::derive_transcript(&artifact.body) {
            Some(text) => Some(text),
            None => self.fetch_remote(&meta, &artifact.body).await,
        };
        let Some(text) = text else {
            if transcript::has_transcript_markers(&artifact.body) {
                tracing::warn!(%title, "Mail refers to a transcript that is not in the body");
            } else {
                tracing::warn!(%title, "No transcript found");
            }
            return PipelineReport::NoTranscript;
        };

        if settings.save_transcripts {
            self.save_transcript(&title, &text).await;
        }

        if !settings.enable_analysis {
            tracing::info!(%title, "Analysis disabled, transcript only");
            return PipelineReport::AnalysisDisabled;
        }

        self.analyze(&meta, &text, settings).await
    }

    /// Classify, generate and route a transcript
    pub async fn analyze(
        &self,
        meta: &ArtifactMeta,
        text: &str,
        settings: &PipelineSettings,
    ) -> PipelineReport {
        let verdict = classifier::classify(&meta.title, text, &settings.classifier);
        tracing::info!(
            title = %meta.title,
            meeting_type = %verdict.meeting_type,
            refinement_score = verdict.refinement_score,
            action_score = verdict.action_score,
            "Meeting classified"
        );

        let req = request::build(&verdict, &meta.title, text);

        let raw = match self.generator.generate(&req).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(generator = self.generator.name(), "Generation failed: {}", e);
                return PipelineReport::GenerationFailed {
                    verdict,
                    error: e.to_string(),
                };
            }
        };

        let outcome = self
            .router
            .route(&raw, meta, &RouteOptions::from(settings))
            .await;

        PipelineReport::Routed { verdict, outcome }
    }

    /// Transcript from the recordings service for a mail that links to one
    async fn fetch_remote(&self, meta: &ArtifactMeta, body: &str) -> Option<String> {
        let source = self.transcripts.as_ref()?;
        let meeting_id = transcript::meeting_id(body);
        if meeting_id.is_none() && meta.recording_link.is_none() {
            return None;
        }

        let lookup = TranscriptLookup {
            title: meta.title.clone(),
            meeting_id,
        };
        match source.fetch_transcript(&lookup).await {
            Ok(Some(text)) => {
                let text = text.trim().to_string();
                if text.chars().count() < transcript::MIN_TRANSCRIPT_CHARS {
                    tracing::info!(title = %meta.title, "Fetched transcript is too short");
                    return None;
                }
                tracing::info!(
                    title = %meta.title,
                    source = source.name(),
                    chars = text.len(),
                    "Transcript fetched from recordings"
                );
                Some(text)
            }
            Ok(None) => None,
            Err(e) if e.is_configuration() => {
                tracing::debug!(source = source.name(), "Transcript lookup skipped: {}", e);
                None
            }
            Err(e) => {
                tracing::warn!(source = source.name(), "Transcript lookup failed: {}", e);
                None
            }
        }
    }

    async fn save_transcript(&self, title: &str, text: &str) {
        let Some(dir) = &self.transcripts_dir else {
            return;
        };

        let name = format!(
            "{}_{}.txt",
            transcript::safe_file_stem(title),
            Utc::now().format("%Y%m%d_%H%M%S")
        );
        let path = dir.join(name);

        let result = async {
            tokio::fs::create_dir_all(dir).await?;
            tokio::fs::write(&path, text).await
        }
        .await;

        match result {
            Ok(()) => tracing::debug!("Transcript saved to {}", path.display()),
            Err(e) => tracing::warn!("Failed to save transcript {}: {}", path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::AdapterError;
    use crate::core::request::ExtractionRequest;
    use crate::core::review::ReviewQueue;
    use crate::domain::MeetingType;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct ScriptedGenerator {
        reply: Result<String, String>,
        seen: Mutex<Vec<ExtractionRequest>>,
    }

    #[async_trait]
    impl Generator for ScriptedGenerator {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn generate(&self, request: &ExtractionRequest) -> Result<String, AdapterError> {
            self.seen.lock().unwrap().push(request.clone());
            self.reply.clone().map_err(AdapterError::Transport)
        }
    }

    struct FakeRecordings {
        transcript: Option<String>,
        lookups: Mutex<Vec<TranscriptLookup>>,
    }

    #[async_trait]
    impl TranscriptSource for FakeRecordings {
        fn name(&self) -> &str {
            "fake-recordings"
        }

        async fn fetch_transcript(
            &self,
            lookup: &TranscriptLookup,
        ) -> Result<Option<String>, AdapterError> {
            self.lookups.lock().unwrap().push(lookup.clone());
            Ok(self.transcript.clone())
        }
    }

    fn recordings(transcript: Option<&str>) -> Arc<FakeRecordings> {
        Arc::new(FakeRecordings {
            transcript: transcript.map(str::to_string),
            lookups: Mutex::new(Vec::new()),
        })
    }

    fn pipeline(
        temp: &TempDir,
        reply: Result<String, String>,
    ) -> (Pipeline, Arc<ScriptedGenerator>) {
        let generator = Arc::new(ScriptedGenerator {
            reply,
            seen: Mutex::new(Vec::new()),
        });
        let reviews = Arc::new(ReviewQueue::new(temp.path().join("reviews.json")));
        let router = ResultRouter::new(None, reviews, None);
        let p = Pipeline::new(generator.clone(), router)
            .with_transcripts_dir(temp.path().join("transcripts"));
        (p, generator)
    }

    fn artifact(body: &str) -> Artifact {
        Artifact::new(
            "m1",
            "Your Webex meeting content is available: Sprint Planning",
            Utc::now(),
            body,
        )
    }

    const BODY: &str = "Transcript:\n\
        Alice: let's estimate story points for the export epic.\n\
        Bob: acceptance criteria first.";

    #[tokio::test]
    async fn test_routes_structured_response() {
        let temp = TempDir::new().unwrap();
        let (p, generator) = pipeline(
            &temp,
            Ok(r#"{"stories": [{"summary": "CSV export"}]}"#.to_string()),
        );

        let report = p.process(&artifact(BODY), &PipelineSettings::default()).await;
        let PipelineReport::Routed { verdict, outcome } = report else {
            panic!("expected routed report");
        };
        assert_eq!(verdict.meeting_type, MeetingType::Refinement);
        assert_eq!(outcome.reviews, crate::core::router::BranchOutcome::Delivered { count: 1 });

        let seen = generator.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].user.contains("Meeting title: \"Sprint Planning\""));

        let saved: Vec<_> = std::fs::read_dir(temp.path().join("transcripts")).unwrap().collect();
        assert_eq!(saved.len(), 1);
    }

    #[tokio::test]
    async fn test_short_body_skips_generation() {
        let temp = TempDir::new().unwrap();
        let (p, generator) = pipeline(&temp, Ok("{}".to_string()));

        let report = p.process(&artifact("too short"), &PipelineSettings::default()).await;
        assert!(matches!(report, PipelineReport::NoTranscript));
        assert!(generator.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_is_reported() {
        let temp = TempDir::new().unwrap();
        let (p, _generator) = pipeline(&temp, Err("connection reset".to_string()));

        let report = p.process(&artifact(BODY), &PipelineSettings::default()).await;
        assert!(matches!(report, PipelineReport::GenerationFailed { .. }));
    }

    #[tokio::test]
    async fn test_analysis_disabled() {
        let temp = TempDir::new().unwrap();
        let (p, generator) = pipeline(&temp, Ok("{}".to_string()));
        let settings = PipelineSettings {
            enable_analysis: false,
            save_transcripts: false,
            ..PipelineSettings::default()
        };

        let report = p.process(&artifact(BODY), &settings).await;
        assert!(matches!(report, PipelineReport::AnalysisDisabled));
        assert!(generator.seen.lock().unwrap().is_empty());
        assert!(!temp.path().join("transcripts").exists());
    }

    #[tokio::test]
    async fn test_linked_recording_transcript_is_fetched() {
        let temp = TempDir::new().unwrap();
        let (p, generator) = pipeline(&temp, Ok(r#"{"actions": []}"#.to_string()));
        let source = recordings(Some(BODY));
        let p = p.with_transcript_source(source.clone());

        let body = "Meeting ID: 263412345\nhttps://a.webex.com/m/x1";
        let report = p.process(&artifact(body), &PipelineSettings::default()).await;
        assert!(matches!(report, PipelineReport::Routed { .. }));
        assert_eq!(generator.seen.lock().unwrap().len(), 1);

        let lookups = source.lookups.lock().unwrap();
        assert_eq!(lookups.len(), 1);
        assert_eq!(lookups[0].title, "Sprint Planning");
        assert_eq!(lookups[0].meeting_id.as_deref(), Some("263412345"));
    }

    #[tokio::test]
    async fn test_no_link_means_no_lookup() {
        let temp = TempDir::new().unwrap();
        let (p, generator) = pipeline(&temp, Ok("{}".to_string()));
        let source = recordings(Some(BODY));
        let p = p.with_transcript_source(source.clone());

        let report = p.process(&artifact("too short"), &PipelineSettings::default()).await;
        assert!(matches!(report, PipelineReport::NoTranscript));
        assert!(source.lookups.lock().unwrap().is_empty());
        assert!(generator.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_short_fetched_transcript_is_ignored() {
        let temp = TempDir::new().unwrap();
        let (p, generator) = pipeline(&temp, Ok("{}".to_string()));
        let p = p.with_transcript_source(recordings(Some("hi")));

        let body = "Recording: https://acme.webex.com/m/abc-123";
        let report = p.process(&artifact(body), &PipelineSettings::default()).await;
        assert!(matches!(report, PipelineReport::NoTranscript));
        assert!(generator.seen.lock().unwrap().is_empty());
    }
}
