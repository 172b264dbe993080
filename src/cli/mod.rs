//! Command-line interface for minutes.
//!
//! Provides commands for watching the mailbox, inspecting and resetting the
//! processing state, running the classifier and the pipeline on local
//! transcripts, and managing items held for review.

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};

use crate::adapters::{
    ChatCompletionsGenerator, ChatNotifier, JsonlTaskSink, TaskSink, TranscriptSource,
    WebexNotifier, WebexRecordings,
};
use crate::config::{self, paths};
use crate::core::{
    classifier, due_date, Pipeline, PipelineReport, ResultRouter, ReviewQueue, StateStore,
};
use crate::domain::Artifact;
use crate::ingest::transcript;

pub mod review;
pub mod settings;
pub mod watch;

/// minutes - Meeting transcript intake, classification and routing
#[derive(Parser, Debug)]
#[command(name = "minutes")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch the mailbox and process approved meetings
    Watch {
        /// Approve every item without asking
        #[arg(long, conflicts_with = "auto_decline")]
        auto_approve: bool,

        /// Decline every item without asking
        #[arg(long)]
        auto_decline: bool,

        /// Poll once and exit
        #[arg(long)]
        once: bool,
    },

    /// Show processing state
    Status,

    /// Forget all processed and ignored items
    Reset {
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },

    /// Classify a local transcript
    Classify {
        /// Transcript file (text, VTT or HTML)
        file: PathBuf,

        /// Meeting title (defaults to the file name)
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Run the full pipeline on a local transcript, without approval
    Analyze {
        /// Transcript file (text, VTT or HTML)
        file: PathBuf,

        /// Meeting title (defaults to the file name)
        #[arg(short, long)]
        title: Option<String>,
    },

    /// Resolve a due-date hint to a date
    Due {
        /// Hint such as "next week" or "asap"
        hint: String,

        /// Reference date (YYYY-MM-DD, defaults to today)
        #[arg(long)]
        from: Option<NaiveDate>,
    },

    /// Manage stories held for review
    Review {
        #[command(subcommand)]
        command: review::ReviewCommands,
    },

    /// Show or change pipeline settings
    Settings {
        #[command(subcommand)]
        command: settings::SettingsCommands,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Watch {
                auto_approve,
                auto_decline,
                once,
            } => watch::execute(auto_approve, auto_decline, once).await,
            Commands::Status => show_status().await,
            Commands::Reset { yes } => reset_state(yes).await,
            Commands::Classify { file, title } => classify_file(&file, title).await,
            Commands::Analyze { file, title } => analyze_file(&file, title).await,
            Commands::Due { hint, from } => resolve_due(&hint, from),
            Commands::Review { command } => review::execute(command).await,
            Commands::Settings { command } => settings::execute(command).await,
            Commands::Config => show_config(),
        }
    }
}

/// Wire the pipeline to the configured collaborators
pub(crate) fn build_pipeline() -> Result<Pipeline> {
    let cfg = config::config()?;

    let generator = Arc::new(ChatCompletionsGenerator::from_config(cfg.generator.clone()));
    let tasks: Arc<dyn TaskSink> = Arc::new(JsonlTaskSink::new(paths::tasks_file()?));
    let notifier: Arc<dyn ChatNotifier> = Arc::new(WebexNotifier::from_config(cfg.webex.clone()));
    let reviews = Arc::new(ReviewQueue::open_default()?);

    let recordings: Arc<dyn TranscriptSource> =
        Arc::new(WebexRecordings::from_config(cfg.webex.clone()));

    let router = ResultRouter::new(Some(tasks), reviews, Some(notifier));
    Ok(Pipeline::new(generator, router)
        .with_transcripts_dir(paths::transcripts_dir()?)
        .with_transcript_source(recordings))
}

/// Show processing state
async fn show_status() -> Result<()> {
    let store = StateStore::open_default().await?;
    let summary = store.summary().await;
    let reviews = ReviewQueue::open_default()?.list().await?;

    println!("State file:  {}", summary.path.display());
    println!(
        "Cursor:      {}",
        summary
            .cursor
            .map(|c| c.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "(never polled)".to_string())
    );
    println!("Processed:   {}", summary.processed);
    println!("Ignored:     {}", summary.ignored);
    println!("In review:   {}", reviews.len());
    println!();
    println!("Folder:      {}", summary.settings.folder);
    println!("Pattern:     {}", summary.settings.subject_pattern);
    println!(
        "Recipient:   {}",
        summary.settings.notify_recipient.as_deref().unwrap_or("(none)")
    );

    Ok(())
}

/// Clear the processed and ignored sets
async fn reset_state(yes: bool) -> Result<()> {
    let store = StateStore::open_default().await?;
    let summary = store.summary().await;

    if !yes {
        print!(
            "Forget {} processed and {} ignored items? [y/N] ",
            summary.processed, summary.ignored
        );
        io::stdout().flush()?;

        let mut answer = String::new();
        io::stdin()
            .lock()
            .read_line(&mut answer)
            .context("Failed to read confirmation")?;
        if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
            println!("Aborted");
            return Ok(());
        }
    }

    let cleared = store.reset().await?;
    println!(
        "Cleared {} processed and {} ignored items",
        cleared.processed, cleared.ignored
    );
    Ok(())
}

/// Read a local transcript file and pick its title
fn read_local(file: &Path, title: Option<String>) -> Result<(String, String)> {
    let body = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read transcript file: {}", file.display()))?;

    let title = title.unwrap_or_else(|| {
        file.file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default()
    });

    Ok((title, body))
}

/// Classify a local transcript and print the scores
async fn classify_file(file: &Path, title: Option<String>) -> Result<()> {
    let (title, body) = read_local(file, title)?;
    let text = transcript::derive_transcript(&body).unwrap_or(body);
    let settings = StateStore::open_default().await?.settings().await;

    let verdict = classifier::classify(&title, &text, &settings.classifier);

    println!("Title:        {}", title);
    println!("Meeting type: {}", verdict.meeting_type);
    println!("Refinement:   {:.1}", verdict.refinement_score);
    println!("Action:       {:.1}", verdict.action_score);
    if !verdict.title_hits.is_empty() {
        println!("Title hits:   {}", verdict.title_hits.join(", "));
    }
    if !verdict.refinement_hits.is_empty() {
        println!("Story hits:   {}", verdict.refinement_hits.join(", "));
    }
    if !verdict.action_hits.is_empty() {
        println!("Action hits:  {}", verdict.action_hits.join(", "));
    }

    Ok(())
}

/// Run the pipeline on a local transcript
async fn analyze_file(file: &Path, title: Option<String>) -> Result<()> {
    let (title, body) = read_local(file, title)?;
    let settings = StateStore::open_default().await?.settings().await;
    let pipeline = build_pipeline()?;

    let id = format!("local:{}", file.display());
    let artifact = Artifact::new(id, title, Utc::now(), body);

    match pipeline.process(&artifact, &settings).await {
        PipelineReport::NoTranscript => anyhow::bail!(
            "No transcript found in {} (need at least {} characters)",
            file.display(),
            transcript::MIN_TRANSCRIPT_CHARS
        ),
        PipelineReport::AnalysisDisabled => {
            println!("Analysis is disabled; transcript saved only");
        }
        PipelineReport::GenerationFailed { verdict, error } => {
            anyhow::bail!("Generation failed for {} meeting: {}", verdict.meeting_type, error);
        }
        PipelineReport::Routed { verdict, outcome } => {
            let result = outcome.parsed.result();
            println!("Meeting type:  {}", verdict.meeting_type);
            println!("Stories:       {}", result.stories.len());
            println!("Actions:       {}", result.actions.len());
            println!("Tasks:         {:?}", outcome.tasks);
            println!("Review queue:  {:?}", outcome.reviews);
            println!("Notification:  {:?}", outcome.notification);
        }
    }

    Ok(())
}

/// Print the due date a hint resolves to
fn resolve_due(hint: &str, from: Option<NaiveDate>) -> Result<()> {
    let today = from.unwrap_or_else(|| Local::now().date_naive());
    let due = due_date::resolve(Some(hint), today);
    println!("{} ({})", due, due.format("%A"));
    Ok(())
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let cfg = config::config()?;
    let set = |v: &Option<String>| if v.is_some() { "set" } else { "not set" };

    println!("minutes configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:        {}", cfg.home.display());
    println!("  State:       {}", paths::state_file()?.display());
    println!("  Reviews:     {}", paths::reviews_file()?.display());
    println!("  Tasks:       {}", paths::tasks_file()?.display());
    println!("  Transcripts: {}", paths::transcripts_dir()?.display());
    println!("  Mailbox:     {}", cfg.mailbox.display());
    println!();
    println!("Generator:");
    println!(
        "  Base:  {}",
        cfg.generator
            .api_base
            .as_deref()
            .unwrap_or(crate::adapters::generator::DEFAULT_API_BASE)
    );
    println!(
        "  Model: {}",
        cfg.generator
            .model
            .as_deref()
            .unwrap_or(crate::adapters::generator::DEFAULT_MODEL)
    );
    println!("  Key:   {}", set(&cfg.generator.api_key));
    println!();
    println!("Webex:");
    println!("  Bot token:    {}", set(&cfg.webex.bot_token));
    println!("  Access token: {}", set(&cfg.webex.access_token));
    println!();
    println!("Jira:");
    println!("  URL:     {}", cfg.jira.base_url.as_deref().unwrap_or("(not set)"));
    println!("  Project: {}", cfg.jira.project_key.as_deref().unwrap_or("(not set)"));
    println!("  Token:   {}", set(&cfg.jira.api_token));

    Ok(())
}
