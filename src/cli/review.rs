//! Review queue CLI commands.
//!
//! Stories and action items extracted from meetings are held until someone
//! files or drops them:
//! - `minutes review list` - Show held items
//! - `minutes review post <ids..>` - File items with the issue tracker
//! - `minutes review drop <ids..>` - Discard items

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::adapters::JiraTracker;
use crate::config;
use crate::core::{ReviewItem, ReviewQueue};

/// Review subcommands
#[derive(Subcommand, Debug)]
pub enum ReviewCommands {
    /// List items waiting for review
    List,

    /// File items with the issue tracker (stories as Story, actions as Task)
    Post {
        /// Pending item ids
        #[arg(required = true)]
        ids: Vec<String>,

        /// Project key (defaults to the configured project)
        #[arg(short, long)]
        project: Option<String>,
    },

    /// Discard items without filing them
    Drop {
        /// Pending item ids
        #[arg(required = true)]
        ids: Vec<String>,
    },
}

/// Execute a review command
pub async fn execute(command: ReviewCommands) -> Result<()> {
    let queue = ReviewQueue::open_default()?;
    match command {
        ReviewCommands::List => execute_list(&queue).await,
        ReviewCommands::Post { ids, project } => execute_post(&queue, &ids, project).await,
        ReviewCommands::Drop { ids } => execute_drop(&queue, &ids).await,
    }
}

async fn execute_list(queue: &ReviewQueue) -> Result<()> {
    let pending = queue.list().await?;
    if pending.is_empty() {
        println!("Nothing waiting for review");
        return Ok(());
    }

    for entry in &pending {
        let detail = match &entry.item {
            ReviewItem::Story(story) => story
                .estimate_points
                .map(|p| format!("{} pts", p))
                .unwrap_or_else(|| "unestimated".to_string()),
            ReviewItem::Action(action) => action
                .owner
                .clone()
                .unwrap_or_else(|| "unassigned".to_string()),
        };
        println!(
            "{}  [{}] {}  ({})",
            entry.id,
            entry.item.kind(),
            entry.item.summary(),
            detail
        );
        println!(
            "          from \"{}\" on {}",
            entry.meeting_title,
            entry.queued_at.format("%Y-%m-%d")
        );
        if let ReviewItem::Story(story) = &entry.item {
            for criterion in &story.acceptance_criteria {
                println!("          - {}", criterion);
            }
        }
    }
    println!();
    println!("{} items held", pending.len());

    Ok(())
}

async fn execute_post(queue: &ReviewQueue, ids: &[String], project: Option<String>) -> Result<()> {
    let cfg = config::config()?;
    let project = project
        .or_else(|| cfg.jira.project_key.clone())
        .context("No project key: pass --project or set MINUTES_JIRA_PROJECT")?;

    let tracker = Arc::new(JiraTracker::new(cfg.jira.clone()));
    let report = queue.post(ids, tracker, &project).await?;

    for (id, key) in &report.created {
        println!("✅ {} → {}", id, key);
    }
    for (id, error) in &report.failed {
        println!("❌ {}: {}", id, error);
    }

    if !report.failed.is_empty() {
        anyhow::bail!("{} of {} items failed to post", report.failed.len(), ids.len());
    }
    Ok(())
}

async fn execute_drop(queue: &ReviewQueue, ids: &[String]) -> Result<()> {
    let removed = queue.discard(ids).await?;
    println!("Dropped {} of {} items", removed, ids.len());
    Ok(())
}
