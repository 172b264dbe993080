//! Mailbox watch command.
//!
//! - `minutes watch` - poll continuously, asking for approval on the terminal
//! - `minutes watch --auto-approve` / `--auto-decline` - unattended runs
//! - `minutes watch --once` - one poll, then exit

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::Result;
use chrono::Local;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::adapters::DirectoryMailbox;
use crate::config::paths;
use crate::core::{
    spawn_auto_responder, ApprovalGate, ApprovalRequest, PollSummary, SourceMonitor, StateStore,
};

/// Run the watch command
pub async fn execute(auto_approve: bool, auto_decline: bool, once: bool) -> Result<()> {
    let state = Arc::new(StateStore::open_default().await?);
    let mailbox = Arc::new(DirectoryMailbox::new(paths::mailbox_root()?));
    let pipeline = Arc::new(super::build_pipeline()?);

    let (gate, requests) = ApprovalGate::new();
    let surface = if auto_approve {
        spawn_auto_responder(gate.clone(), requests, true)
    } else if auto_decline {
        spawn_auto_responder(gate.clone(), requests, false)
    } else {
        spawn_terminal_surface(gate.clone(), requests)
    };

    let settings = state.settings().await;
    let root = mailbox.root().join(&settings.folder);
    let monitor = SourceMonitor::new(mailbox, state, gate, pipeline);

    if once {
        println!("📂 Polling once: {}", root.display());
        let summary = monitor.poll_once().await?;
        print_summary(&summary);
        surface.abort();
        return Ok(());
    }

    monitor.start().await?;
    println!("👁️  Watching: {}", root.display());
    println!("    Subject: {}", settings.subject_pattern);
    println!("    Press Ctrl+C to stop");
    println!();

    tokio::signal::ctrl_c().await.ok();

    println!();
    println!("🛑 Stopping monitor (finishing the current item)...");
    monitor.stop().await?;
    surface.abort();

    Ok(())
}

fn print_summary(summary: &PollSummary) {
    println!(
        "✅ Listed {}, processed {}, ignored {}",
        summary.listed, summary.processed, summary.ignored
    );
    if summary.already_handled > 0 {
        println!("ℹ️  {} already handled", summary.already_handled);
    }
    if summary.unmatched > 0 {
        println!("ℹ️  {} with a non-matching subject", summary.unmatched);
    }
    if summary.errors > 0 {
        println!("⚠️  {} error(s), see log", summary.errors);
    }
}

/// Ask on the terminal for each request. A prompt stops waiting for input
/// once its request has timed out, and aborting the task ends the read.
fn spawn_terminal_surface(
    gate: ApprovalGate,
    mut requests: mpsc::Receiver<ApprovalRequest>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();

        while let Some(request) = requests.recv().await {
            println!();
            println!("📨 {}", request.subject);
            println!(
                "   Received {} (declines in {}s)",
                request.received_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                request.timeout.as_secs()
            );
            print!("   Process this meeting? [y/N] ");
            io::stdout().flush().ok();

            let approved = match tokio::time::timeout(request.timeout, lines.next_line()).await {
                Ok(Ok(Some(line))) => matches!(line.trim().to_lowercase().as_str(), "y" | "yes"),
                Ok(Ok(None)) | Ok(Err(_)) => false,
                Err(_) => {
                    println!();
                    println!("   ⏱️  No answer, declined");
                    continue;
                }
            };

            if gate.resolve(&request.artifact_id, approved).await.is_err() {
                println!("   ⏱️  Too late, the request already timed out");
            }
        }
    })
}
