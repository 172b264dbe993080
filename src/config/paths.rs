//! Canonical paths for minutes state.
//!
//! Single source of truth - import this instead of hardcoding paths.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use minutes::config::paths;
//!
//! let state = paths::state_file()?;
//! let reviews = paths::reviews_file()?;
//! ```
//!
//! ## Layout
//!
//! | Path | Owner | Purpose |
//! |------|-------|---------|
//! | `state.json` | StateStore | Dedup ledger, cursor, settings |
//! | `state.json.lock` | StateStore | Cross-process write lock |
//! | `reviews.json` | ReviewQueue | Stories held for review |
//! | `tasks.jsonl` | JsonlTaskSink | Created tasks |
//! | `transcripts/` | Pipeline | Saved transcripts |

use std::path::PathBuf;

use anyhow::Result;

/// Get the minutes home directory (~/.minutes)
pub fn home() -> Result<PathBuf> {
    crate::config::minutes_home()
}

/// Get the state document path (~/.minutes/state.json)
pub fn state_file() -> Result<PathBuf> {
    Ok(home()?.join("state.json"))
}

/// Get the review queue path (~/.minutes/reviews.json)
pub fn reviews_file() -> Result<PathBuf> {
    Ok(home()?.join("reviews.json"))
}

/// Get the local task file (~/.minutes/tasks.jsonl)
pub fn tasks_file() -> Result<PathBuf> {
    Ok(home()?.join("tasks.jsonl"))
}

/// Get the saved transcripts directory (~/.minutes/transcripts/)
pub fn transcripts_dir() -> Result<PathBuf> {
    Ok(home()?.join("transcripts"))
}

/// Get the mailbox root (~/.minutes/mailbox/ unless configured)
pub fn mailbox_root() -> Result<PathBuf> {
    crate::config::mailbox_root()
}
