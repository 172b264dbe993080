//! Meeting artifact ingestion.
//!
//! Turns raw mailbox bodies into transcripts and meeting titles:
//!
//! ```text
//! Mailbox body (VTT | HTML | text) → transcript → classifier / generator
//! Mailbox subject                  → meeting title
//! ```

pub mod transcript;

// Re-export key functions
pub use transcript::{derive_transcript, normalize_title, recording_link, MIN_TRANSCRIPT_CHARS};
