//! # papercast
//!
//! Turn a parsed academic paper into a two-host podcast episode.
//!
//! ## Why this crate?
//!
//! Reading a dense paper takes an hour; listening to two hosts argue about
//! it takes fifteen minutes. This crate takes the structured output of a PDF
//! parsing service and produces a complete episode: a chaptered two-host
//! script, per-line speech audio, a mixed track with background music, a
//! WebVTT caption file, chapter timestamps, and study materials with a
//! gradeable quiz.
//!
//! ## Pipeline Overview
//!
//! ```text
//! ParsedDocument
//!  │
//!  ├─ 1. Script   outline → per-chapter dialogue → study guide + quiz
//!  ├─ 2. Synth    one TTS call per line, retried on 429
//!  ├─ 3. Mix      speech + pauses, ducked music bed, intro swell
//!  └─ 4. Output   {job}.wav + {job}.vtt + chapter timestamps
//! ```
//!
//! Script generation degrades gracefully: malformed provider output falls
//! back to documented skeleton content and the episode still ships. Speech
//! synthesis does not: a hard provider failure kills the job, because a
//! half-silent episode is worse than no episode.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use papercast::{
//!     GeminiTextClient, InMemoryDocumentSource, Orchestrator, PipelineConfig, VoicePairing,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let docs = Arc::new(InMemoryDocumentSource::new());
//!     // docs.insert(parsed_document);
//!     let text = Arc::new(GeminiTextClient::new(std::env::var("GOOGLE_API_KEY")?)?);
//!     let orchestrator = Orchestrator::new(docs, Some(text), None, PipelineConfig::default());
//!
//!     orchestrator.start_generation("job-1", VoicePairing::default()).await?;
//!     let job = orchestrator.wait("job-1").await;
//!     println!("{:?}", job.and_then(|j| j.audio));
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `papercast` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! papercast = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod audio;
pub mod config;
pub mod error;
pub mod job;
pub mod model;
pub mod pipeline;
pub mod prompts;
pub mod providers;
pub mod retry;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use audio::{AudioClip, SAMPLE_RATE};
pub use config::{PipelineConfig, PipelineConfigBuilder};
pub use error::PodcastError;
pub use job::{DocumentSource, InMemoryDocumentSource, Job, JobStore, Orchestrator};
pub use model::{
    grade_quiz, CaptionCue, Chapter, DialogueLine, JobStatus, ParsedDocument, ParsedSection,
    PodcastAudio, PodcastScript, QuizQuestion, QuizResult, QuizSubmission, Speaker,
    TimestampedChapter, VoicePairing,
};
pub use providers::{ElevenLabsClient, GeminiTextClient, SpeechSynthesizer, TextGenerator};
