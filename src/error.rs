//! Error types for the papercast library.
//!
//! The taxonomy mirrors how the pipeline recovers (or doesn't):
//!
//! * **Configuration errors** ([`PodcastError::MissingCredential`],
//!   [`PodcastError::InvalidConfig`]) — fatal to the job at the stage that
//!   needs the setting; the message names the setting so it is actionable.
//!
//! * **Transient provider errors** — handled *inside* the stage retry
//!   policies and never surface here. Only the exhausted form escalates, as
//!   [`PodcastError::RateLimitExhausted`], which callers can distinguish from
//!   a generic failure to tell users to wait before retrying.
//!
//! * **Permanent provider errors** — text generation degrades to documented
//!   fallback content and never aborts script assembly; speech synthesis has
//!   no cheap substitute once a real attempt was made, so it escalates as
//!   [`PodcastError::SynthesisFailed`] and kills the job. The asymmetry is
//!   deliberate.
//!
//! Anything a stage raises is caught by the job orchestrator and becomes the
//! job's terminal `Error` state; it never crosses into other jobs.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors raised by the papercast pipeline.
#[derive(Debug, Error)]
pub enum PodcastError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// No parsed document exists for the requested job id.
    #[error("No parsed document found for job '{job_id}'.\nIngest a paper first.")]
    DocumentNotFound { job_id: String },

    /// No job exists under the requested id.
    #[error("No job found for '{job_id}'.\nStart podcast generation first.")]
    JobNotFound { job_id: String },

    // ── Configuration errors ──────────────────────────────────────────────
    /// A stage needs a provider credential that is not configured.
    #[error("Missing credential: {setting} is not set.\n{hint}")]
    MissingCredential { setting: String, hint: String },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Text-generation errors ────────────────────────────────────────────
    /// The text provider failed with a non-retryable error.
    #[error("Text generation failed: {detail}")]
    GenerationFailed { detail: String },

    /// Every retry hit the provider's rate limit.
    ///
    /// Distinct from [`PodcastError::GenerationFailed`] so callers can tell
    /// users to wait rather than to fix their request.
    #[error(
        "Text provider rate limit exceeded after {attempts} attempts.\n\
         Please wait a couple of minutes and try again."
    )]
    RateLimitExhausted { attempts: u32 },

    // ── Speech-synthesis errors ───────────────────────────────────────────
    /// Speech synthesis failed hard (non-2xx other than 429, or retries
    /// exhausted). Aborts the job; there is no partial-audio fallback.
    #[error("Speech synthesis failed: {detail}")]
    SynthesisFailed { detail: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not write the mixed audio or caption artifact.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}
