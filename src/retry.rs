//! Linear-backoff retry for text-generation calls.
//!
//! ## Retry Strategy
//!
//! Rate-limit windows on text providers are minute-granular, so the waits
//! grow linearly (`base × attempt`: 60 s → 120 s → 180 s with the default
//! base) rather than exponentially — the first retry already waits long
//! enough to clear a window, and doubling from there would stall jobs for
//! no benefit. Any non-rate-limit failure escalates immediately: a 400 or a
//! malformed request does not get better by waiting.
//!
//! The speech-synthesis stage has its own, differently shaped policy
//! (exponential, seconds-scale, in `pipeline/synth.rs`). The two are kept as
//! two instances of a retry *pattern*, not one shared object, because their
//! backoff curves and failure handling genuinely differ.

use crate::error::PodcastError;
use crate::providers::TextGenError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Parameters for [`call_with_retry`].
#[derive(Debug, Clone, Copy)]
pub struct TextRetryPolicy {
    /// Total attempts, including the first. Minimum 1.
    pub max_attempts: u32,
    /// Linear backoff base; attempt `n` waits `base × n` before retrying.
    pub backoff_base: Duration,
}

impl Default for TextRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            backoff_base: Duration::from_secs(60),
        }
    }
}

/// Call a text-generation operation with bounded retries.
///
/// * Rate-limit failures wait `base × attempt` and retry, up to
///   `max_attempts`.
/// * Exhausting all attempts on rate limits escalates
///   [`PodcastError::RateLimitExhausted`], distinguishable from a generic
///   failure so callers can message users about waiting.
/// * Any other failure escalates immediately as
///   [`PodcastError::GenerationFailed`] carrying the original cause.
pub async fn call_with_retry<T, F, Fut>(
    mut op: F,
    policy: &TextRetryPolicy,
) -> Result<T, PodcastError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, TextGenError>>,
{
    let max_attempts = policy.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(TextGenError::RateLimited) => {
                if attempt == max_attempts {
                    break;
                }
                let wait = policy.backoff_base * attempt;
                warn!(
                    "Rate limit hit. Waiting {:?} (attempt {}/{})...",
                    wait, attempt, max_attempts
                );
                sleep(wait).await;
            }
            Err(TextGenError::Failed(detail)) => {
                return Err(PodcastError::GenerationFailed { detail });
            }
        }
    }

    Err(PodcastError::RateLimitExhausted {
        attempts: max_attempts,
    })
}
