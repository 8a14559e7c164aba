//! Provider collaborators: text generation and speech synthesis.
//!
//! The pipeline only ever talks to two external services, both behind
//! object-safe async traits so tests can substitute deterministic mocks and
//! deployments can swap vendors without touching stage logic:
//!
//! * [`TextGenerator`] — prompt in, raw text out. The text *should* be JSON
//!   but is not guaranteed to be; callers own defensive parsing.
//! * [`SpeechSynthesizer`] — voice id + text in, decoded audio out.
//!
//! Both error types split **transient rate limiting** from everything else,
//! because the two retry policies in this crate branch on exactly that
//! distinction and nothing more.

use crate::audio::AudioClip;
use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

/// Error from a single text-generation call.
#[derive(Debug, Error)]
pub enum TextGenError {
    /// The provider signalled "too many requests"; retryable with backoff.
    #[error("text provider rate limited")]
    RateLimited,
    /// Anything else; not retryable.
    #[error("text provider error: {0}")]
    Failed(String),
}

/// Error from a single speech-synthesis call.
#[derive(Debug, Error)]
pub enum SpeechError {
    /// HTTP 429; retryable with backoff.
    #[error("speech provider rate limited")]
    RateLimited,
    /// Non-success status other than 429; not retryable.
    #[error("speech provider returned {status}: {body}")]
    Http { status: u16, body: String },
    /// Network/transport failure.
    #[error("speech provider transport error: {0}")]
    Transport(String),
}

/// A remote text-generation service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Generate text for a prompt. Returns the provider's raw response
    /// text, fences and all.
    async fn generate(&self, prompt: &str) -> Result<String, TextGenError>;
}

/// A remote text-to-speech service.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Synthesize one utterance with the given voice.
    async fn synthesize(&self, voice_id: &str, text: &str) -> Result<AudioClip, SpeechError>;
}

// ── Gemini text client ───────────────────────────────────────────────────

const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

// Do not change this to a pinned "gemini-2.5-flash": some API keys carry a
// zero quota for the pinned model and every call hard-fails with 429.
const GEMINI_MODEL: &str = "gemini-flash-latest";

/// HTTP client for the Gemini `generateContent` endpoint.
pub struct GeminiTextClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl GeminiTextClient {
    /// Build a client with a bounded per-call timeout.
    pub fn new(api_key: impl Into<String>) -> Result<Self, TextGenError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| TextGenError::Failed(format!("http client: {e}")))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: GEMINI_BASE.to_string(),
        })
    }

    /// Override the endpoint base URL (tests, proxies).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl TextGenerator for GeminiTextClient {
    async fn generate(&self, prompt: &str) -> Result<String, TextGenError> {
        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, GEMINI_MODEL, self.api_key
        );
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": 0.7,
                "responseMimeType": "application/json",
            },
        });

        let resp = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| TextGenError::Failed(format!("request failed: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| TextGenError::Failed(format!("response read failed: {e}")))?;

        if status.as_u16() == 429 || text.contains("RESOURCE_EXHAUSTED") {
            return Err(TextGenError::RateLimited);
        }
        if !status.is_success() {
            let snippet: String = text.chars().take(200).collect();
            return Err(TextGenError::Failed(format!("{status}: {snippet}")));
        }

        let parsed: serde_json::Value = serde_json::from_str(&text)
            .map_err(|e| TextGenError::Failed(format!("malformed response envelope: {e}")))?;
        let content = parsed["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| TextGenError::Failed("response has no candidate text".into()))?;

        debug!("text provider returned {} chars", content.len());
        Ok(content.trim().to_string())
    }
}

// ── ElevenLabs speech client ─────────────────────────────────────────────

const ELEVENLABS_BASE: &str = "https://api.elevenlabs.io/v1";
const TTS_MODEL: &str = "eleven_turbo_v2";

/// HTTP client for the ElevenLabs text-to-speech endpoint.
///
/// Requests `pcm_22050` output so response bytes map directly into an
/// [`AudioClip`] without an MP3 decode step.
pub struct ElevenLabsClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl ElevenLabsClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self, SpeechError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| SpeechError::Transport(format!("http client: {e}")))?;
        Ok(Self {
            http,
            api_key: api_key.into(),
            base_url: ELEVENLABS_BASE.to_string(),
        })
    }

    /// Override the endpoint base URL (tests, proxies).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    async fn synthesize(&self, voice_id: &str, text: &str) -> Result<AudioClip, SpeechError> {
        let url = format!(
            "{}/text-to-speech/{}?output_format=pcm_22050",
            self.base_url, voice_id
        );
        let body = serde_json::json!({
            "text": text,
            "model_id": TTS_MODEL,
            "voice_settings": { "stability": 0.5, "similarity_boost": 0.75 },
        });

        let resp = self
            .http
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| SpeechError::Transport(e.to_string()))?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(SpeechError::RateLimited);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(SpeechError::Http {
                status: status.as_u16(),
                body: snippet,
            });
        }

        let bytes = resp
            .bytes()
            .await
            .map_err(|e| SpeechError::Transport(e.to_string()))?;
        debug!("speech provider returned {} bytes", bytes.len());
        Ok(AudioClip::from_pcm16_bytes(&bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_errors_distinguish_rate_limits() {
        assert!(matches!(TextGenError::RateLimited, TextGenError::RateLimited));
        let e = TextGenError::Failed("400: bad request".into());
        assert!(e.to_string().contains("400"));
    }

    #[test]
    fn speech_http_error_carries_status() {
        let e = SpeechError::Http {
            status: 401,
            body: "invalid key".into(),
        };
        assert!(e.to_string().contains("401"));
        assert!(e.to_string().contains("invalid key"));
    }
}
