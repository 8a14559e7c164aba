//! Synthesis Coordinator: dialogue lines → ordered audio segments.
//!
//! Lines are processed strictly in script order with no parallel dispatch.
//! Ordering is the backbone of the downstream timeline: captions and chapter
//! boundaries are computed purely from sequence position and cumulative
//! duration, and the sequential loop also keeps the request rate inside the
//! speech provider's budget (a small pacing delay follows every successful
//! call).
//!
//! ## Retry Strategy
//!
//! HTTP 429 gets exponential backoff (`unit × 2^attempt`: 1 s → 2 s → 4 s
//! with the default unit) for up to 3 attempts. Any other non-success
//! escalates at once and aborts the whole stage — once a real synthesis
//! attempt has been made there is no acceptable fallback audio, unlike the
//! text stages where substitute content is cheap. This policy is deliberately
//! separate from the linear policy in [`crate::retry`]; the two backoff
//! shapes serve different providers and must not be merged.
//!
//! With no synthesizer configured the coordinator produces placeholder tone
//! sequences marked `synthetic`, which keeps the whole pipeline runnable
//! without credentials.

use crate::audio::AudioClip;
use crate::config::PipelineConfig;
use crate::error::PodcastError;
use crate::model::{PodcastScript, Speaker, VoicePairing};
use crate::providers::{SpeechError, SpeechSynthesizer};
use rand::Rng;
use tokio::time::sleep;
use tracing::{info, warn};

/// One synthesised dialogue line, in script order.
#[derive(Debug, Clone)]
pub struct SynthesisedLine {
    pub speaker: Speaker,
    pub text: String,
    pub audio: AudioClip,
    pub duration_ms: u64,
    pub chapter_id: Option<u32>,
    /// True when the audio is a placeholder tone sequence rather than
    /// provider speech.
    pub synthetic: bool,
}

/// Synthesise every dialogue line of a script.
///
/// `synthesizer = None` means no speech credential is configured; every
/// line gets synthetic placeholder audio. Lines that are empty after
/// trimming are skipped entirely (no audio, no caption).
pub async fn synthesise_script(
    synthesizer: Option<&dyn SpeechSynthesizer>,
    script: &PodcastScript,
    pairing: VoicePairing,
    config: &PipelineConfig,
) -> Result<Vec<SynthesisedLine>, PodcastError> {
    if script.dialogue.is_empty() {
        warn!("[{}] Script has no dialogue lines", script.job_id);
        return Ok(Vec::new());
    }

    let (voice_a, voice_b) = config.voice_ids_for(pairing);
    let total = script.dialogue.len();
    let mut synthesised = Vec::with_capacity(total);

    for (idx, line) in script.dialogue.iter().enumerate() {
        let text = line.text.trim();
        if text.is_empty() {
            continue;
        }

        let voice_id = match line.speaker {
            Speaker::A => voice_a,
            Speaker::B => voice_b,
        };
        info!(
            "Synthesising line {}/{} for Host {}",
            idx + 1,
            total,
            line.speaker
        );

        let (audio, synthetic) = match synthesizer {
            None => (synthetic_speech(text), true),
            Some(synth) => (synthesize_with_retry(synth, voice_id, text, config).await?, false),
        };

        synthesised.push(SynthesisedLine {
            speaker: line.speaker,
            text: text.to_string(),
            duration_ms: audio.len_ms(),
            audio,
            chapter_id: line.chapter_id,
            synthetic,
        });

        sleep(config.line_pacing).await;
    }

    info!(
        "[{}] Synthesis complete: {} segments",
        script.job_id,
        synthesised.len()
    );
    Ok(synthesised)
}

/// Call the provider with exponential backoff on 429.
///
/// Transport blips are retried with a single backoff unit; a non-success
/// HTTP status other than 429 fails immediately.
async fn synthesize_with_retry(
    synth: &dyn SpeechSynthesizer,
    voice_id: &str,
    text: &str,
    config: &PipelineConfig,
) -> Result<AudioClip, PodcastError> {
    let max_attempts = config.speech_max_attempts.max(1);
    let mut last_err = String::new();

    for attempt in 0..max_attempts {
        match synth.synthesize(voice_id, text).await {
            Ok(audio) => return Ok(audio),
            Err(SpeechError::RateLimited) => {
                last_err = "rate limited".into();
                if attempt + 1 == max_attempts {
                    break;
                }
                let wait = config.speech_backoff_unit * 2u32.pow(attempt);
                warn!(
                    "Speech rate limited; waiting {:?} (attempt {}/{})",
                    wait,
                    attempt + 1,
                    max_attempts
                );
                sleep(wait).await;
            }
            Err(e @ SpeechError::Http { .. }) => {
                return Err(PodcastError::SynthesisFailed {
                    detail: e.to_string(),
                });
            }
            Err(SpeechError::Transport(detail)) => {
                warn!(
                    "Speech transport error (attempt {}/{}): {}",
                    attempt + 1,
                    max_attempts,
                    detail
                );
                last_err = detail;
                if attempt + 1 < max_attempts {
                    sleep(config.speech_backoff_unit).await;
                }
            }
        }
    }

    Err(PodcastError::SynthesisFailed {
        detail: format!("provider failed after {max_attempts} attempts: {last_err}"),
    })
}

/// Placeholder audio: a randomized beep sequence sized to the text.
///
/// Total length is ~150 ms per word with a 1 second floor, so placeholder
/// timelines still resemble real speech pacing closely enough to exercise
/// captioning and mixing.
fn synthetic_speech(text: &str) -> AudioClip {
    let word_count = text.split_whitespace().count() as u64;
    let total_ms = (word_count * 150).max(1000);

    let mut rng = rand::thread_rng();
    let mut output = AudioClip::empty();
    let mut elapsed_ms = 0u64;

    while elapsed_ms < total_ms {
        let freq = rng.gen_range(200..=800) as f32;
        let duration = rng.gen_range(100..=300u64);
        let gap = rng.gen_range(50..=150u64);
        let gain = rng.gen_range(-3.0..=0.0f32);

        let tone = AudioClip::sine(freq, duration, 0.5).gain_db(gain);
        output.append(&tone);
        output.append_silence(gap);
        elapsed_ms += duration + gap;
    }

    output.fade_in(100).fade_out(100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Chapter, DialogueLine};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn script(lines: Vec<(Speaker, &str, Option<u32>)>) -> PodcastScript {
        PodcastScript {
            job_id: "job-1".into(),
            paper_title: "On Things".into(),
            paper_authors: "Doe".into(),
            total_estimated_duration_sec: 60,
            chapters: vec![Chapter {
                id: 1,
                title: "Only".into(),
                estimated_duration_sec: 60,
                line_start: 0,
                line_end: lines.len().saturating_sub(1),
            }],
            dialogue: lines
                .into_iter()
                .map(|(speaker, text, chapter_id)| DialogueLine {
                    speaker,
                    text: text.into(),
                    chapter_id,
                })
                .collect(),
            study_guide: "guide".into(),
            quiz_questions: vec![],
        }
    }

    fn quick_config() -> PipelineConfig {
        PipelineConfig::builder()
            .no_pacing()
            .voice_ids("ma", "mb", "fa", "fb")
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn no_synthesizer_yields_marked_synthetic_audio() {
        let s = script(vec![
            (Speaker::A, "Welcome to the show everyone", Some(1)),
            (Speaker::B, "Happy to be here", Some(1)),
        ]);
        let out = synthesise_script(None, &s, VoicePairing::FemaleMale, &quick_config())
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
        for line in &out {
            assert!(line.synthetic);
            assert!(line.duration_ms >= 1000, "got {}", line.duration_ms);
            assert_eq!(line.chapter_id, Some(1));
        }
        assert_eq!(out[0].speaker, Speaker::A);
        assert_eq!(out[1].speaker, Speaker::B);
    }

    #[tokio::test]
    async fn empty_lines_are_skipped() {
        let s = script(vec![
            (Speaker::A, "Hello there", Some(1)),
            (Speaker::B, "   ", Some(1)),
            (Speaker::A, "", Some(1)),
            (Speaker::B, "Still here", Some(1)),
        ]);
        let out = synthesise_script(None, &s, VoicePairing::FemaleMale, &quick_config())
            .await
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].text, "Hello there");
        assert_eq!(out[1].text, "Still here");
    }

    /// Records the voice id used for each call.
    struct RecordingSynth {
        voices: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl SpeechSynthesizer for RecordingSynth {
        async fn synthesize(&self, voice_id: &str, _text: &str) -> Result<AudioClip, SpeechError> {
            self.voices.lock().push(voice_id.to_string());
            Ok(AudioClip::silent(1200))
        }
    }

    #[tokio::test]
    async fn voice_pairing_maps_speakers_to_voices() {
        let s = script(vec![
            (Speaker::A, "First line", Some(1)),
            (Speaker::B, "Second line", Some(1)),
        ]);
        let synth = RecordingSynth {
            voices: Mutex::new(vec![]),
        };
        let out = synthesise_script(
            Some(&synth),
            &s,
            VoicePairing::FemaleMale,
            &quick_config(),
        )
        .await
        .unwrap();
        assert_eq!(*synth.voices.lock(), vec!["fa".to_string(), "mb".to_string()]);
        assert!(out.iter().all(|l| !l.synthetic));
    }

    /// Rate-limits the first `limit_count` calls, then succeeds.
    struct FlakySynth {
        calls: AtomicU32,
        limit_count: u32,
    }

    #[async_trait]
    impl SpeechSynthesizer for FlakySynth {
        async fn synthesize(&self, _voice: &str, _text: &str) -> Result<AudioClip, SpeechError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.limit_count {
                Err(SpeechError::RateLimited)
            } else {
                Ok(AudioClip::silent(800))
            }
        }
    }

    #[tokio::test]
    async fn rate_limit_retries_then_succeeds() {
        let s = script(vec![(Speaker::A, "One line", Some(1))]);
        let synth = FlakySynth {
            calls: AtomicU32::new(0),
            limit_count: 2,
        };
        let out = synthesise_script(
            Some(&synth),
            &s,
            VoicePairing::FemaleMale,
            &quick_config(),
        )
        .await
        .unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(synth.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausted_rate_limits_abort_the_stage() {
        let s = script(vec![(Speaker::A, "One line", Some(1))]);
        let synth = FlakySynth {
            calls: AtomicU32::new(0),
            limit_count: 100,
        };
        let err = synthesise_script(
            Some(&synth),
            &s,
            VoicePairing::FemaleMale,
            &quick_config(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, PodcastError::SynthesisFailed { .. }));
        assert_eq!(synth.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn no_backoff_wait_after_the_final_attempt() {
        let s = script(vec![(Speaker::A, "One line", Some(1))]);
        let synth = FlakySynth {
            calls: AtomicU32::new(0),
            limit_count: 100,
        };
        let config = PipelineConfig::builder()
            .voice_ids("ma", "mb", "fa", "fb")
            .speech_backoff_unit(Duration::from_secs(1))
            .line_pacing(Duration::ZERO)
            .build()
            .unwrap();
        let start = tokio::time::Instant::now();
        let err = synthesise_script(Some(&synth), &s, VoicePairing::FemaleMale, &config)
            .await
            .unwrap_err();
        assert!(matches!(err, PodcastError::SynthesisFailed { .. }));
        // 1 s + 2 s between the three attempts; no wait after the last.
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    /// Always returns a hard HTTP failure.
    struct BrokenSynth;

    #[async_trait]
    impl SpeechSynthesizer for BrokenSynth {
        async fn synthesize(&self, _voice: &str, _text: &str) -> Result<AudioClip, SpeechError> {
            Err(SpeechError::Http {
                status: 401,
                body: "invalid key".into(),
            })
        }
    }

    #[tokio::test]
    async fn hard_http_failure_aborts_immediately() {
        let s = script(vec![(Speaker::A, "One line", Some(1))]);
        let err = synthesise_script(
            Some(&BrokenSynth),
            &s,
            VoicePairing::FemaleMale,
            &quick_config(),
        )
        .await
        .unwrap_err();
        match err {
            PodcastError::SynthesisFailed { detail } => assert!(detail.contains("401")),
            other => panic!("expected SynthesisFailed, got {other:?}"),
        }
    }

    #[test]
    fn synthetic_speech_scales_with_word_count() {
        let short = synthetic_speech("hi");
        assert!(short.len_ms() >= 1000);

        let long_text = vec!["word"; 40].join(" ");
        let long = synthetic_speech(&long_text);
        // 40 words × 150 ms = 6000 ms floor; tone/gap granularity may
        // overshoot slightly.
        assert!(long.len_ms() >= 6000, "got {}", long.len_ms());
    }
}
