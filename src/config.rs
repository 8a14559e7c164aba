//! Configuration for the podcast generation pipeline.
//!
//! All pipeline behaviour is controlled through [`PipelineConfig`], built via
//! its [`PipelineConfigBuilder`]. Keeping every knob in one struct makes it
//! trivial to share configs across jobs and to shrink every pacing delay to
//! zero in tests.
//!
//! # Design choice: builder over constructor
//! The struct has over a dozen fields and grows whenever a stage gains a
//! knob. The builder lets callers set only what they care about and rely on
//! documented defaults for the rest.
//!
//! Provider credentials are deliberately *not* part of this struct: the
//! orchestrator takes provider trait objects, and whoever constructs those
//! (the CLI, a server, a test) owns credential resolution.

use crate::error::PodcastError;
use crate::model::VoicePairing;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for one pipeline run (shared across jobs).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Directory where mixed audio and caption files are written.
    /// Default: `./outputs`.
    pub output_dir: PathBuf,

    /// Directory searched for `background_music.wav`. Default:
    /// `./audio_assets`. A missing asset is substituted with silence, never
    /// an error.
    pub assets_dir: PathBuf,

    // ── Voice identities ─────────────────────────────────────────────────
    /// Speech-provider voice ids, resolved from the requested
    /// [`VoicePairing`]. The defaults are the provider's stock sample
    /// voices; production deployments replace them.
    pub voice_id_male_a: String,
    pub voice_id_male_b: String,
    pub voice_id_female_a: String,
    pub voice_id_female_b: String,

    // ── Text-generation retry policy (linear backoff) ────────────────────
    /// Maximum attempts per text-generation call. Default: 4.
    pub text_max_attempts: u32,

    /// Base delay for linear backoff on rate-limit responses; attempt `n`
    /// waits `base × n`. Default: 60 s.
    ///
    /// Rate-limit windows on free-tier text providers are minute-granular,
    /// so sub-minute retries just burn attempts. Tests shrink this to zero.
    pub text_backoff_base: Duration,

    // ── Speech-synthesis retry policy (exponential backoff) ──────────────
    /// Attempts per synthesis call before the stage aborts. Default: 3.
    pub speech_max_attempts: u32,

    /// Unit for exponential backoff on HTTP 429; attempt `n` waits
    /// `unit × 2^n`. Default: 1 s.
    pub speech_backoff_unit: Duration,

    // ── Pacing delays (throughput throttles, not waits on a resource) ────
    /// Delay between the three script-assembly sub-stages. Default: 8 s.
    pub stage_pacing: Duration,

    /// Delay between successive per-chapter dialogue calls. Default: 10 s.
    pub chapter_pacing: Duration,

    /// Delay after each successful synthesis call. Default: 200 ms.
    pub line_pacing: Duration,

    // ── Mixing constants ─────────────────────────────────────────────────
    /// Silence inserted after every spoken line. Default: 600 ms.
    pub speaker_pause_ms: u64,

    /// Music-only intro length. Default: 4000 ms.
    pub intro_ms: u64,

    /// Fade length for the intro swell. Default: 1000 ms.
    pub fade_ms: u64,

    /// Background music baseline level. Default: −24 dB.
    pub music_volume_db: f32,

    /// Background music level under active speech. Default: −32 dB.
    pub music_duck_db: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("./outputs"),
            assets_dir: PathBuf::from("./audio_assets"),
            voice_id_male_a: "pNInz6obpgDQGcFmaJgB".into(),
            voice_id_male_b: "VR6AewLTigWG4xSOukaG".into(),
            voice_id_female_a: "EXAVITQu4vr4xnSDxMaL".into(),
            voice_id_female_b: "MF3mGyEYCl7XYWbV9V6O".into(),
            text_max_attempts: 4,
            text_backoff_base: Duration::from_secs(60),
            speech_max_attempts: 3,
            speech_backoff_unit: Duration::from_secs(1),
            stage_pacing: Duration::from_secs(8),
            chapter_pacing: Duration::from_secs(10),
            line_pacing: Duration::from_millis(200),
            speaker_pause_ms: 600,
            intro_ms: 4000,
            fade_ms: 1000,
            music_volume_db: -24.0,
            music_duck_db: -32.0,
        }
    }
}

impl PipelineConfig {
    /// Create a new builder.
    pub fn builder() -> PipelineConfigBuilder {
        PipelineConfigBuilder {
            config: Self::default(),
        }
    }

    /// Resolve a voice pairing to concrete (host A, host B) voice ids.
    pub fn voice_ids_for(&self, pairing: VoicePairing) -> (&str, &str) {
        match pairing {
            VoicePairing::MaleMale => (&self.voice_id_male_a, &self.voice_id_male_b),
            VoicePairing::FemaleMale => (&self.voice_id_female_a, &self.voice_id_male_b),
            VoicePairing::FemaleFemale => (&self.voice_id_female_a, &self.voice_id_female_b),
        }
    }
}

/// Builder for [`PipelineConfig`].
#[derive(Debug)]
pub struct PipelineConfigBuilder {
    config: PipelineConfig,
}

impl PipelineConfigBuilder {
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn assets_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.assets_dir = dir.into();
        self
    }

    pub fn voice_ids(
        mut self,
        male_a: impl Into<String>,
        male_b: impl Into<String>,
        female_a: impl Into<String>,
        female_b: impl Into<String>,
    ) -> Self {
        self.config.voice_id_male_a = male_a.into();
        self.config.voice_id_male_b = male_b.into();
        self.config.voice_id_female_a = female_a.into();
        self.config.voice_id_female_b = female_b.into();
        self
    }

    pub fn text_max_attempts(mut self, n: u32) -> Self {
        self.config.text_max_attempts = n.max(1);
        self
    }

    pub fn text_backoff_base(mut self, d: Duration) -> Self {
        self.config.text_backoff_base = d;
        self
    }

    pub fn speech_max_attempts(mut self, n: u32) -> Self {
        self.config.speech_max_attempts = n.max(1);
        self
    }

    pub fn speech_backoff_unit(mut self, d: Duration) -> Self {
        self.config.speech_backoff_unit = d;
        self
    }

    pub fn stage_pacing(mut self, d: Duration) -> Self {
        self.config.stage_pacing = d;
        self
    }

    pub fn chapter_pacing(mut self, d: Duration) -> Self {
        self.config.chapter_pacing = d;
        self
    }

    pub fn line_pacing(mut self, d: Duration) -> Self {
        self.config.line_pacing = d;
        self
    }

    pub fn speaker_pause_ms(mut self, ms: u64) -> Self {
        self.config.speaker_pause_ms = ms;
        self
    }

    pub fn intro_ms(mut self, ms: u64) -> Self {
        self.config.intro_ms = ms;
        self
    }

    pub fn fade_ms(mut self, ms: u64) -> Self {
        self.config.fade_ms = ms;
        self
    }

    pub fn music_volume_db(mut self, db: f32) -> Self {
        self.config.music_volume_db = db;
        self
    }

    pub fn music_duck_db(mut self, db: f32) -> Self {
        self.config.music_duck_db = db;
        self
    }

    /// Disable every pacing delay and backoff wait. Intended for tests.
    pub fn no_pacing(mut self) -> Self {
        self.config.text_backoff_base = Duration::ZERO;
        self.config.speech_backoff_unit = Duration::ZERO;
        self.config.stage_pacing = Duration::ZERO;
        self.config.chapter_pacing = Duration::ZERO;
        self.config.line_pacing = Duration::ZERO;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PipelineConfig, PodcastError> {
        let c = &self.config;
        if c.music_duck_db > c.music_volume_db {
            return Err(PodcastError::InvalidConfig(format!(
                "Duck level ({} dB) must not be louder than the music baseline ({} dB)",
                c.music_duck_db, c.music_volume_db
            )));
        }
        if c.fade_ms * 2 > c.intro_ms {
            return Err(PodcastError::InvalidConfig(format!(
                "Intro ({} ms) is too short for a {} ms fade-in and fade-out",
                c.intro_ms, c.fade_ms
            )));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let c = PipelineConfig::default();
        assert_eq!(c.text_max_attempts, 4);
        assert_eq!(c.text_backoff_base, Duration::from_secs(60));
        assert_eq!(c.speech_max_attempts, 3);
        assert_eq!(c.speaker_pause_ms, 600);
        assert_eq!(c.intro_ms, 4000);
    }

    #[test]
    fn voice_pairing_resolution() {
        let c = PipelineConfig::builder()
            .voice_ids("ma", "mb", "fa", "fb")
            .build()
            .unwrap();
        assert_eq!(c.voice_ids_for(VoicePairing::MaleMale), ("ma", "mb"));
        assert_eq!(c.voice_ids_for(VoicePairing::FemaleMale), ("fa", "mb"));
        assert_eq!(c.voice_ids_for(VoicePairing::FemaleFemale), ("fa", "fb"));
    }

    #[test]
    fn duck_louder_than_baseline_is_rejected() {
        let err = PipelineConfig::builder()
            .music_volume_db(-30.0)
            .music_duck_db(-20.0)
            .build();
        assert!(err.is_err());
    }

    #[test]
    fn intro_shorter_than_fades_is_rejected() {
        let err = PipelineConfig::builder().intro_ms(1000).fade_ms(800).build();
        assert!(err.is_err());
    }

    #[test]
    fn no_pacing_zeroes_all_delays() {
        let c = PipelineConfig::builder().no_pacing().build().unwrap();
        assert_eq!(c.stage_pacing, Duration::ZERO);
        assert_eq!(c.chapter_pacing, Duration::ZERO);
        assert_eq!(c.line_pacing, Duration::ZERO);
        assert_eq!(c.text_backoff_base, Duration::ZERO);
    }
}
