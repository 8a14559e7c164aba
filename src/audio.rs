//! Minimal mono PCM audio buffer used by synthesis and mixing.
//!
//! [`AudioClip`] holds `f32` samples in `[-1.0, 1.0]` at a fixed 22 050 Hz.
//! One fixed rate keeps every timeline computation a pure function of sample
//! counts: a clip's position in the mix, its caption window, and its chapter
//! offsets all derive from `samples.len()` with no resampling bookkeeping.
//!
//! The operations here are the small set the mix engine actually needs —
//! concatenation, gain, fades, overlay, looping, peak normalisation — plus
//! 16-bit WAV encode/decode for the background asset and the exported
//! artifact.

use thiserror::Error;

/// Fixed sample rate for all pipeline audio.
pub const SAMPLE_RATE: u32 = 22_050;

/// Errors decoding a WAV asset.
#[derive(Debug, Error)]
pub enum WavError {
    #[error("WAV data truncated")]
    Truncated,
    #[error("Not a RIFF/WAVE file")]
    NotWave,
    #[error("Unsupported WAV encoding (format tag {0}); only 16-bit PCM is supported")]
    UnsupportedFormat(u16),
    #[error("WAV file has no data chunk")]
    MissingData,
}

/// A mono audio buffer at [`SAMPLE_RATE`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioClip {
    samples: Vec<f32>,
}

fn ms_to_samples(ms: u64) -> usize {
    ((ms as u128 * SAMPLE_RATE as u128 + 500) / 1000) as usize
}

impl AudioClip {
    /// An empty clip.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Silence of the given length.
    pub fn silent(ms: u64) -> Self {
        Self {
            samples: vec![0.0; ms_to_samples(ms)],
        }
    }

    /// A sine tone at `freq_hz` for `ms` milliseconds at `amplitude`
    /// (0.0–1.0).
    pub fn sine(freq_hz: f32, ms: u64, amplitude: f32) -> Self {
        let n = ms_to_samples(ms);
        let amp = amplitude.clamp(0.0, 1.0);
        let samples = (0..n)
            .map(|i| {
                let t = i as f32 / SAMPLE_RATE as f32;
                (t * freq_hz * 2.0 * std::f32::consts::PI).sin() * amp
            })
            .collect();
        Self { samples }
    }

    /// Wrap raw samples (assumed to be at [`SAMPLE_RATE`]).
    pub fn from_samples(samples: Vec<f32>) -> Self {
        Self { samples }
    }

    /// Decode raw little-endian 16-bit PCM (the speech provider's
    /// `pcm_22050` output format).
    pub fn from_pcm16_bytes(bytes: &[u8]) -> Self {
        let samples = bytes
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
            .collect();
        Self { samples }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    /// Length in milliseconds (rounded to nearest).
    ///
    /// Rounding in both directions keeps `silent(ms).len_ms() == ms` for
    /// every `ms`, even when it does not divide the sample rate evenly.
    pub fn len_ms(&self) -> u64 {
        ((self.samples.len() as u128 * 1000 + SAMPLE_RATE as u128 / 2) / SAMPLE_RATE as u128)
            as u64
    }

    /// Length in seconds.
    pub fn duration_sec(&self) -> f64 {
        self.samples.len() as f64 / SAMPLE_RATE as f64
    }

    /// Append another clip after this one.
    pub fn append(&mut self, other: &AudioClip) {
        self.samples.extend_from_slice(&other.samples);
    }

    /// Append silence.
    pub fn append_silence(&mut self, ms: u64) {
        self.samples
            .resize(self.samples.len() + ms_to_samples(ms), 0.0);
    }

    /// Apply a gain in decibels.
    pub fn gain_db(mut self, db: f32) -> Self {
        let factor = 10f32.powf(db / 20.0);
        for s in &mut self.samples {
            *s *= factor;
        }
        self
    }

    /// Linear fade-in over the first `ms` milliseconds.
    pub fn fade_in(mut self, ms: u64) -> Self {
        let n = ms_to_samples(ms).min(self.samples.len());
        for i in 0..n {
            self.samples[i] *= i as f32 / n as f32;
        }
        self
    }

    /// Linear fade-out over the last `ms` milliseconds.
    pub fn fade_out(mut self, ms: u64) -> Self {
        let len = self.samples.len();
        let n = ms_to_samples(ms).min(len);
        for i in 0..n {
            self.samples[len - n + i] *= 1.0 - (i as f32 + 1.0) / n as f32;
        }
        self
    }

    /// Mix `other` on top of this clip, sample by sample. The result has the
    /// length of the longer clip.
    pub fn overlay(&self, other: &AudioClip) -> Self {
        let len = self.samples.len().max(other.samples.len());
        let mut out = Vec::with_capacity(len);
        for i in 0..len {
            let a = self.samples.get(i).copied().unwrap_or(0.0);
            let b = other.samples.get(i).copied().unwrap_or(0.0);
            out.push(a + b);
        }
        Self { samples: out }
    }

    /// Loop (or truncate) this clip to exactly `ms` milliseconds.
    ///
    /// Looping an empty clip yields silence.
    pub fn looped_to_ms(&self, ms: u64) -> Self {
        let target = ms_to_samples(ms);
        if self.samples.is_empty() {
            return Self {
                samples: vec![0.0; target],
            };
        }
        let samples = self
            .samples
            .iter()
            .cycle()
            .take(target)
            .copied()
            .collect();
        Self { samples }
    }

    /// Truncate to the first `ms` milliseconds.
    pub fn truncated_to_ms(mut self, ms: u64) -> Self {
        self.samples.truncate(ms_to_samples(ms));
        self
    }

    /// Peak-normalise so the loudest sample sits just below full scale.
    /// Also clamps any clipping introduced by overlaying tracks.
    pub fn normalize(mut self) -> Self {
        let peak = self
            .samples
            .iter()
            .fold(0f32, |acc, s| acc.max(s.abs()));
        if peak > 0.0 {
            let factor = 0.98 / peak;
            for s in &mut self.samples {
                *s = (*s * factor).clamp(-1.0, 1.0);
            }
        }
        self
    }

    /// Samples as saturating 16-bit PCM.
    pub fn to_pcm_i16(&self) -> Vec<i16> {
        self.samples
            .iter()
            .map(|&s| {
                let v = (s.clamp(-1.0, 1.0) * 32768.0).round() as i32;
                v.clamp(i16::MIN as i32, i16::MAX as i32) as i16
            })
            .collect()
    }

    // ── WAV encode/decode ────────────────────────────────────────────────

    /// Encode as a 16-bit PCM mono WAV file.
    pub fn to_wav_bytes(&self) -> Vec<u8> {
        let pcm = self.to_pcm_i16();
        let data_len = (pcm.len() * 2) as u32;
        let byte_rate = SAMPLE_RATE * 2;

        let mut out = Vec::with_capacity(44 + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes()); // fmt chunk size
        out.extend_from_slice(&1u16.to_le_bytes()); // PCM
        out.extend_from_slice(&1u16.to_le_bytes()); // mono
        out.extend_from_slice(&SAMPLE_RATE.to_le_bytes());
        out.extend_from_slice(&byte_rate.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes()); // block align
        out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        for s in pcm {
            out.extend_from_slice(&s.to_le_bytes());
        }
        out
    }

    /// Decode a 16-bit PCM WAV file. Stereo input is downmixed to mono by
    /// channel averaging; sample-rate metadata is not resampled (the
    /// background asset is expected at 22 050 Hz).
    pub fn from_wav_bytes(bytes: &[u8]) -> Result<Self, WavError> {
        if bytes.len() < 12 {
            return Err(WavError::Truncated);
        }
        if &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
            return Err(WavError::NotWave);
        }

        let mut channels: u16 = 1;
        let mut bits: u16 = 16;
        let mut data: Option<&[u8]> = None;

        // Walk the chunk list; chunks are word-aligned.
        let mut pos = 12;
        while pos + 8 <= bytes.len() {
            let id = &bytes[pos..pos + 4];
            let size = u32::from_le_bytes([
                bytes[pos + 4],
                bytes[pos + 5],
                bytes[pos + 6],
                bytes[pos + 7],
            ]) as usize;
            let body_start = pos + 8;
            let body_end = (body_start + size).min(bytes.len());

            match id {
                b"fmt " => {
                    let body = &bytes[body_start..body_end];
                    if body.len() < 16 {
                        return Err(WavError::Truncated);
                    }
                    let format_tag = u16::from_le_bytes([body[0], body[1]]);
                    if format_tag != 1 {
                        return Err(WavError::UnsupportedFormat(format_tag));
                    }
                    channels = u16::from_le_bytes([body[2], body[3]]).max(1);
                    bits = u16::from_le_bytes([body[14], body[15]]);
                    if bits != 16 {
                        return Err(WavError::UnsupportedFormat(bits));
                    }
                }
                b"data" => {
                    data = Some(&bytes[body_start..body_end]);
                }
                _ => {}
            }
            pos = body_start + size + (size & 1);
        }

        let data = data.ok_or(WavError::MissingData)?;
        let frames = data.chunks_exact(2 * channels as usize);
        let samples = frames
            .map(|frame| {
                let sum: f32 = frame
                    .chunks_exact(2)
                    .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32768.0)
                    .sum();
                sum / channels as f32
            })
            .collect();
        Ok(Self { samples })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silent_clip_has_requested_length() {
        let clip = AudioClip::silent(1000);
        assert_eq!(clip.num_samples(), SAMPLE_RATE as usize);
        assert_eq!(clip.len_ms(), 1000);
    }

    #[test]
    fn sine_amplitude_is_bounded() {
        let clip = AudioClip::sine(440.0, 100, 0.5);
        assert!(clip.samples.iter().all(|s| s.abs() <= 0.5 + 1e-6));
        assert!(clip.samples.iter().any(|s| s.abs() > 0.4));
    }

    #[test]
    fn append_concatenates() {
        let mut a = AudioClip::silent(100);
        let b = AudioClip::silent(250);
        a.append(&b);
        assert_eq!(a.len_ms(), 350);
    }

    #[test]
    fn fractional_millisecond_lengths_round_trip() {
        // Neither 250 ms nor 333 ms is a whole number of samples at
        // 22 050 Hz; the reported length must still match the request.
        for ms in [1, 7, 250, 333, 999] {
            assert_eq!(AudioClip::silent(ms).len_ms(), ms, "at {ms} ms");
        }
    }

    #[test]
    fn gain_halves_at_minus_six_db() {
        let clip = AudioClip::from_samples(vec![0.8]).gain_db(-6.0);
        assert!((clip.samples[0] - 0.8 * 0.501).abs() < 0.01);
    }

    #[test]
    fn overlay_takes_longer_length_and_sums() {
        let a = AudioClip::from_samples(vec![0.1, 0.1]);
        let b = AudioClip::from_samples(vec![0.2, 0.2, 0.2]);
        let mixed = a.overlay(&b);
        assert_eq!(mixed.num_samples(), 3);
        assert!((mixed.samples[0] - 0.3).abs() < 1e-6);
        assert!((mixed.samples[2] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn loop_extends_and_truncates() {
        let clip = AudioClip::sine(440.0, 100, 0.5);
        let looped = clip.looped_to_ms(1000);
        assert_eq!(looped.len_ms(), 1000);
        let cut = looped.truncated_to_ms(300);
        assert_eq!(cut.len_ms(), 300);
    }

    #[test]
    fn loop_of_empty_clip_is_silence() {
        let looped = AudioClip::empty().looped_to_ms(500);
        assert_eq!(looped.len_ms(), 500);
        assert!(looped.samples.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn normalize_brings_peak_near_full_scale() {
        let clip = AudioClip::from_samples(vec![0.1, -0.25, 0.2]).normalize();
        let peak = clip.samples.iter().fold(0f32, |a, s| a.max(s.abs()));
        assert!((peak - 0.98).abs() < 1e-3);
    }

    #[test]
    fn fades_shape_the_envelope() {
        let clip = AudioClip::from_samples(vec![1.0; 2205]); // 100 ms
        let faded = clip.fade_in(50).fade_out(50);
        assert_eq!(faded.samples[0], 0.0);
        assert!(*faded.samples.last().unwrap() < 0.01);
        // Middle untouched
        assert!((faded.samples[1102] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn wav_round_trip_preserves_samples() {
        let clip = AudioClip::sine(300.0, 50, 0.7);
        let bytes = clip.to_wav_bytes();
        let decoded = AudioClip::from_wav_bytes(&bytes).unwrap();
        assert_eq!(decoded.num_samples(), clip.num_samples());
        for (a, b) in clip.samples.iter().zip(&decoded.samples) {
            assert!((a - b).abs() < 1.0 / 32000.0);
        }
    }

    #[test]
    fn wav_decode_rejects_non_wave() {
        assert!(matches!(
            AudioClip::from_wav_bytes(b"not a wav file at all"),
            Err(WavError::NotWave)
        ));
    }

    #[test]
    fn pcm16_decode_matches_known_values() {
        let bytes = [0x00, 0x40, 0x00, 0xC0]; // +0.5, -0.5
        let clip = AudioClip::from_pcm16_bytes(&bytes);
        assert_eq!(clip.num_samples(), 2);
        assert!((clip.samples[0] - 0.5).abs() < 1e-3);
        assert!((clip.samples[1] + 0.5).abs() < 1e-3);
    }
}
