//! Mix & Align Engine: synthesised segments → one timeline + captions.
//!
//! The mix is built in two coordinate systems. The **speech timeline** is
//! the plain concatenation of line audio with a fixed inter-speaker pause;
//! every per-line offset is recorded there first. The **final timeline**
//! prepends a music-only intro swell, so every caption cue and every
//! chapter boundary derived from speech offsets is shifted forward by the
//! intro duration before export. Keeping the two systems explicit is what
//! lets captions, chapters, and audio stay consistent without ever
//! inspecting the audio itself.
//!
//! Mixing never fails because of a missing background asset: silence of
//! matching length substitutes for it.

use crate::audio::AudioClip;
use crate::config::PipelineConfig;
use crate::error::PodcastError;
use crate::model::{CaptionCue, PodcastScript, TimestampedChapter};
use crate::pipeline::synth::SynthesisedLine;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Margin of background music kept beyond the speech timeline.
const MUSIC_TAIL_MS: u64 = 10_000;

/// Everything the mix stage produces.
#[derive(Debug, Clone)]
pub struct MixOutput {
    pub audio_path: PathBuf,
    pub captions_path: PathBuf,
    pub duration_sec: f64,
    pub chapters: Vec<TimestampedChapter>,
    /// Caption cues on the final timeline (intro shift applied).
    pub cues: Vec<CaptionCue>,
}

/// Assemble the final podcast audio, captions, and chapter timestamps.
pub async fn mix_podcast(
    script: &PodcastScript,
    synthesised: &[SynthesisedLine],
    config: &PipelineConfig,
) -> Result<MixOutput, PodcastError> {
    info!("[{}] Starting final audio mix", script.job_id);

    // ── Step 1: Speech timeline ──────────────────────────────────────────
    let mut speech = AudioClip::empty();
    let mut cues: Vec<CaptionCue> = Vec::with_capacity(synthesised.len());
    let mut line_offsets_ms: Vec<u64> = Vec::with_capacity(synthesised.len());

    for sl in synthesised {
        let start_ms = speech.len_ms();
        line_offsets_ms.push(start_ms);
        speech.append(&sl.audio);
        speech.append_silence(config.speaker_pause_ms);

        // The pause is not part of the spoken interval.
        cues.push(CaptionCue {
            start_sec: start_ms as f64 / 1000.0,
            end_sec: (start_ms + sl.duration_ms) as f64 / 1000.0,
            speaker: sl.speaker,
            text: sl.text.clone(),
        });
    }
    let speech_len_ms = speech.len_ms();

    // ── Step 2: Background music at baseline level ───────────────────────
    let music = load_music(&config.assets_dir, speech_len_ms + MUSIC_TAIL_MS)
        .gain_db(config.music_volume_db);

    // ── Step 3: Duck the body and overlay speech ─────────────────────────
    let ducked = music
        .clone()
        .truncated_to_ms(speech_len_ms)
        .gain_db(config.music_duck_db - config.music_volume_db);
    let body = ducked.overlay(&speech);

    // ── Step 4: Intro swell (music only, never ducked) ───────────────────
    let intro = music
        .truncated_to_ms(config.intro_ms)
        .fade_in(config.fade_ms)
        .fade_out(config.fade_ms);

    let mut final_audio = intro;
    final_audio.append(&body);
    let final_audio = final_audio.normalize();
    let duration_sec = final_audio.duration_sec();

    // ── Step 5: Shift cues onto the final timeline ───────────────────────
    let intro_sec = config.intro_ms as f64 / 1000.0;
    for cue in &mut cues {
        cue.start_sec += intro_sec;
        cue.end_sec += intro_sec;
    }

    // ── Step 6: Chapter timestamps ───────────────────────────────────────
    let chapters = align_chapters(script, synthesised, &line_offsets_ms, intro_sec, duration_sec);

    // ── Step 7: Export artifacts ─────────────────────────────────────────
    tokio::fs::create_dir_all(&config.output_dir)
        .await
        .map_err(|e| PodcastError::OutputWriteFailed {
            path: config.output_dir.clone(),
            source: e,
        })?;

    let audio_path = config.output_dir.join(format!("{}.wav", script.job_id));
    tokio::fs::write(&audio_path, final_audio.to_wav_bytes())
        .await
        .map_err(|e| PodcastError::OutputWriteFailed {
            path: audio_path.clone(),
            source: e,
        })?;

    let captions_path = config.output_dir.join(format!("{}.vtt", script.job_id));
    tokio::fs::write(&captions_path, render_vtt(&cues))
        .await
        .map_err(|e| PodcastError::OutputWriteFailed {
            path: captions_path.clone(),
            source: e,
        })?;

    info!(
        "[{}] Mix complete: {:.1}s, {} cues, {} chapters",
        script.job_id,
        duration_sec,
        cues.len(),
        chapters.len()
    );

    Ok(MixOutput {
        audio_path,
        captions_path,
        duration_sec,
        chapters,
        cues,
    })
}

/// Load the background asset, or silence of matching length when absent.
fn load_music(assets_dir: &Path, duration_ms: u64) -> AudioClip {
    let asset_path = assets_dir.join("background_music.wav");
    match std::fs::read(&asset_path) {
        Ok(bytes) => match AudioClip::from_wav_bytes(&bytes) {
            Ok(clip) => clip.looped_to_ms(duration_ms),
            Err(e) => {
                warn!("Unreadable background asset {}: {e}", asset_path.display());
                AudioClip::silent(duration_ms)
            }
        },
        Err(_) => {
            warn!("No background_music.wav found. Using silence.");
            AudioClip::silent(duration_ms)
        }
    }
}

/// Map each chapter's line range onto the final timeline.
///
/// Chapters tile the timeline exactly: the first chapter starts at zero
/// (absorbing the intro), each subsequent chapter starts at the intro
/// offset plus its first line's speech offset, each ends where the next
/// begins, and the last ends at the total length. A script with no chapters
/// (or a mix with no speech) degenerates to a single whole-file chapter.
fn align_chapters(
    script: &PodcastScript,
    synthesised: &[SynthesisedLine],
    line_offsets_ms: &[u64],
    intro_sec: f64,
    total_sec: f64,
) -> Vec<TimestampedChapter> {
    if script.chapters.is_empty() || synthesised.is_empty() {
        return vec![TimestampedChapter {
            id: 1,
            title: "Introduction".into(),
            start_sec: 0.0,
            end_sec: total_sec,
        }];
    }

    let mut starts = Vec::with_capacity(script.chapters.len());
    starts.push(0.0f64);
    for ch in &script.chapters[1..] {
        let offset = synthesised
            .iter()
            .position(|sl| sl.chapter_id == Some(ch.id))
            .map(|idx| intro_sec + line_offsets_ms[idx] as f64 / 1000.0);
        // A chapter with no synthesised lines collapses onto the previous
        // boundary.
        let prev = *starts.last().unwrap_or(&0.0);
        starts.push(offset.unwrap_or(prev).max(prev).min(total_sec));
    }

    script
        .chapters
        .iter()
        .enumerate()
        .map(|(i, ch)| TimestampedChapter {
            id: ch.id,
            title: ch.title.clone(),
            start_sec: starts[i],
            end_sec: starts.get(i + 1).copied().unwrap_or(total_sec),
        })
        .collect()
}

// ── WebVTT rendering ─────────────────────────────────────────────────────

/// Render numbered WebVTT cues with attributed-speaker text lines.
fn render_vtt(cues: &[CaptionCue]) -> String {
    let mut out = String::from("WEBVTT\n");
    for (i, cue) in cues.iter().enumerate() {
        out.push_str(&format!(
            "\n{}\n{} --> {}\n[{}]: {}\n",
            i + 1,
            format_timestamp(cue.start_sec),
            format_timestamp(cue.end_sec),
            cue.speaker,
            cue.text
        ));
    }
    out
}

/// `HH:MM:SS.mmm` timestamp for a second offset.
fn format_timestamp(seconds: f64) -> String {
    let total_ms = (seconds * 1000.0).round() as u64;
    let h = total_ms / 3_600_000;
    let m = (total_ms % 3_600_000) / 60_000;
    let s = (total_ms % 60_000) / 1000;
    let ms = total_ms % 1000;
    format!("{h:02}:{m:02}:{s:02}.{ms:03}")
}
