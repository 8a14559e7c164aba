//! End-to-end pipeline tests through the public orchestrator API.
//!
//! No network: providers are mocked at the trait seam. Every test runs the
//! real scripting, synthesis, and mixing stages against a temp directory.

use async_trait::async_trait;
use papercast::providers::TextGenError;
use papercast::{
    InMemoryDocumentSource, JobStatus, Orchestrator, ParsedDocument, ParsedSection,
    PipelineConfig, QuizSubmission, TextGenerator, VoicePairing,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn document(job_id: &str) -> ParsedDocument {
    ParsedDocument {
        job_id: job_id.into(),
        filename: "attention.pdf".into(),
        total_pages: 12,
        word_count: 6200,
        sections: vec![
            ParsedSection {
                title: "Introduction".into(),
                body: "Sequence transduction models dominate the field.".into(),
                page_start: 1,
                page_end: 2,
                has_tables: false,
                has_equations: false,
            },
            ParsedSection {
                title: "Model Architecture".into(),
                body: "The encoder stacks six identical layers.".into(),
                page_start: 3,
                page_end: 7,
                has_tables: true,
                has_equations: true,
            },
        ],
        raw_text: "Sequence transduction models dominate the field. \
                   The encoder stacks six identical layers."
            .into(),
        metadata: HashMap::from([
            ("title".into(), "Attention Is All You Need".into()),
            ("authors".into(), "Vaswani et al.".into()),
        ]),
    }
}

fn fast_config(dir: &Path) -> PipelineConfig {
    PipelineConfig::builder()
        .output_dir(dir)
        .assets_dir(dir.join("assets"))
        .no_pacing()
        .intro_ms(2000)
        .fade_ms(500)
        .build()
        .unwrap()
}

/// Routes each prompt kind to a canned, well-formed JSON response.
struct HelpfulGenerator;

#[async_trait]
impl TextGenerator for HelpfulGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, TextGenError> {
        if prompt.contains("podcast chapters") {
            return Ok(r#"{"chapters": [
                {"id": 1, "title": "Why Attention", "hook": "What if recurrence is unnecessary?", "concepts": ["self-attention"]},
                {"id": 2, "title": "Inside the Transformer", "hook": "Six layers, no loops", "concepts": ["encoder", "decoder"]}
            ]}"#
            .into());
        }
        if prompt.contains("Write podcast dialogue") {
            // Fenced on purpose: the pipeline must strip this.
            return Ok("```json\n[
                {\"host\": \"A\", \"text\": \"Welcome back to the show!\"},
                {\"host\": \"B\", \"text\": \"Today we read a paper that removed recurrence entirely.\"}
            ]\n```"
                .into());
        }
        Ok(r####"{
            "study_guide": "## Core Contribution\nAttention replaces recurrence.",
            "quiz": [
                {"question": "How many encoder layers?", "options": ["A. 2", "B. 4", "C. 6", "D. 8"], "correct_index": 2, "explanation": "Six identical layers."},
                {"question": "What is removed?", "options": ["A. Attention", "B. Recurrence", "C. Embeddings", "D. Softmax"], "correct_index": 1, "explanation": "No RNN or CNN."}
            ]
        }"####
        .into())
    }
}

/// Returns prose instead of JSON, driving every sub-stage onto fallbacks.
struct UnhelpfulGenerator;

#[async_trait]
impl TextGenerator for UnhelpfulGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, TextGenError> {
        Ok("As a language model, here are some thoughts about the paper.".into())
    }
}

/// Rate-limits forever.
struct SaturatedGenerator;

#[async_trait]
impl TextGenerator for SaturatedGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, TextGenError> {
        Err(TextGenError::RateLimited)
    }
}

/// Slow but correct; used to observe a job mid-flight.
struct SlowGenerator;

#[async_trait]
impl TextGenerator for SlowGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, TextGenError> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        HelpfulGenerator.generate(prompt).await
    }
}

fn orchestrator(dir: &Path, text: Arc<dyn TextGenerator>, job_id: &str) -> Orchestrator {
    let docs = Arc::new(InMemoryDocumentSource::new());
    docs.insert(document(job_id));
    Orchestrator::new(docs, Some(text), None, fast_config(dir))
}

#[tokio::test]
async fn well_formed_responses_produce_a_complete_episode() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path(), Arc::new(HelpfulGenerator), "ep-1");

    orch.start_generation("ep-1", VoicePairing::FemaleMale)
        .await
        .unwrap();
    let job = orch.wait("ep-1").await.unwrap();
    assert_eq!(job.status, JobStatus::Done, "message: {}", job.message);
    assert_eq!(job.progress, 100);

    let script = job.script.as_ref().unwrap();
    assert_eq!(script.chapters.len(), 2);
    assert_eq!(script.chapters[0].title, "Why Attention");
    assert_eq!(script.dialogue.len(), 4); // 2 lines per chapter
    assert!(script.study_guide.contains("Core Contribution"));
    assert_eq!(script.quiz_questions.len(), 2);

    let audio = job.audio.as_ref().unwrap();
    assert!(audio.audio_path.exists());
    assert!(audio.duration_sec > 2.0);

    // Chapter timestamps tile the full episode.
    assert_eq!(audio.chapters.len(), 2);
    assert_eq!(audio.chapters[0].start_sec, 0.0);
    let span: f64 = audio.chapters.iter().map(|c| c.end_sec - c.start_sec).sum();
    assert!((span - audio.duration_sec).abs() < 1e-6);

    // After mixing, the stored script's chapter durations are the real
    // audio spans, not the pre-synthesis word-count estimates.
    for (ch, ts) in script.chapters.iter().zip(&audio.chapters) {
        assert_eq!(
            ch.estimated_duration_sec,
            (ts.end_sec - ts.start_sec).round() as u64,
            "chapter {} still holds an estimate",
            ch.id
        );
    }
    // Line ranges survive the rewrite untouched.
    assert_eq!(
        (script.chapters[0].line_start, script.chapters[0].line_end),
        (0, 1)
    );
    assert_eq!(
        (script.chapters[1].line_start, script.chapters[1].line_end),
        (2, 3)
    );

    // Captions: one cue per line, WebVTT header, speaker attribution.
    let vtt = std::fs::read_to_string(&audio.captions_path).unwrap();
    assert!(vtt.starts_with("WEBVTT\n"));
    assert_eq!(vtt.matches(" --> ").count(), 4);
    assert!(vtt.contains("[A]: Welcome back to the show!"));
}

#[tokio::test]
async fn unusable_text_still_ships_an_episode() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path(), Arc::new(UnhelpfulGenerator), "ep-2");

    orch.start_generation("ep-2", VoicePairing::default())
        .await
        .unwrap();
    let job = orch.wait("ep-2").await.unwrap();
    assert_eq!(job.status, JobStatus::Done, "message: {}", job.message);

    // Fallback skeleton, no dialogue, empty quiz; the audio artifacts
    // still exist.
    let script = job.script.as_ref().unwrap();
    assert_eq!(script.chapters.len(), 3);
    assert!(script.dialogue.is_empty());
    assert!(script.quiz_questions.is_empty());

    let audio = job.audio.as_ref().unwrap();
    assert!(audio.audio_path.exists());
    let vtt = std::fs::read_to_string(&audio.captions_path).unwrap();
    assert!(vtt.starts_with("WEBVTT"));
}

#[tokio::test]
async fn exhausted_rate_limits_fail_the_job_with_a_wait_message() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path(), Arc::new(SaturatedGenerator), "ep-3");

    orch.start_generation("ep-3", VoicePairing::default())
        .await
        .unwrap();
    let job = orch.wait("ep-3").await.unwrap();
    assert_eq!(job.status, JobStatus::Error);
    assert_eq!(job.progress, 0);
    assert!(job.message.to_lowercase().contains("wait"), "{}", job.message);
    assert!(job.audio.is_none());
}

#[tokio::test]
async fn starting_a_running_job_returns_its_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path(), Arc::new(SlowGenerator), "ep-4");

    orch.start_generation("ep-4", VoicePairing::default())
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = orch
        .start_generation("ep-4", VoicePairing::default())
        .await
        .unwrap();
    assert!(!snapshot.status.is_terminal());

    let job = orch.wait("ep-4").await.unwrap();
    assert_eq!(job.status, JobStatus::Done, "message: {}", job.message);
}

#[tokio::test]
async fn quiz_submissions_are_graded_with_feedback() {
    let dir = tempfile::tempdir().unwrap();
    let orch = orchestrator(dir.path(), Arc::new(HelpfulGenerator), "ep-5");

    orch.start_generation("ep-5", VoicePairing::default())
        .await
        .unwrap();
    orch.wait("ep-5").await.unwrap();

    // First answer right, second wrong.
    let result = orch
        .submit_quiz("ep-5", &QuizSubmission { answers: vec![2, 0] })
        .unwrap();
    assert_eq!(result.total, 2);
    assert_eq!(result.score, 1);
    assert_eq!(result.points_earned, 1);
    assert!(result.feedback[0].correct);
    assert!(!result.feedback[1].correct);
    assert_eq!(result.feedback[1].correct_index, 1);
    assert_eq!(result.feedback[1].explanation, "No RNN or CNN.");
}
