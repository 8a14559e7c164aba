//! Data model shared across pipeline stages.
//!
//! Everything here is a passive, serialisable value type. The pipeline
//! stages communicate exclusively through these structs: the parser
//! collaborator produces a [`ParsedDocument`], script assembly turns it into
//! a [`PodcastScript`], synthesis and mixing produce the artifacts described
//! by [`PodcastAudio`]. Keeping the model in one module means every stage
//! agrees on field semantics without back-references into stage internals.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;

/// Speaking rate used for all word-count → duration estimates.
///
/// 2.5 words per second is a comfortable conversational pace; using one
/// shared constant keeps per-chapter estimates and the script total
/// consistent with each other.
pub const WORDS_PER_SEC: f64 = 2.5;

// ── Parsed document (external input) ─────────────────────────────────────

/// A logical section extracted from the paper by the external parser.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedSection {
    pub title: String,
    pub body: String,
    pub page_start: u32,
    pub page_end: u32,
    #[serde(default)]
    pub has_tables: bool,
    #[serde(default)]
    pub has_equations: bool,
}

/// Full structured output of the PDF parsing collaborator.
///
/// Immutable once produced; owned by the orchestrator for the duration of a
/// job. The parser contract guarantees at least one section (a "Preamble"
/// section when no heading was detected) and a populated metadata map with
/// `title` / `authors` / `year` (`"Unknown"` when absent) and optional `doi`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub job_id: String,
    pub filename: String,
    pub total_pages: u32,
    pub word_count: usize,
    pub sections: Vec<ParsedSection>,
    /// Full concatenated text, used for study-material generation.
    pub raw_text: String,
    /// Free-form metadata: title, authors, year, doi.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl ParsedDocument {
    /// Paper title, falling back to the uploaded filename.
    pub fn title(&self) -> &str {
        self.metadata
            .get("title")
            .map(String::as_str)
            .unwrap_or(&self.filename)
    }

    /// Paper authors, falling back to `"Unknown"`.
    pub fn authors(&self) -> &str {
        self.metadata
            .get("authors")
            .map(String::as_str)
            .unwrap_or("Unknown")
    }
}

// ── Script types ─────────────────────────────────────────────────────────

/// One of the two fixed host identities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Speaker {
    A,
    B,
}

impl Speaker {
    /// Lenient parse: `"B"`/`"b"` is B, anything else is A.
    ///
    /// Provider output occasionally mislabels the host field; mapping
    /// unknowns to A keeps a usable line instead of dropping it.
    pub fn from_loose(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "B" => Speaker::B,
            _ => Speaker::A,
        }
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Speaker::A => write!(f, "A"),
            Speaker::B => write!(f, "B"),
        }
    }
}

/// A single line of podcast dialogue.
///
/// Sequence position defines both conversational order and the later time
/// axis; lines are never reordered after generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DialogueLine {
    pub speaker: Speaker,
    pub text: String,
    /// Owning chapter, used to materialize chapter line ranges.
    pub chapter_id: Option<u32>,
}

/// Intermediate chapter outline entry produced by the outline generation
/// call and consumed only by dialogue generation. Not exposed externally.
#[derive(Debug, Clone)]
pub struct ChapterDraft {
    pub id: u32,
    pub title: String,
    pub hook: String,
    pub concepts: Vec<String>,
}

/// A chapter of the final script.
///
/// `line_start..=line_end` index into [`PodcastScript::dialogue`]. For
/// consecutive chapters the ranges are contiguous and non-overlapping and
/// together cover the whole dialogue sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chapter {
    pub id: u32,
    pub title: String,
    pub estimated_duration_sec: u64,
    pub line_start: usize,
    pub line_end: usize,
}

/// A quiz question with exactly four options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizQuestion {
    pub question: String,
    pub options: Vec<String>,
    /// Index into `options`, 0..=3.
    pub correct_index: usize,
    pub explanation: String,
}

/// Complete two-host podcast script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodcastScript {
    pub job_id: String,
    pub paper_title: String,
    pub paper_authors: String,
    pub total_estimated_duration_sec: u64,
    pub chapters: Vec<Chapter>,
    pub dialogue: Vec<DialogueLine>,
    /// Markdown study guide. Always a string, even when the provider
    /// returned structured data.
    pub study_guide: String,
    pub quiz_questions: Vec<QuizQuestion>,
}

// ── Audio artifacts ──────────────────────────────────────────────────────

/// A single caption cue on the final mixed timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptionCue {
    pub start_sec: f64,
    pub end_sec: f64,
    pub speaker: Speaker,
    pub text: String,
}

/// Chapter with real audio timestamps on the final mixed timeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimestampedChapter {
    pub id: u32,
    pub title: String,
    pub start_sec: f64,
    pub end_sec: f64,
}

/// Final artifact descriptor for a completed job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PodcastAudio {
    pub job_id: String,
    pub audio_path: PathBuf,
    pub captions_path: PathBuf,
    pub duration_sec: f64,
    pub chapters: Vec<TimestampedChapter>,
}

// ── Voice pairing ────────────────────────────────────────────────────────

/// The enumerated choice of two speaker identities for the two host roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VoicePairing {
    #[serde(rename = "MM")]
    MaleMale,
    /// Host A female, host B male. (default)
    #[default]
    #[serde(rename = "FM")]
    FemaleMale,
    #[serde(rename = "FF")]
    FemaleFemale,
}

impl VoicePairing {
    /// Lenient parse that falls back to the default pairing for anything
    /// unrecognized, so a garbled client submission never blocks a job.
    pub fn from_loose(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "MM" => VoicePairing::MaleMale,
            "FF" => VoicePairing::FemaleFemale,
            _ => VoicePairing::FemaleMale,
        }
    }
}

// ── Job lifecycle ────────────────────────────────────────────────────────

/// Job pipeline states.
///
/// Non-terminal states advance strictly in declaration order;
/// [`JobStatus::Error`] is absorbing and reachable from any non-`Done`
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Parsing,
    Scripting,
    Synthesising,
    Mixing,
    Done,
    Error,
}

impl JobStatus {
    /// Whether this status ends the job lifecycle.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Done | JobStatus::Error)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobStatus::Pending => "pending",
            JobStatus::Parsing => "parsing",
            JobStatus::Scripting => "scripting",
            JobStatus::Synthesising => "synthesising",
            JobStatus::Mixing => "mixing",
            JobStatus::Done => "done",
            JobStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

// ── Quiz grading ─────────────────────────────────────────────────────────

/// A user's quiz answers, one chosen option index per question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizSubmission {
    pub answers: Vec<usize>,
}

/// Per-question grading feedback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizFeedback {
    pub question_index: usize,
    pub correct: bool,
    pub correct_index: usize,
    pub explanation: String,
}

/// Result of grading a [`QuizSubmission`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuizResult {
    pub score: usize,
    pub total: usize,
    pub points_earned: usize,
    pub feedback: Vec<QuizFeedback>,
}

/// Grade a submission against the stored questions.
///
/// Answers are zipped with questions: extra answers are ignored, missing
/// answers count as wrong. One point per correct answer.
pub fn grade_quiz(questions: &[QuizQuestion], submission: &QuizSubmission) -> QuizResult {
    let mut score = 0;
    let mut feedback = Vec::with_capacity(questions.len());

    for (i, q) in questions.iter().enumerate() {
        let correct = submission.answers.get(i) == Some(&q.correct_index);
        if correct {
            score += 1;
        }
        feedback.push(QuizFeedback {
            question_index: i,
            correct,
            correct_index: q.correct_index,
            explanation: q.explanation.clone(),
        });
    }

    QuizResult {
        score,
        total: questions.len(),
        points_earned: score,
        feedback,
    }
}

/// Estimate spoken duration in whole seconds from a word count.
pub fn estimate_duration_sec(word_count: usize) -> u64 {
    (word_count as f64 / WORDS_PER_SEC) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(correct_index: usize) -> QuizQuestion {
        QuizQuestion {
            question: "Which dataset was used?".into(),
            options: vec!["A. X".into(), "B. Y".into(), "C. Z".into(), "D. W".into()],
            correct_index,
            explanation: "The paper evaluates on Y.".into(),
        }
    }

    #[test]
    fn grade_single_correct_answer() {
        let questions = vec![question(1)];
        let result = grade_quiz(&questions, &QuizSubmission { answers: vec![1] });
        assert_eq!(result.score, 1);
        assert_eq!(result.total, 1);
        assert_eq!(result.points_earned, 1);
        assert!(result.feedback[0].correct);
    }

    #[test]
    fn grade_missing_answers_count_as_wrong() {
        let questions = vec![question(0), question(2)];
        let result = grade_quiz(&questions, &QuizSubmission { answers: vec![0] });
        assert_eq!(result.score, 1);
        assert_eq!(result.total, 2);
        assert!(!result.feedback[1].correct);
    }

    #[test]
    fn grade_extra_answers_are_ignored() {
        let questions = vec![question(3)];
        let result = grade_quiz(
            &questions,
            &QuizSubmission {
                answers: vec![3, 0, 1],
            },
        );
        assert_eq!(result.score, 1);
        assert_eq!(result.total, 1);
    }

    #[test]
    fn speaker_loose_parse_defaults_to_a() {
        assert_eq!(Speaker::from_loose("b"), Speaker::B);
        assert_eq!(Speaker::from_loose("B "), Speaker::B);
        assert_eq!(Speaker::from_loose("A"), Speaker::A);
        assert_eq!(Speaker::from_loose("narrator"), Speaker::A);
    }

    #[test]
    fn voice_pairing_loose_parse_falls_back_to_fm() {
        assert_eq!(VoicePairing::from_loose("MM"), VoicePairing::MaleMale);
        assert_eq!(VoicePairing::from_loose("ff"), VoicePairing::FemaleFemale);
        assert_eq!(VoicePairing::from_loose("XX"), VoicePairing::FemaleMale);
        assert_eq!(VoicePairing::from_loose(""), VoicePairing::FemaleMale);
    }

    #[test]
    fn duration_estimate_uses_shared_rate() {
        // 150 words at 2.5 words/sec = 60 seconds
        assert_eq!(estimate_duration_sec(150), 60);
        assert_eq!(estimate_duration_sec(0), 0);
    }

    #[test]
    fn job_status_terminality() {
        assert!(JobStatus::Done.is_terminal());
        assert!(JobStatus::Error.is_terminal());
        assert!(!JobStatus::Synthesising.is_terminal());
    }

    #[test]
    fn document_metadata_fallbacks() {
        let doc = ParsedDocument {
            job_id: "j1".into(),
            filename: "paper.pdf".into(),
            total_pages: 3,
            word_count: 10,
            sections: vec![],
            raw_text: String::new(),
            metadata: HashMap::new(),
        };
        assert_eq!(doc.title(), "paper.pdf");
        assert_eq!(doc.authors(), "Unknown");
    }
}
