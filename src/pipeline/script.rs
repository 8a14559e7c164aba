//! Script Assembly Engine: parsed document → chaptered dialogue script.
//!
//! Three sequential generation sub-stages, each gated behind the linear
//! retry policy in [`crate::retry`]:
//!
//! 1. **Chapter outline** — 3–10 chapter drafts (title, hook, concepts)
//! 2. **Per-chapter dialogue** — a two-host conversation per chapter,
//!    accumulated into one ordered line sequence
//! 3. **Study materials** — markdown study guide + quiz questions
//!
//! ## Degradation discipline
//!
//! The provider's output *should* be JSON but routinely arrives wrapped in
//! code fences or structurally mangled. Every sub-stage strips fences, then
//! strictly parses, and on parse failure substitutes its documented default
//! (fallback chapter skeleton, dropped dialogue line, empty quiz) instead of
//! failing the stage. Only escalated retry errors — a hard provider failure
//! or exhausted rate-limit attempts — abort script assembly; unusable *text*
//! never does, because text is cheaply substitutable.
//!
//! A fixed pacing delay separates the sub-stages and the per-chapter
//! dialogue calls. This is a deliberate throughput throttle against provider
//! rate budgets, not a wait on any resource.

use crate::config::PipelineConfig;
use crate::error::PodcastError;
use crate::model::{
    estimate_duration_sec, Chapter, ChapterDraft, DialogueLine, ParsedDocument, PodcastScript,
    QuizQuestion, Speaker,
};
use crate::prompts::{self, ChapterPosition};
use crate::providers::TextGenerator;
use crate::retry::{call_with_retry, TextRetryPolicy};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{info, warn};

/// Generate a full podcast script from a parsed document.
pub async fn generate_script(
    generator: &dyn TextGenerator,
    doc: &ParsedDocument,
    config: &PipelineConfig,
) -> Result<PodcastScript, PodcastError> {
    let policy = TextRetryPolicy {
        max_attempts: config.text_max_attempts,
        backoff_base: config.text_backoff_base,
    };

    info!("[{}] Starting script generation", doc.job_id);

    // ── Step 1: Chapter outline ──────────────────────────────────────────
    let drafts = generate_chapters(generator, doc, &policy).await?;
    info!("[{}] Got {} chapters", doc.job_id, drafts.len());

    sleep(config.stage_pacing).await;

    // ── Step 2: Dialogue ─────────────────────────────────────────────────
    let dialogue = generate_dialogue(generator, doc, &drafts, &policy, config).await?;
    info!("[{}] Got {} dialogue lines", doc.job_id, dialogue.len());

    sleep(config.stage_pacing).await;

    // ── Step 3: Study guide + quiz ───────────────────────────────────────
    let (study_guide, quiz_questions) = generate_study_materials(generator, doc, &policy).await?;
    info!(
        "[{}] Study guide and {} quiz questions ready",
        doc.job_id,
        quiz_questions.len()
    );

    // ── Assemble final script ────────────────────────────────────────────
    let total_words: usize = dialogue.iter().map(|l| word_count(&l.text)).sum();
    let chapters = build_chapters(&drafts, &dialogue);

    let script = PodcastScript {
        job_id: doc.job_id.clone(),
        paper_title: doc.title().to_string(),
        paper_authors: doc.authors().to_string(),
        total_estimated_duration_sec: estimate_duration_sec(total_words),
        chapters,
        dialogue,
        study_guide,
        quiz_questions,
    };

    info!(
        "[{}] Script generation complete: {} lines, {} chapters",
        doc.job_id,
        script.dialogue.len(),
        script.chapters.len()
    );
    Ok(script)
}

// ── JSON recovery helpers ────────────────────────────────────────────────

static RE_FENCE_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^```(?:json)?\s*").unwrap());
static RE_FENCE_CLOSE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)\s*```\s*$").unwrap());

/// Strip code-fence wrapping the provider adds despite being told not to.
fn strip_fences(text: &str) -> String {
    let s = RE_FENCE_OPEN.replace_all(text, "");
    let s = RE_FENCE_CLOSE.replace_all(&s, "");
    s.trim().to_string()
}

/// Parse provider output as JSON after stripping fences. `None` on failure;
/// callers substitute their stage default.
fn safe_json(text: &str) -> Option<Value> {
    let cleaned = strip_fences(text);
    match serde_json::from_str(&cleaned) {
        Ok(v) => Some(v),
        Err(e) => {
            let snippet: String = cleaned.chars().take(200).collect();
            warn!("JSON parse failed: {e} | snippet: {snippet}");
            None
        }
    }
}

/// Coerce a study-guide value to a markdown string.
///
/// The provider sometimes returns the guide as a key/value object instead
/// of a string; each key becomes a heading and each value its body.
fn coerce_to_markdown(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| {
                let heading = title_case(&k.replace('_', " "));
                let body = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                format!("## {heading}\n{body}")
            })
            .collect::<Vec<_>>()
            .join("\n\n"),
        other => other.to_string(),
    }
}

fn title_case(s: &str) -> String {
    s.split_whitespace()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

// ── Sub-stage 1: chapter outline ─────────────────────────────────────────

/// Fallback skeleton used when the provider returns zero chapters or
/// malformed structure.
fn fallback_chapters() -> Vec<ChapterDraft> {
    vec![
        ChapterDraft {
            id: 1,
            title: "Introduction".into(),
            hook: "What makes this paper special?".into(),
            concepts: vec!["overview".into()],
        },
        ChapterDraft {
            id: 2,
            title: "Core Concepts".into(),
            hook: "Here is the key idea explained".into(),
            concepts: vec!["methodology".into()],
        },
        ChapterDraft {
            id: 3,
            title: "Key Takeaways".into(),
            hook: "What should you remember from this?".into(),
            concepts: vec!["results".into()],
        },
    ]
}

async fn generate_chapters(
    generator: &dyn TextGenerator,
    doc: &ParsedDocument,
    policy: &TextRetryPolicy,
) -> Result<Vec<ChapterDraft>, PodcastError> {
    let prompt = prompts::chapter_outline(doc);
    let raw = call_with_retry(|| generator.generate(&prompt), policy).await?;

    let mut drafts: Vec<ChapterDraft> = safe_json(&raw)
        .and_then(|data| data.get("chapters").cloned())
        .and_then(|chapters| chapters.as_array().cloned())
        .map(|entries| {
            entries
                .iter()
                .filter_map(parse_chapter_draft)
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    // Chapter ids are assigned sequentially regardless of what the
    // provider returned.
    for (i, draft) in drafts.iter_mut().enumerate() {
        draft.id = i as u32 + 1;
    }

    if drafts.is_empty() {
        warn!("No chapters returned — using fallback skeleton");
        drafts = fallback_chapters();
    }

    Ok(drafts)
}

fn parse_chapter_draft(entry: &Value) -> Option<ChapterDraft> {
    let obj = entry.as_object()?;
    let title = obj
        .get("title")
        .and_then(Value::as_str)
        .unwrap_or("Discussion")
        .to_string();
    let hook = obj
        .get("hook")
        .and_then(Value::as_str)
        .unwrap_or("Let us explore this topic")
        .to_string();
    let concepts = obj
        .get("concepts")
        .and_then(Value::as_array)
        .map(|a| {
            a.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    Some(ChapterDraft {
        id: 0, // renumbered by the caller
        title,
        hook,
        concepts,
    })
}

// ── Sub-stage 2: per-chapter dialogue ────────────────────────────────────

async fn generate_dialogue(
    generator: &dyn TextGenerator,
    doc: &ParsedDocument,
    drafts: &[ChapterDraft],
    policy: &TextRetryPolicy,
    config: &PipelineConfig,
) -> Result<Vec<DialogueLine>, PodcastError> {
    // Shared paper context: first 8 sections, at most 1000 chars each.
    let context = doc
        .sections
        .iter()
        .take(8)
        .map(|s| {
            s.body
                .char_indices()
                .nth(1000)
                .map(|(idx, _)| &s.body[..idx])
                .unwrap_or(&s.body)
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let mut all_lines = Vec::new();

    for (i, draft) in drafts.iter().enumerate() {
        let position = ChapterPosition::of(i, drafts.len());
        let prompt = prompts::chapter_dialogue(draft, position, &context);
        let raw = call_with_retry(|| generator.generate(&prompt), policy).await?;

        let entries = match safe_json(&raw) {
            Some(Value::Array(entries)) => entries,
            Some(_) => {
                warn!("Chapter {} dialogue was not a list — skipping", draft.id);
                Vec::new()
            }
            None => Vec::new(),
        };

        let before = all_lines.len();
        for entry in &entries {
            if let Some(line) = parse_dialogue_line(entry, draft.id) {
                all_lines.push(line);
            }
        }
        info!(
            "Chapter {} — {} lines generated",
            draft.id,
            all_lines.len() - before
        );

        if i + 1 < drafts.len() {
            sleep(config.chapter_pacing).await;
        }
    }

    Ok(all_lines)
}

/// Validate one provider dialogue entry. Entries missing a host or text
/// field are dropped rather than failing the whole stage.
fn parse_dialogue_line(entry: &Value, chapter_id: u32) -> Option<DialogueLine> {
    let obj = entry.as_object()?;
    let host = obj.get("host").and_then(Value::as_str)?;
    let text = obj.get("text").and_then(Value::as_str)?.trim();
    if text.is_empty() {
        return None;
    }
    Some(DialogueLine {
        speaker: Speaker::from_loose(host),
        text: text.to_string(),
        chapter_id: Some(chapter_id),
    })
}

// ── Sub-stage 3: study materials ─────────────────────────────────────────

const STUDY_GUIDE_FALLBACK: &str = "Study guide unavailable.";

async fn generate_study_materials(
    generator: &dyn TextGenerator,
    doc: &ParsedDocument,
    policy: &TextRetryPolicy,
) -> Result<(String, Vec<QuizQuestion>), PodcastError> {
    let prompt = prompts::study_materials(doc);
    let raw = call_with_retry(|| generator.generate(&prompt), policy).await?;

    let data = match safe_json(&raw) {
        Some(v) => v,
        None => return Ok((STUDY_GUIDE_FALLBACK.to_string(), Vec::new())),
    };

    let guide = data
        .get("study_guide")
        .map(coerce_to_markdown)
        .filter(|g| !g.trim().is_empty())
        .unwrap_or_else(|| STUDY_GUIDE_FALLBACK.to_string());

    let questions = data
        .get("quiz")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|q| match parse_quiz_question(q) {
                    Some(question) => Some(question),
                    None => {
                        warn!("Skipping bad quiz question");
                        None
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    Ok((guide, questions))
}

/// Validate one quiz entry: question text, exactly 4 options, a correct
/// index inside them. Anything else is dropped individually.
fn parse_quiz_question(entry: &Value) -> Option<QuizQuestion> {
    let obj = entry.as_object()?;
    let question = obj.get("question").and_then(Value::as_str)?.to_string();
    let options: Vec<String> = obj
        .get("options")
        .and_then(Value::as_array)?
        .iter()
        .filter_map(Value::as_str)
        .map(str::to_string)
        .collect();
    if options.len() != 4 {
        return None;
    }
    let correct_index = obj.get("correct_index").and_then(Value::as_u64)? as usize;
    if correct_index > 3 {
        return None;
    }
    let explanation = obj
        .get("explanation")
        .and_then(Value::as_str)
        .unwrap_or("")
        .to_string();
    Some(QuizQuestion {
        question,
        options,
        correct_index,
        explanation,
    })
}

// ── Chapter materialization ──────────────────────────────────────────────

/// Map chapter drafts to inclusive line ranges over the dialogue sequence.
///
/// Boundaries are located by each chapter's first tagged line; chapter `i`
/// ends immediately before chapter `i+1` begins, and the last chapter runs
/// to the end of the sequence. When every chapter produced at least one
/// line the ranges partition the sequence exactly; a chapter whose
/// generation yielded nothing collapses to an empty range clamped onto its
/// neighbour's boundary.
fn build_chapters(drafts: &[ChapterDraft], lines: &[DialogueLine]) -> Vec<Chapter> {
    if drafts.is_empty() {
        return Vec::new();
    }
    if lines.is_empty() {
        return drafts
            .iter()
            .map(|d| Chapter {
                id: d.id,
                title: d.title.clone(),
                estimated_duration_sec: 0,
                line_start: 0,
                line_end: 0,
            })
            .collect();
    }

    // boundaries[i] = first line index of chapter i; boundaries[n] = len.
    let mut boundaries = Vec::with_capacity(drafts.len() + 1);
    boundaries.push(0usize);
    for draft in &drafts[1..] {
        let first = lines
            .iter()
            .position(|l| l.chapter_id == Some(draft.id))
            .unwrap_or(lines.len());
        let prev = *boundaries.last().unwrap_or(&0);
        boundaries.push(first.max(prev).min(lines.len()));
    }
    boundaries.push(lines.len());

    drafts
        .iter()
        .enumerate()
        .map(|(i, draft)| {
            let line_start = boundaries[i];
            let line_end = boundaries[i + 1].saturating_sub(1).max(line_start);
            let words: usize = lines[line_start..boundaries[i + 1].max(line_start)]
                .iter()
                .map(|l| word_count(&l.text))
                .sum();
            Chapter {
                id: draft.id,
                title: draft.title.clone(),
                estimated_duration_sec: estimate_duration_sec(words),
                line_start,
                line_end,
            }
        })
        .collect()
}
