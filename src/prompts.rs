//! Prompt builders for the three script-generation sub-stages.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — tuning the dialogue style or the quiz
//!    shape requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect prompts directly without a
//!    real provider, so truncation limits and instruction wording are easy
//!    to pin down.
//!
//! Every prompt asks for bare JSON; the provider frequently disobeys and
//! wraps the payload in code fences anyway, which `pipeline/script.rs`
//! strips before parsing.

use crate::model::{ChapterDraft, ParsedDocument};
use std::fmt::Write as _;

/// Where a chapter sits in the episode, which changes the framing
/// instructions for its dialogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChapterPosition {
    First,
    Interior,
    Last,
    /// A single-chapter episode is both opener and closer.
    Only,
}

impl ChapterPosition {
    /// Classify chapter `index` out of `total`.
    pub fn of(index: usize, total: usize) -> Self {
        match (index == 0, index + 1 == total) {
            (true, true) => ChapterPosition::Only,
            (true, false) => ChapterPosition::First,
            (false, true) => ChapterPosition::Last,
            (false, false) => ChapterPosition::Interior,
        }
    }
}

/// Truncate to at most `max` characters on a char boundary.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Prompt for the chapter-outline call: 3–10 chapters with title, hook, and
/// key concepts, seeded with the first 15 section summaries.
pub fn chapter_outline(doc: &ParsedDocument) -> String {
    let mut sections = String::new();
    for s in doc.sections.iter().take(15) {
        let _ = writeln!(sections, "- {}: {}...", s.title, truncate_chars(&s.body, 150));
    }

    format!(
        r#"Create a comprehensive list of podcast chapters for this academic paper.
Determine the appropriate number of chapters (minimum 3, up to 10) depending on the document's complexity and length.

Title: {title}
Authors: {authors}
Sections found:
{sections}
Return ONLY a JSON object with no markdown:
{{
  "chapters": [
    {{
      "id": 1,
      "title": "Short catchy chapter title",
      "hook": "Surprising opening question or fact",
      "concepts": ["concept1", "concept2"]
    }}
  ]
}}"#,
        title = doc.title(),
        authors = doc.authors(),
        sections = sections,
    )
}

/// Prompt for one chapter's dialogue: a 12–20 line two-host conversation
/// seeded with the chapter hook/concepts and up to 1500 characters of paper
/// context.
pub fn chapter_dialogue(draft: &ChapterDraft, position: ChapterPosition, context: &str) -> String {
    let intro = match position {
        ChapterPosition::First | ChapterPosition::Only => {
            "Open with a podcast welcome and tease the paper's most interesting finding."
        }
        _ => "Continue the conversation naturally from the previous chapter.",
    };
    let outro = match position {
        ChapterPosition::Last | ChapterPosition::Only => {
            "End with an encouraging sign-off and tell listeners to take the quiz!"
        }
        _ => "End by teasing the next chapter.",
    };
    let concepts = if draft.concepts.is_empty() {
        "the main ideas".to_string()
    } else {
        draft.concepts.join(", ")
    };

    format!(
        r#"Write podcast dialogue between two hosts discussing an academic paper.

Host A: Curious, funny, asks simple relatable questions.
Host B: Knowledgeable expert, explains clearly with fun analogies.

Chapter: "{title}"
Opening hook: "{hook}"
Key concepts: {concepts}

Paper context:
{context}

Instructions:
1. {intro}
2. Host A opens with the hook in their very first line
3. Include one funny joke or analogy
4. {outro}
5. Write a natural, engaging conversation. Aim for 12 to 20 lines total, alternating A and B.

Return ONLY a JSON array with no markdown:
[
  {{"host": "A", "text": "line here"}},
  {{"host": "B", "text": "line here"}}
]"#,
        title = draft.title,
        hook = draft.hook,
        concepts = concepts,
        context = truncate_chars(context, 1500),
    )
}

/// Prompt for the study-materials call: one markdown study guide plus 6–10
/// quiz questions, seeded with up to 80 000 characters of raw text.
pub fn study_materials(doc: &ParsedDocument) -> String {
    format!(
        r####"Create HIGHLY DETAILED and COMPREHENSIVE study materials for this academic paper.

Paper: "{title}" by {authors}

Text excerpt (up to 80,000 characters):
{text}

Return ONLY a JSON object with no markdown:
{{
  "study_guide": "## Core Contribution\nA thorough 4-5 sentence explanation.\n\n## Key Methodology\nDetailed breakdown of how they did it, including parameters or data sources.\n\n## Important Results\nA comprehensive list of the key numbers, datasets, and discoveries.\n\n## Why It Matters\nBroad implications and real world impact.",
  "quiz": [
    {{
      "question": "Clear question about the paper?",
      "options": ["A. first", "B. second", "C. third", "D. fourth"],
      "correct_index": 0,
      "explanation": "Why this answer is correct."
    }}
  ]
}}

Write between 6 and 10 quiz questions depending on the length and density of the paper."####,
        title = doc.title(),
        authors = doc.authors(),
        text = truncate_chars(&doc.raw_text, 80_000),
    )
}
