//! CLI binary for papercast.
//!
//! A thin shim over the library crate that loads a parsed-document JSON
//! file, runs the generation pipeline, and prints the artifact paths.

use anyhow::{Context, Result};
use clap::Parser;
use papercast::{
    ElevenLabsClient, GeminiTextClient, InMemoryDocumentSource, JobStatus, Orchestrator,
    ParsedDocument, PipelineConfig, VoicePairing,
};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Generate an episode from a parsed paper
  papercast parsed/attention.json

  # Two male hosts, custom output directory
  papercast --voices MM --out-dir ./episodes parsed/attention.json

  # Placeholder audio only (no ELEVENLABS_API_KEY set)
  papercast parsed/attention.json

INPUT FORMAT:
  The input file is the JSON output of the PDF parsing service: job id,
  section list, raw text, and a metadata map with title and authors.

ENVIRONMENT VARIABLES:
  GOOGLE_API_KEY       Gemini API key (required; script generation)
  ELEVENLABS_API_KEY   ElevenLabs API key (optional; placeholder tones
                       are synthesised when unset)

SETUP:
  1. Set API key:   export GOOGLE_API_KEY=...
  2. Generate:      papercast parsed/paper.json
"#;

/// Generate a two-host podcast episode from a parsed academic paper.
#[derive(Parser, Debug)]
#[command(
    name = "papercast",
    version,
    about = "Generate a two-host podcast episode from a parsed academic paper",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Path to the parsed-document JSON file.
    input: PathBuf,

    /// Voice pairing for the two hosts: MM, FM, or FF.
    #[arg(long, env = "PAPERCAST_VOICES", default_value = "FM")]
    voices: String,

    /// Directory for the mixed audio and caption files.
    #[arg(short, long, env = "PAPERCAST_OUT_DIR", default_value = "./outputs")]
    out_dir: PathBuf,

    /// Directory searched for background_music.wav.
    #[arg(long, env = "PAPERCAST_ASSETS_DIR", default_value = "./audio_assets")]
    assets_dir: PathBuf,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PAPERCAST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PAPERCAST_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.quiet {
        "error"
    } else if cli.verbose {
        "debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Load the parsed document ─────────────────────────────────────────
    let json = tokio::fs::read_to_string(&cli.input)
        .await
        .with_context(|| format!("Failed to read {}", cli.input.display()))?;
    let doc: ParsedDocument =
        serde_json::from_str(&json).context("Input is not a valid parsed-document JSON file")?;
    let job_id = doc.job_id.clone();

    if !cli.quiet {
        eprintln!(
            "{} {} {}",
            bold(doc.title()),
            dim("by"),
            dim(doc.authors())
        );
    }

    // ── Providers from the environment ───────────────────────────────────
    let text = match std::env::var("GOOGLE_API_KEY") {
        Ok(key) => Some(Arc::new(
            GeminiTextClient::new(key).map_err(|e| anyhow::anyhow!("{e}"))?,
        ) as Arc<dyn papercast::TextGenerator>),
        Err(_) => None,
    };
    let speech = match std::env::var("ELEVENLABS_API_KEY") {
        Ok(key) => Some(Arc::new(
            ElevenLabsClient::new(key).map_err(|e| anyhow::anyhow!("{e}"))?,
        ) as Arc<dyn papercast::SpeechSynthesizer>),
        Err(_) => {
            if !cli.quiet {
                eprintln!(
                    "{}",
                    dim("ELEVENLABS_API_KEY not set: using placeholder audio")
                );
            }
            None
        }
    };

    let config = PipelineConfig::builder()
        .output_dir(&cli.out_dir)
        .assets_dir(&cli.assets_dir)
        .build()
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    let docs = Arc::new(InMemoryDocumentSource::new());
    docs.insert(doc);
    let orchestrator = Orchestrator::new(docs, text, speech, config);

    // ── Run generation ───────────────────────────────────────────────────
    let voices = VoicePairing::from_loose(&cli.voices);
    orchestrator
        .start_generation(&job_id, voices)
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;

    // Poll the store for milestone changes while the job runs.
    let store = orchestrator.store();
    let mut last_progress = 0u8;
    loop {
        if let Some(job) = store.get(&job_id) {
            if !cli.quiet && job.progress != last_progress {
                eprintln!(
                    "  {} {:>3}%  {}",
                    dim("·"),
                    job.progress,
                    job.message
                );
                last_progress = job.progress;
            }
            if job.status.is_terminal() {
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(250)).await;
    }

    let job = orchestrator
        .wait(&job_id)
        .await
        .context("Job task vanished")?;

    match job.status {
        JobStatus::Done => {
            let audio = job.audio.context("Done job has no audio artifact")?;
            if !cli.quiet {
                eprintln!(
                    "{} Episode ready  {}",
                    green("✔"),
                    dim(&format!("{:.1}s", audio.duration_sec))
                );
                for ch in &audio.chapters {
                    eprintln!(
                        "   {} {:>7.1}s  {}",
                        dim("·"),
                        ch.start_sec,
                        ch.title
                    );
                }
            }
            println!("{}", audio.audio_path.display());
            println!("{}", audio.captions_path.display());
            Ok(())
        }
        _ => {
            eprintln!("{} {}", red("✘"), job.message);
            std::process::exit(1);
        }
    }
}
