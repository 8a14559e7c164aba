//! Job lifecycle: the per-paper state machine and the orchestrator that
//! drives it through the pipeline stages.
//!
//! ## Why a snapshot store
//!
//! Jobs are mutated only by their own background task, but read from
//! anywhere (CLI polling loops, tests, a future HTTP layer). [`JobStore`]
//! therefore hands out cloned snapshots instead of guarded references: a
//! reader can never observe a half-applied transition, and the lock is held
//! only for the duration of a clone or a closure-scoped update.
//!
//! ## Failure containment
//!
//! Any error raised by a stage terminates *that job*: status flips to
//! `Error`, progress resets to zero, and the error's display text becomes
//! the job message. Nothing propagates across jobs and the orchestrator
//! itself never dies.

use crate::config::PipelineConfig;
use crate::error::PodcastError;
use crate::model::{
    grade_quiz, JobStatus, ParsedDocument, PodcastAudio, PodcastScript, QuizResult,
    QuizSubmission, VoicePairing,
};
use crate::pipeline::{generate_script, mix_podcast, synthesise_script};
use crate::providers::{SpeechSynthesizer, TextGenerator};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info};

// ── Job state ────────────────────────────────────────────────────────────

/// Snapshot of one podcast-generation job.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: String,
    pub status: JobStatus,
    /// Coarse milestone percentage, 0–100.
    pub progress: u8,
    /// Human-readable status line; on failure, the error text.
    pub message: String,
    pub voices: VoicePairing,
    /// Available as soon as script assembly completes, before any audio
    /// exists.
    pub script: Option<PodcastScript>,
    pub audio: Option<PodcastAudio>,
}

impl Job {
    fn new(id: String, voices: VoicePairing) -> Self {
        Self {
            id,
            status: JobStatus::Pending,
            progress: 5,
            message: "Queued".into(),
            voices,
            script: None,
            audio: None,
        }
    }
}

/// Shared, clone-cheap store of job snapshots.
#[derive(Clone, Default)]
pub struct JobStore {
    jobs: Arc<RwLock<HashMap<String, Job>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a job, if it exists.
    pub fn get(&self, job_id: &str) -> Option<Job> {
        self.jobs.read().get(job_id).cloned()
    }

    pub fn insert(&self, job: Job) {
        self.jobs.write().insert(job.id.clone(), job);
    }

    /// Atomically claim a job slot under one write lock.
    ///
    /// Inserts a fresh `Pending` job and returns its snapshot, unless a
    /// non-`Error` job already occupies the slot, in which case that job's
    /// snapshot is returned as the error. Two concurrent starts for the
    /// same id can therefore never both claim it.
    fn claim(&self, job_id: &str, voices: VoicePairing) -> Result<Job, Job> {
        let mut jobs = self.jobs.write();
        if let Some(existing) = jobs.get(job_id) {
            if existing.status != JobStatus::Error {
                return Err(existing.clone());
            }
        }
        let job = Job::new(job_id.to_string(), voices);
        jobs.insert(job_id.to_string(), job.clone());
        Ok(job)
    }

    /// Apply a mutation to a job under the write lock.
    fn update(&self, job_id: &str, f: impl FnOnce(&mut Job)) {
        if let Some(job) = self.jobs.write().get_mut(job_id) {
            f(job);
        }
    }
}

// ── Document source ──────────────────────────────────────────────────────

/// Where parsed papers come from. The parsing collaborator lives behind
/// this seam so the orchestrator never sees PDFs.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn fetch(&self, job_id: &str) -> Option<ParsedDocument>;
}

/// Document source backed by a map, for the CLI and tests.
#[derive(Default)]
pub struct InMemoryDocumentSource {
    docs: RwLock<HashMap<String, ParsedDocument>>,
}

impl InMemoryDocumentSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, doc: ParsedDocument) {
        self.docs.write().insert(doc.job_id.clone(), doc);
    }
}

#[async_trait]
impl DocumentSource for InMemoryDocumentSource {
    async fn fetch(&self, job_id: &str) -> Option<ParsedDocument> {
        self.docs.read().get(job_id).cloned()
    }
}

// ── Orchestrator ─────────────────────────────────────────────────────────

/// Drives jobs through scripting, synthesis, and mixing on background
/// tasks.
///
/// Providers are optional with different consequences: no text generator
/// fails the job at the scripting stage (there is nothing sensible to say
/// without one), while no speech synthesizer degrades to placeholder tone
/// audio so the rest of the pipeline stays exercisable.
pub struct Orchestrator {
    store: JobStore,
    documents: Arc<dyn DocumentSource>,
    text: Option<Arc<dyn TextGenerator>>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    config: Arc<PipelineConfig>,
    handles: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl Orchestrator {
    pub fn new(
        documents: Arc<dyn DocumentSource>,
        text: Option<Arc<dyn TextGenerator>>,
        speech: Option<Arc<dyn SpeechSynthesizer>>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            store: JobStore::new(),
            documents,
            text,
            speech,
            config: Arc::new(config),
            handles: Mutex::new(HashMap::new()),
        }
    }

    /// The shared job store, for polling from other tasks.
    pub fn store(&self) -> JobStore {
        self.store.clone()
    }

    /// Start (or restart) podcast generation for a parsed document.
    ///
    /// Idempotent: a job that is running or finished returns its current
    /// snapshot untouched. Only a job in the `Error` state is restarted
    /// from scratch.
    pub async fn start_generation(
        &self,
        job_id: &str,
        voices: VoicePairing,
    ) -> Result<Job, PodcastError> {
        if let Some(existing) = self.store.get(job_id) {
            if existing.status != JobStatus::Error {
                info!("[{job_id}] Generation already {}", existing.status);
                return Ok(existing);
            }
            info!("[{job_id}] Restarting after previous error");
        }

        let doc = self
            .documents
            .fetch(job_id)
            .await
            .ok_or_else(|| PodcastError::DocumentNotFound {
                job_id: job_id.to_string(),
            })?;

        // The early check above is only a fast path; the claim is the
        // authoritative check-and-insert. A concurrent start that won the
        // slot in the meantime yields its snapshot here instead of a
        // second pipeline.
        let snapshot = match self.store.claim(job_id, voices) {
            Ok(job) => job,
            Err(existing) => {
                info!("[{job_id}] Generation already {}", existing.status);
                return Ok(existing);
            }
        };

        let store = self.store.clone();
        let text = self.text.clone();
        let speech = self.speech.clone();
        let config = Arc::clone(&self.config);
        let id = job_id.to_string();
        let handle = tokio::spawn(async move {
            if let Err(e) = run_pipeline(&store, &id, doc, voices, text, speech, &config).await {
                error!("[{id}] Job failed: {e}");
                store.update(&id, |job| {
                    job.status = JobStatus::Error;
                    job.progress = 0;
                    job.message = e.to_string();
                });
            }
        });
        self.handles.lock().insert(job_id.to_string(), handle);

        Ok(snapshot)
    }

    /// Wait for a job's background task to finish and return the final
    /// snapshot. Returns `None` when no task was ever started.
    pub async fn wait(&self, job_id: &str) -> Option<Job> {
        let handle = self.handles.lock().remove(job_id)?;
        // The task catches its own errors; a join error means it panicked.
        if let Err(e) = handle.await {
            error!("[{job_id}] Job task panicked: {e}");
            self.store.update(job_id, |job| {
                job.status = JobStatus::Error;
                job.progress = 0;
                job.message = format!("Internal error: {e}");
            });
        }
        self.store.get(job_id)
    }

    /// Grade a quiz submission against a completed job's questions.
    pub fn submit_quiz(
        &self,
        job_id: &str,
        submission: &QuizSubmission,
    ) -> Result<QuizResult, PodcastError> {
        let job = self
            .store
            .get(job_id)
            .ok_or_else(|| PodcastError::JobNotFound {
                job_id: job_id.to_string(),
            })?;
        let script = job.script.ok_or_else(|| {
            PodcastError::Internal(format!("job '{job_id}' has no script yet"))
        })?;
        Ok(grade_quiz(&script.quiz_questions, submission))
    }
}

/// The pipeline body, one invocation per job.
async fn run_pipeline(
    store: &JobStore,
    job_id: &str,
    doc: ParsedDocument,
    voices: VoicePairing,
    text: Option<Arc<dyn TextGenerator>>,
    speech: Option<Arc<dyn SpeechSynthesizer>>,
    config: &PipelineConfig,
) -> Result<(), PodcastError> {
    store.update(job_id, |job| {
        job.status = JobStatus::Parsing;
        job.progress = 15;
        job.message = "Document loaded".into();
    });

    // ── Scripting ────────────────────────────────────────────────────────
    let generator = text.ok_or_else(|| PodcastError::MissingCredential {
        setting: "GOOGLE_API_KEY".into(),
        hint: "Set it in your environment to enable script generation.".into(),
    })?;

    store.update(job_id, |job| {
        job.status = JobStatus::Scripting;
        job.progress = 20;
        job.message = "Writing the script".into();
    });
    let mut script = generate_script(generator.as_ref(), &doc, config).await?;

    // Persist the script immediately so study materials and the quiz are
    // usable even if a later stage fails.
    store.update(job_id, |job| {
        job.progress = 50;
        job.message = "Script ready".into();
        job.script = Some(script.clone());
    });

    // ── Synthesis ────────────────────────────────────────────────────────
    store.update(job_id, |job| {
        job.status = JobStatus::Synthesising;
        job.progress = 55;
        job.message = "Recording the hosts".into();
    });
    let lines = synthesise_script(speech.as_deref(), &script, voices, config).await?;

    // ── Mixing ───────────────────────────────────────────────────────────
    store.update(job_id, |job| {
        job.status = JobStatus::Mixing;
        job.progress = 80;
        job.message = "Mixing audio".into();
    });
    let mix = mix_podcast(&script, &lines, config).await?;

    // Replace each chapter's word-count estimate with its real audio span.
    // The mix yields one timestamped chapter per script chapter except in
    // the degenerate no-speech case, where the estimates stand.
    if mix.chapters.len() == script.chapters.len() {
        for (ch, ts) in script.chapters.iter_mut().zip(&mix.chapters) {
            ch.estimated_duration_sec = (ts.end_sec - ts.start_sec).round() as u64;
        }
    }

    let audio = PodcastAudio {
        job_id: job_id.to_string(),
        audio_path: mix.audio_path,
        captions_path: mix.captions_path,
        duration_sec: mix.duration_sec,
        chapters: mix.chapters,
    };
    store.update(job_id, |job| {
        job.status = JobStatus::Done;
        job.progress = 100;
        job.message = "Podcast ready".into();
        job.script = Some(script);
        job.audio = Some(audio);
    });
    info!("[{job_id}] Job complete");
    Ok(())
}
