//! The three-stage podcast pipeline: script assembly, speech synthesis,
//! and the final mix.
//!
//! Each stage is a free async function taking the shared [`crate::config::PipelineConfig`]
//! and the previous stage's output; the orchestrator in [`crate::job`] wires
//! them together and owns status/progress bookkeeping.

pub mod mix;
pub mod script;
pub mod synth;

pub use mix::{mix_podcast, MixOutput};
pub use script::generate_script;
pub use synth::{synthesise_script, SynthesisedLine};
