//! Voice Message Triage Service for Healthcare Review Queues
//!
//! Infers acoustic-emotional state from recorded patient voice messages and
//! maps it to a clinical review priority, so reviewers can order their queue
//! by urgency instead of arrival time. The verdict is a screening signal for
//! humans, never a diagnosis.
//!
//! # Pipeline
//!
//! 1. **Normalize**: decode any supported container, downmix to mono,
//!    resample to the canonical rate, bound the duration
//!    ([`AudioNormalizer`])
//! 2. **Infer**: score the waveform over emotion categories through a
//!    pluggable backend ([`EmotionInferenceEngine`]): deterministic acoustic
//!    heuristics, a self-hosted inference server, or a local ONNX model
//!    (feature `onnx`)
//! 3. **Classify**: derive arousal/valence signals and apply the base
//!    priority mapping plus the override rules ([`TriageClassifier`])
//!
//! Failures surface as distinct [`TriageError`] variants and are never
//! converted into a default verdict: a recording that could not be analyzed
//! must be visibly different from one that triaged as routine.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use voice_triage_service::{TriageConfig, TriagePipeline};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = TriageConfig::from_env()?;
//! let pipeline = TriagePipeline::new(config)?;
//!
//! let verdict = pipeline.run_path("message_0441.wav")?;
//! println!("{}: {}", verdict.priority, verdict.rationale);
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod config;
pub mod emotion;
pub mod engines;
pub mod error;
pub mod pipeline;
pub mod triage;
pub mod verdict;

pub use audio::{AudioNormalizer, Waveform};
pub use config::{DurationPolicy, EngineConfig, TriageConfig};
pub use emotion::{
    ArousalLevel, ArousalValenceTable, DerivedAcousticSignals, EmotionCategory, EmotionScores,
    ValenceLevel,
};
pub use engines::{create_engine, EmotionInferenceEngine};
pub use error::{TriageError, TriageResult};
pub use pipeline::TriagePipeline;
pub use triage::TriageClassifier;
pub use verdict::{OverrideRule, Priority, TriageVerdict, VerdictMetadata};
