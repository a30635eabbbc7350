//! Inference backends: polymorphic "waveform in, score distribution out".
//!
//! Triage logic never depends on which backend produced a distribution; any
//! pretrained or rule-based classifier can sit behind
//! [`EmotionInferenceEngine`].

pub mod acoustic;
#[cfg(feature = "onnx")]
pub mod onnx;
pub mod remote;

use crate::audio::Waveform;
use crate::config::{EngineConfig, TriageConfig};
use crate::emotion::{EmotionCategory, EmotionScores};
use crate::error::{TriageError, TriageResult};

/// Trait for speech-emotion inference backends.
///
/// `infer` is an opaque blocking call; implementations backed by stateful
/// models must serialize their own access (see [`onnx::OnnxEmotionEngine`])
/// rather than exposing that constraint to callers.
pub trait EmotionInferenceEngine: Send + Sync {
    /// Stable backend name, used in error context and verdict metadata.
    fn name(&self) -> &str;

    /// The fixed label set this backend scores over.
    fn labels(&self) -> &[EmotionCategory];

    /// Classify a canonical waveform into a complete score distribution over
    /// [`EmotionInferenceEngine::labels`]. Fails with
    /// [`TriageError::Precondition`] on non-canonical input and
    /// [`TriageError::Inference`] on backend failure; never falls back to a
    /// default distribution.
    fn infer(&self, waveform: &Waveform) -> TriageResult<EmotionScores>;
}

/// Create an engine instance based on configuration
pub fn create_engine(config: &TriageConfig) -> TriageResult<Box<dyn EmotionInferenceEngine>> {
    match &config.engine {
        EngineConfig::Acoustic => Ok(Box::new(acoustic::AcousticRuleEngine::new(
            config.target_sample_rate,
        ))),
        EngineConfig::Remote {
            api_url,
            api_key,
            model,
        } => Ok(Box::new(remote::RemoteEmotionEngine::new(
            api_url.clone(),
            api_key.clone(),
            model.clone(),
            config.target_sample_rate,
        )?)),
        #[cfg(feature = "onnx")]
        EngineConfig::Onnx { model_path } => Ok(Box::new(onnx::OnnxEmotionEngine::load(
            model_path,
            config.target_sample_rate,
        )?)),
        #[cfg(not(feature = "onnx"))]
        EngineConfig::Onnx { .. } => Err(TriageError::Config(
            "this build does not include the `onnx` feature".to_string(),
        )),
    }
}

/// Normalization is the normalizer's sole responsibility: an engine handed
/// non-canonical audio fails instead of resampling on its own.
pub(crate) fn ensure_canonical(waveform: &Waveform, expected_rate: u32) -> TriageResult<()> {
    if waveform.sample_rate() != expected_rate {
        return Err(TriageError::Precondition(format!(
            "engine expects {} Hz mono input, got {} Hz",
            expected_rate,
            waveform.sample_rate()
        )));
    }
    Ok(())
}
