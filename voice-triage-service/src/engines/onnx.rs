//! Local wav2vec2 emotion model via ONNX Runtime (feature = "onnx").
//!
//! Wraps a pretrained IEMOCAP-class speech emotion export. The model takes
//! the canonical 16 kHz mono signal as a `[1, N]` float tensor and emits one
//! logit per label.

use std::path::Path;
use std::sync::Mutex;

use ort::session::builder::{GraphOptimizationLevel, SessionBuilder};
use ort::session::Session;
use ort::value::Value;
use tracing::{debug, info};

use crate::audio::Waveform;
use crate::emotion::{EmotionCategory, EmotionScores, SUM_TOLERANCE};
use crate::engines::{ensure_canonical, EmotionInferenceEngine};
use crate::error::{TriageError, TriageResult};

/// Output order fixed by the exporter's label encoder (`neu`, `ang`, `hap`,
/// `sad` for the IEMOCAP four-class checkpoints).
const MODEL_LABELS: [EmotionCategory; 4] = [
    EmotionCategory::Neutral,
    EmotionCategory::Anger,
    EmotionCategory::Happiness,
    EmotionCategory::Sadness,
];

pub struct OnnxEmotionEngine {
    // ONNX Runtime sessions are stateful across a run; access is serialized
    // here so callers never see the constraint.
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    expected_rate: u32,
}

impl OnnxEmotionEngine {
    pub fn load(model_path: &Path, expected_rate: u32) -> TriageResult<Self> {
        info!(model_path = %model_path.display(), "loading ONNX emotion model");

        let session = SessionBuilder::new()
            .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|builder| builder.commit_from_file(model_path))
            .map_err(|e| {
                TriageError::Config(format!(
                    "failed to load ONNX model {}: {e}",
                    model_path.display()
                ))
            })?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| TriageError::Config("ONNX model declares no inputs".to_string()))?;
        let output_name = session
            .outputs
            .first()
            .map(|output| output.name.clone())
            .ok_or_else(|| TriageError::Config("ONNX model declares no outputs".to_string()))?;

        debug!(input_name, output_name, "emotion model ready");

        Ok(Self {
            session: Mutex::new(session),
            input_name,
            output_name,
            expected_rate,
        })
    }

    fn inference_error(&self, waveform: &Waveform, message: String) -> TriageError {
        TriageError::Inference {
            backend: self.name().to_string(),
            input_seconds: waveform.duration_seconds(),
            message,
        }
    }
}

impl EmotionInferenceEngine for OnnxEmotionEngine {
    fn name(&self) -> &str {
        "wav2vec2-onnx"
    }

    fn labels(&self) -> &[EmotionCategory] {
        &MODEL_LABELS
    }

    fn infer(&self, waveform: &Waveform) -> TriageResult<EmotionScores> {
        ensure_canonical(waveform, self.expected_rate)?;

        let samples = waveform.samples().to_vec();
        let len = samples.len();

        let input: Value = Value::from_array(([1usize, len], samples))
            .map_err(|e| self.inference_error(waveform, format!("failed to build input tensor: {e}")))?
            .into();

        let logits: Vec<f32> = {
            let mut session = self
                .session
                .lock()
                .map_err(|_| self.inference_error(waveform, "model mutex poisoned".to_string()))?;

            let outputs = session
                .run(vec![(self.input_name.as_str(), input)])
                .map_err(|e| self.inference_error(waveform, format!("inference failed: {e}")))?;

            let (_, data) = outputs
                .get(self.output_name.as_str())
                .ok_or_else(|| {
                    self.inference_error(waveform, "model produced no output tensor".to_string())
                })?
                .try_extract_tensor::<f32>()
                .map_err(|e| {
                    self.inference_error(waveform, format!("failed to extract logits: {e}"))
                })?;
            data.to_vec()
        };

        if logits.len() < MODEL_LABELS.len() {
            return Err(TriageError::Validation(format!(
                "model emitted {} values, expected {}",
                logits.len(),
                MODEL_LABELS.len()
            )));
        }

        let probabilities = to_probabilities(&logits[..MODEL_LABELS.len()]);
        let scores = MODEL_LABELS
            .iter()
            .copied()
            .zip(probabilities)
            .collect();

        Ok(EmotionScores::new(scores))
    }
}

/// Accepts either raw logits or already-normalized probabilities; a softmax
/// is applied only when the values are not a proper distribution.
fn to_probabilities(values: &[f32]) -> Vec<f32> {
    let already_normalized = values.iter().all(|v| (0.0..=1.0).contains(v))
        && (values.iter().sum::<f32>() - 1.0).abs() <= SUM_TOLERANCE;
    if already_normalized {
        return values.to_vec();
    }

    let max = values.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = values.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
