use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::emotion::{ArousalValenceTable, EmotionCategory};
use crate::error::{TriageError, TriageResult};

/// What to do with a recording longer than `max_duration_seconds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurationPolicy {
    /// Keep the leading `max_duration_seconds` and log a warning.
    Truncate,
    /// Fail the run with a decode error.
    Reject,
}

/// Inference backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum EngineConfig {
    /// Deterministic acoustic heuristics; no model, fully offline.
    Acoustic,
    /// Self-hosted speech-emotion inference server (HTTP)
    Remote {
        api_url: String,
        api_key: Option<String>,
        model: Option<String>,
    },
    /// Local wav2vec2 emotion model via ONNX Runtime (feature = "onnx")
    Onnx { model_path: PathBuf },
}

/// Triage pipeline configuration.
///
/// Passed explicitly into [`crate::TriagePipeline::new`]; the pipeline reads
/// no ambient state, so a run is a pure function of its input and this
/// struct.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageConfig {
    pub engine: EngineConfig,
    /// Canonical sample rate the normalizer produces and engines expect.
    pub target_sample_rate: u32,
    /// Upper bound on analyzed audio, applied by the normalizer.
    pub max_duration_seconds: f64,
    pub duration_policy: DurationPolicy,
    /// Per-category arousal/valence coordinates for signal derivation.
    #[serde(default)]
    pub arousal_valence_table: ArousalValenceTable,
    /// When set, pipeline construction fails unless the configured engine
    /// scores exactly this label set.
    #[serde(default)]
    pub emotion_labels: Option<Vec<EmotionCategory>>,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::Acoustic,
            target_sample_rate: 16_000,
            max_duration_seconds: 30.0,
            duration_policy: DurationPolicy::Truncate,
            arousal_valence_table: ArousalValenceTable::default(),
            emotion_labels: None,
        }
    }
}

impl TriageConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> TriageResult<Self> {
        let target_sample_rate = std::env::var("TRIAGE_SAMPLE_RATE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(16_000);

        let max_duration_seconds = std::env::var("TRIAGE_MAX_DURATION_SECONDS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(30.0);

        let duration_policy = match std::env::var("TRIAGE_DURATION_POLICY") {
            Ok(policy) => match policy.to_lowercase().as_str() {
                "truncate" => DurationPolicy::Truncate,
                "reject" => DurationPolicy::Reject,
                other => {
                    return Err(TriageError::Config(format!(
                        "Unknown duration policy: {other}"
                    )))
                }
            },
            Err(_) => DurationPolicy::Truncate,
        };

        // Detect engine from environment
        let engine = if let Ok(engine_type) = std::env::var("TRIAGE_ENGINE") {
            match engine_type.to_lowercase().as_str() {
                "acoustic" => EngineConfig::Acoustic,
                "remote" => EngineConfig::Remote {
                    api_url: std::env::var("TRIAGE_EMOTION_API_URL")
                        .unwrap_or_else(|_| "http://localhost:8000".to_string()),
                    api_key: std::env::var("TRIAGE_EMOTION_API_KEY").ok(),
                    model: std::env::var("TRIAGE_EMOTION_MODEL").ok(),
                },
                "onnx" => EngineConfig::Onnx {
                    model_path: std::env::var("TRIAGE_ONNX_MODEL_PATH")
                        .map(PathBuf::from)
                        .map_err(|_| {
                            TriageError::Config(
                                "TRIAGE_ONNX_MODEL_PATH is required for the onnx engine"
                                    .to_string(),
                            )
                        })?,
                },
                other => {
                    return Err(TriageError::Config(format!(
                        "Unknown triage engine: {other}"
                    )))
                }
            }
        } else {
            // Default to the offline heuristic backend
            EngineConfig::Acoustic
        };

        Ok(Self {
            engine,
            target_sample_rate,
            max_duration_seconds,
            duration_policy,
            arousal_valence_table: ArousalValenceTable::default(),
            emotion_labels: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_matches_canonical_form() {
        let config = TriageConfig::default();
        assert_eq!(config.target_sample_rate, 16_000);
        assert_eq!(config.max_duration_seconds, 30.0);
        assert_eq!(config.duration_policy, DurationPolicy::Truncate);
        assert!(matches!(config.engine, EngineConfig::Acoustic));
    }

    #[test]
    fn test_engine_config_tagged_serialization() {
        let config = EngineConfig::Remote {
            api_url: "http://emotion.internal:8000".to_string(),
            api_key: None,
            model: Some("wav2vec2-iemocap".to_string()),
        };
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"type\":\"remote\""));

        let parsed: EngineConfig = serde_json::from_str(&json).unwrap();
        assert!(matches!(parsed, EngineConfig::Remote { .. }));
    }

    #[test]
    fn test_config_roundtrip() {
        let config = TriageConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: TriageConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.target_sample_rate, config.target_sample_rate);
        assert_eq!(parsed.arousal_valence_table, config.arousal_valence_table);
    }
}
