//! Pipeline orchestration: audio in, triage verdict out.
//!
//! `normalize -> infer -> classify` run in strict sequence; every error kind
//! surfaces unchanged to the caller. Retry policy belongs to whatever feeds
//! the pipeline, and cancellation/timeouts to whatever wraps it.

use std::path::{Path, PathBuf};

use logger_redacted::{PiiRedactor, RedactionConfig};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::audio::AudioNormalizer;
use crate::config::TriageConfig;
use crate::engines::{create_engine, EmotionInferenceEngine};
use crate::error::{TriageError, TriageResult};
use crate::triage::TriageClassifier;
use crate::verdict::{TriageVerdict, VerdictMetadata};

/// One triage pipeline: a normalizer, an inference backend, and a classifier
/// bound to one configuration.
///
/// Invocations share no mutable state, so one pipeline can serve many
/// recordings concurrently (see [`TriagePipeline::run_batch`]).
pub struct TriagePipeline {
    config: TriageConfig,
    normalizer: AudioNormalizer,
    engine: Box<dyn EmotionInferenceEngine>,
    classifier: TriageClassifier,
    redactor: PiiRedactor,
}

impl TriagePipeline {
    /// Build a pipeline from configuration, constructing the configured
    /// inference backend.
    pub fn new(config: TriageConfig) -> TriageResult<Self> {
        let engine = create_engine(&config)?;
        Self::with_engine(config, engine)
    }

    /// Build a pipeline around an already-constructed backend.
    ///
    /// This is the substitution seam: any implementation of
    /// [`EmotionInferenceEngine`] works without touching triage logic.
    pub fn with_engine(
        config: TriageConfig,
        engine: Box<dyn EmotionInferenceEngine>,
    ) -> TriageResult<Self> {
        if let Some(expected) = &config.emotion_labels {
            let mut expected: Vec<_> = expected.clone();
            let mut actual: Vec<_> = engine.labels().to_vec();
            expected.sort();
            actual.sort();
            if expected != actual {
                return Err(TriageError::Config(format!(
                    "engine '{}' scores {:?}, configuration expects {:?}",
                    engine.name(),
                    actual,
                    expected
                )));
            }
        }

        let normalizer = AudioNormalizer::new(&config);
        let classifier = TriageClassifier::new(config.arousal_valence_table.clone());

        info!(engine = engine.name(), "triage pipeline ready");

        Ok(Self {
            config,
            normalizer,
            engine,
            classifier,
            redactor: PiiRedactor::new(RedactionConfig::default()),
        })
    }

    pub fn config(&self) -> &TriageConfig {
        &self.config
    }

    /// Triage one recording supplied as raw bytes of any decodable format.
    pub fn run(&self, audio: &[u8]) -> TriageResult<TriageVerdict> {
        let waveform = self.normalizer.normalize_bytes(audio, None)?;
        self.run_waveform(waveform)
    }

    /// Triage one recording stored on disk.
    pub fn run_path<P: AsRef<Path>>(&self, path: P) -> TriageResult<TriageVerdict> {
        let path = path.as_ref();
        debug!(
            source = %self.redactor.redact(&path.display().to_string()),
            "triaging recording"
        );
        let waveform = self.normalizer.normalize_path(path)?;
        self.run_waveform(waveform)
    }

    /// Triage many independent recordings in parallel.
    ///
    /// Messages are independent, so failures are isolated per entry: one
    /// undecodable recording never fails the batch.
    pub fn run_batch(&self, paths: &[PathBuf]) -> Vec<TriageResult<TriageVerdict>> {
        paths
            .par_iter()
            .map(|path| {
                let result = self.run_path(path);
                if let Err(e) = &result {
                    warn!(
                        source = %self.redactor.redact(&path.display().to_string()),
                        error = %self.redactor.redact(&e.to_string()),
                        "triage failed for recording"
                    );
                }
                result
            })
            .collect()
    }

    fn run_waveform(&self, waveform: crate::audio::Waveform) -> TriageResult<TriageVerdict> {
        let input_duration_seconds = waveform.duration_seconds();
        debug!(
            duration_seconds = input_duration_seconds,
            sample_rate = waveform.sample_rate(),
            "normalized audio"
        );

        let scores = self.engine.infer(&waveform)?;
        let verdict = self
            .classifier
            .classify(&scores)?
            .with_metadata(VerdictMetadata {
                backend: self.engine.name().to_string(),
                model: None,
                input_duration_seconds,
            });

        info!(
            verdict_id = %verdict.id,
            priority = %verdict.priority,
            dominant = %verdict.dominant_emotion,
            confidence = verdict.confidence,
            override_applied = verdict.override_applied.map(|r| r.as_str()),
            "triage verdict"
        );

        Ok(verdict)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::Waveform;
    use crate::emotion::{EmotionCategory, EmotionScores};
    use crate::verdict::{OverrideRule, Priority};
    use std::io::Cursor;

    fn wav_bytes(sample_rate: u32, frames: usize, sample: impl Fn(usize) -> f32) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..frames {
                let v = (sample(i).clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                writer.write_sample(v).unwrap();
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    #[test]
    fn test_end_to_end_silence_is_flagged_for_review() {
        let _ = logger_redacted::init_tracing(&logger_redacted::LoggerConfig::default());
        let pipeline = TriagePipeline::new(TriageConfig::default()).unwrap();
        let verdict = pipeline.run(&wav_bytes(16_000, 16_000, |_| 0.0)).unwrap();

        // Absence of response is itself clinically meaningful: a silent
        // message never files as routine.
        assert_eq!(verdict.priority, Priority::ElevatedReview);
        assert_eq!(
            verdict.override_applied,
            Some(OverrideRule::LowArousalAmbiguity)
        );
        assert_eq!(verdict.metadata.backend, "acoustic-rules");
        assert!((verdict.metadata.input_duration_seconds - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_end_to_end_tone_produces_complete_verdict() {
        let pipeline = TriagePipeline::new(TriageConfig::default()).unwrap();
        let bytes = wav_bytes(44_100, 44_100, |i| {
            (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44_100.0).sin() * 0.5
        });
        let verdict = pipeline.run(&bytes).unwrap();

        assert!(matches!(
            verdict.priority,
            Priority::Routine | Priority::ElevatedReview | Priority::Urgent
        ));
        assert!(!verdict.rationale.is_empty());
        assert!(verdict.confidence >= 0.0 && verdict.confidence <= 1.0);
    }

    #[test]
    fn test_decode_error_propagates_unchanged() {
        let pipeline = TriagePipeline::new(TriageConfig::default()).unwrap();
        assert!(matches!(pipeline.run(&[]), Err(TriageError::Decode(_))));
    }

    struct FixedEngine(Vec<(EmotionCategory, f32)>);

    impl EmotionInferenceEngine for FixedEngine {
        fn name(&self) -> &str {
            "fixed"
        }
        fn labels(&self) -> &[EmotionCategory] {
            EmotionCategory::all()
        }
        fn infer(&self, _waveform: &Waveform) -> TriageResult<EmotionScores> {
            Ok(EmotionScores::from_pairs(&self.0))
        }
    }

    struct FailingEngine;

    impl EmotionInferenceEngine for FailingEngine {
        fn name(&self) -> &str {
            "failing"
        }
        fn labels(&self) -> &[EmotionCategory] {
            EmotionCategory::all()
        }
        fn infer(&self, waveform: &Waveform) -> TriageResult<EmotionScores> {
            Err(TriageError::Inference {
                backend: self.name().to_string(),
                input_seconds: waveform.duration_seconds(),
                message: "backend unavailable".to_string(),
            })
        }
    }

    #[test]
    fn test_substituted_engine_drives_verdict() {
        let pipeline = TriagePipeline::with_engine(
            TriageConfig::default(),
            Box::new(FixedEngine(vec![
                (EmotionCategory::Anger, 0.7),
                (EmotionCategory::Neutral, 0.3),
            ])),
        )
        .unwrap();

        let verdict = pipeline.run(&wav_bytes(16_000, 1_600, |_| 0.1)).unwrap();
        assert_eq!(verdict.priority, Priority::Urgent);
        assert_eq!(verdict.dominant_emotion, EmotionCategory::Anger);
        assert_eq!(verdict.metadata.backend, "fixed");
    }

    #[test]
    fn test_inference_error_propagates_unchanged() {
        let pipeline =
            TriagePipeline::with_engine(TriageConfig::default(), Box::new(FailingEngine)).unwrap();

        let err = pipeline.run(&wav_bytes(16_000, 1_600, |_| 0.1)).unwrap_err();
        match err {
            TriageError::Inference { backend, .. } => assert_eq!(backend, "failing"),
            other => panic!("expected inference error, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_engine_output_is_validation_error() {
        let pipeline = TriagePipeline::with_engine(
            TriageConfig::default(),
            Box::new(FixedEngine(vec![
                (EmotionCategory::Anger, 0.5),
                (EmotionCategory::Sadness, 0.7),
            ])),
        )
        .unwrap();

        let err = pipeline.run(&wav_bytes(16_000, 1_600, |_| 0.1)).unwrap_err();
        assert!(matches!(err, TriageError::Validation(_)));
    }

    #[test]
    fn test_label_set_mismatch_fails_construction() {
        let config = TriageConfig {
            emotion_labels: Some(vec![EmotionCategory::Anger, EmotionCategory::Neutral]),
            ..Default::default()
        };
        assert!(matches!(
            TriagePipeline::new(config),
            Err(TriageError::Config(_))
        ));
    }

    #[test]
    fn test_batch_isolates_failures() {
        let dir = tempfile::tempdir().unwrap();

        let good = dir.path().join("message.wav");
        std::fs::write(&good, wav_bytes(16_000, 8_000, |_| 0.0)).unwrap();

        let bad = dir.path().join("broken.wav");
        std::fs::write(&bad, []).unwrap();

        let pipeline = TriagePipeline::new(TriageConfig::default()).unwrap();
        let results = pipeline.run_batch(&[good, bad]);

        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(TriageError::Decode(_))));
    }

    #[test]
    fn test_batch_verdicts_match_sequential_runs() {
        let dir = tempfile::tempdir().unwrap();
        let mut paths = Vec::new();
        for i in 0..4 {
            let path = dir.path().join(format!("msg_{i}.wav"));
            let amplitude = 0.1 + 0.2 * i as f32;
            std::fs::write(
                &path,
                wav_bytes(16_000, 8_000, move |j| {
                    (2.0 * std::f32::consts::PI * 220.0 * j as f32 / 16_000.0).sin() * amplitude
                }),
            )
            .unwrap();
            paths.push(path);
        }

        let pipeline = TriagePipeline::new(TriageConfig::default()).unwrap();
        let batch = pipeline.run_batch(&paths);

        for (path, batched) in paths.iter().zip(batch) {
            let sequential = pipeline.run_path(path).unwrap();
            let batched = batched.unwrap();
            assert_eq!(batched.priority, sequential.priority);
            assert_eq!(batched.dominant_emotion, sequential.dominant_emotion);
            assert_eq!(batched.rationale, sequential.rationale);
        }
    }
}
