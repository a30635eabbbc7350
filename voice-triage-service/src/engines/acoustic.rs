//! Deterministic acoustic-heuristic backend.
//!
//! A screening heuristic over frame energy statistics, not a trained model:
//! loud, bursty speech reads as agitation, sustained noisy energy as
//! fear/panic, low energy with long pauses as flat or depressive affect.
//! Useful as an offline default and as a reference backend in tests; the
//! arousal-aware triage rules downstream are identical for every backend.

use std::collections::BTreeMap;

use crate::audio::Waveform;
use crate::emotion::{EmotionCategory, EmotionScores};
use crate::engines::{ensure_canonical, EmotionInferenceEngine};
use crate::error::TriageResult;

/// Frame length used for energy analysis (25 ms).
const FRAME_MS: u32 = 25;
/// Hop between frames (10 ms).
const HOP_MS: u32 = 10;
/// Frames quieter than this RMS are treated as pauses.
const VOICED_RMS_THRESHOLD: f32 = 0.01;

/// Evidence floor for the neutral category so that no single feature can
/// fully dominate the distribution.
const NEUTRAL_FLOOR: f32 = 0.25;

pub struct AcousticRuleEngine {
    expected_rate: u32,
}

impl AcousticRuleEngine {
    pub fn new(expected_rate: u32) -> Self {
        Self { expected_rate }
    }
}

impl EmotionInferenceEngine for AcousticRuleEngine {
    fn name(&self) -> &str {
        "acoustic-rules"
    }

    fn labels(&self) -> &[EmotionCategory] {
        EmotionCategory::all()
    }

    fn infer(&self, waveform: &Waveform) -> TriageResult<EmotionScores> {
        ensure_canonical(waveform, self.expected_rate)?;

        let features = FrameFeatures::extract(waveform.samples(), waveform.sample_rate());

        // Activation combines loudness with spectral busyness (ZCR proxy).
        let activation = clamp01(
            0.6 * clamp01(features.mean_voiced_rms / 0.2)
                + 0.4 * clamp01(features.mean_zcr / 0.25),
        );
        // Bursty energy (large frame-to-frame swings) reads as agitation.
        let agitation = clamp01(features.rms_std / 0.1);
        let brightness = clamp01(features.mean_zcr / 0.25);

        let mut weights: BTreeMap<EmotionCategory, f32> = BTreeMap::new();
        weights.insert(EmotionCategory::Anger, activation * agitation);
        weights.insert(
            EmotionCategory::Fear,
            activation * brightness * (1.0 - agitation),
        );
        weights.insert(
            EmotionCategory::Happiness,
            activation * (1.0 - agitation) * (1.0 - brightness),
        );
        weights.insert(
            EmotionCategory::Sadness,
            (1.0 - activation) * features.pause_ratio,
        );
        weights.insert(
            EmotionCategory::Calm,
            (1.0 - activation) * (1.0 - features.pause_ratio),
        );
        weights.insert(EmotionCategory::Neutral, NEUTRAL_FLOOR);

        EmotionScores::from_weights(weights)
    }
}

/// Frame-level energy statistics for one waveform.
#[derive(Debug, Clone, Copy, PartialEq)]
struct FrameFeatures {
    /// Mean RMS over voiced frames.
    mean_voiced_rms: f32,
    /// Standard deviation of RMS over voiced frames.
    rms_std: f32,
    /// Mean zero-crossing rate over voiced frames (crossings per sample).
    mean_zcr: f32,
    /// Fraction of frames below the voiced threshold.
    pause_ratio: f32,
}

impl FrameFeatures {
    fn extract(samples: &[f32], sample_rate: u32) -> Self {
        let frame_len = (sample_rate * FRAME_MS / 1000).max(1) as usize;
        let hop = (sample_rate * HOP_MS / 1000).max(1) as usize;

        let mut frame_rms: Vec<f32> = Vec::new();
        let mut frame_zcr: Vec<f32> = Vec::new();

        let mut start = 0;
        while start < samples.len() {
            let end = (start + frame_len).min(samples.len());
            let frame = &samples[start..end];

            let energy: f32 = frame.iter().map(|s| s * s).sum();
            let rms = (energy / frame.len() as f32).sqrt();

            let crossings = frame
                .windows(2)
                .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
                .count();
            let zcr = crossings as f32 / frame.len() as f32;

            frame_rms.push(rms);
            frame_zcr.push(zcr);

            start += hop;
        }

        let total = frame_rms.len();
        let voiced: Vec<usize> = (0..total)
            .filter(|&i| frame_rms[i] >= VOICED_RMS_THRESHOLD)
            .collect();

        if voiced.is_empty() {
            // Silence-only input: valid, and clinically meaningful on its own
            // (absence of response). All energy features are zero.
            return Self {
                mean_voiced_rms: 0.0,
                rms_std: 0.0,
                mean_zcr: 0.0,
                pause_ratio: 1.0,
            };
        }

        let n = voiced.len() as f32;
        let mean_voiced_rms = voiced.iter().map(|&i| frame_rms[i]).sum::<f32>() / n;
        let mean_sq = voiced.iter().map(|&i| frame_rms[i] * frame_rms[i]).sum::<f32>() / n;
        let rms_std = (mean_sq - mean_voiced_rms * mean_voiced_rms).max(0.0).sqrt();
        let mean_zcr = voiced.iter().map(|&i| frame_zcr[i]).sum::<f32>() / n;
        let pause_ratio = 1.0 - n / total as f32;

        Self {
            mean_voiced_rms,
            rms_std,
            mean_zcr,
            pause_ratio,
        }
    }
}

#[inline]
fn clamp01(v: f32) -> f32 {
    v.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const RATE: u32 = 16_000;

    fn engine() -> AcousticRuleEngine {
        AcousticRuleEngine::new(RATE)
    }

    fn waveform(samples: Vec<f32>) -> Waveform {
        Waveform::new(samples, RATE).unwrap()
    }

    /// Deterministic pseudo-noise (LCG), so tests never depend on a RNG.
    fn noise(len: usize, amplitude: impl Fn(usize) -> f32) -> Vec<f32> {
        let mut state: u32 = 0x2545_f491;
        (0..len)
            .map(|i| {
                state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
                let unit = (state >> 8) as f32 / (1u32 << 24) as f32; // [0, 1)
                (unit * 2.0 - 1.0) * amplitude(i)
            })
            .collect()
    }

    #[test]
    fn test_silence_yields_low_arousal_distribution() {
        let scores = engine().infer(&waveform(vec![0.0; RATE as usize])).unwrap();
        scores.validate().unwrap();
        assert_eq!(scores.dominant().unwrap().0, EmotionCategory::Sadness);
        assert_eq!(scores.get(EmotionCategory::Anger), 0.0);
    }

    #[test]
    fn test_steady_tone_reads_as_positive_affect() {
        let samples: Vec<f32> = (0..RATE as usize)
            .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / RATE as f32).sin() * 0.5)
            .collect();
        let scores = engine().infer(&waveform(samples)).unwrap();
        scores.validate().unwrap();
        assert_eq!(scores.dominant().unwrap().0, EmotionCategory::Happiness);
    }

    #[test]
    fn test_loud_bursty_noise_reads_as_agitation() {
        // Alternate loud and soft 100 ms segments; both stay above the voiced
        // threshold, so the energy swings register as agitation.
        let seg = RATE as usize / 10;
        let samples = noise(RATE as usize, |i| {
            if (i / seg) % 2 == 0 {
                0.8
            } else {
                0.1
            }
        });
        let scores = engine().infer(&waveform(samples)).unwrap();
        scores.validate().unwrap();
        assert_eq!(scores.dominant().unwrap().0, EmotionCategory::Anger);
    }

    #[test]
    fn test_inference_is_deterministic() {
        let samples = noise(RATE as usize, |_| 0.5);
        let w = waveform(samples);
        let a = engine().infer(&w).unwrap();
        let b = engine().infer(&w).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_distribution_covers_full_label_set() {
        let scores = engine().infer(&waveform(vec![0.0; 1_000])).unwrap();
        for &category in EmotionCategory::all() {
            // Complete distribution: every label present, even at zero.
            assert!(scores.iter().any(|(c, _)| c == category));
        }
        assert_eq!(scores.len(), EmotionCategory::all().len());
    }
}
