//! Emotion categories, score distributions, and derived acoustic signals.
//!
//! The category set is IEMOCAP-shaped (the label set of the wav2vec2 speech
//! emotion models this service was built around: `ang`/`hap`/`neu`/`sad`),
//! extended with `Fear` and `Calm`, which several backends report and the
//! triage rules distinguish.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{TriageError, TriageResult};

/// Tolerance when checking that a proper distribution sums to 1.0.
pub const SUM_TOLERANCE: f32 = 0.01;

// Bucket boundaries for the derived signals. Documented here rather than
// configurable: the override rules are calibrated against these.
const AROUSAL_LOW_BELOW: f32 = 0.30;
const AROUSAL_HIGH_FROM: f32 = 0.60;
const VALENCE_NEGATIVE_BELOW: f32 = -0.15;
const VALENCE_POSITIVE_ABOVE: f32 = 0.15;

/// Emotion categories scored by inference backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmotionCategory {
    /// Angry, agitated, hostile
    Anger,
    /// Fearful, panicked, anxious
    Fear,
    /// Sad, low mood, flat affect
    Sadness,
    /// Happy, excited, positive
    Happiness,
    /// Calm, settled, relaxed
    Calm,
    /// Neutral baseline
    Neutral,
}

/// Deterministic tie-break ordering for equal-scoring categories: the more
/// clinically severe category wins.
pub const TIE_BREAK_ORDER: [EmotionCategory; 6] = [
    EmotionCategory::Anger,
    EmotionCategory::Sadness,
    EmotionCategory::Fear,
    EmotionCategory::Happiness,
    EmotionCategory::Calm,
    EmotionCategory::Neutral,
];

impl EmotionCategory {
    /// All categories this service understands.
    #[inline]
    pub const fn all() -> &'static [EmotionCategory] {
        &[
            EmotionCategory::Anger,
            EmotionCategory::Fear,
            EmotionCategory::Sadness,
            EmotionCategory::Happiness,
            EmotionCategory::Calm,
            EmotionCategory::Neutral,
        ]
    }

    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            EmotionCategory::Anger => "anger",
            EmotionCategory::Fear => "fear",
            EmotionCategory::Sadness => "sadness",
            EmotionCategory::Happiness => "happiness",
            EmotionCategory::Calm => "calm",
            EmotionCategory::Neutral => "neutral",
        }
    }

    /// Parses a backend label (case-insensitive), including the IEMOCAP short
    /// codes emitted by wav2vec2 emotion models.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_lowercase().as_str() {
            "ang" | "anger" | "angry" => Some(EmotionCategory::Anger),
            "fea" | "fear" | "fearful" | "anxious" => Some(EmotionCategory::Fear),
            "sad" | "sadness" => Some(EmotionCategory::Sadness),
            "hap" | "happy" | "happiness" | "exc" | "excited" => Some(EmotionCategory::Happiness),
            "cal" | "calm" => Some(EmotionCategory::Calm),
            "neu" | "neutral" => Some(EmotionCategory::Neutral),
            _ => None,
        }
    }

    /// Clinical interpretation shown to reviewers alongside the raw label.
    pub const fn clinical_label(&self) -> &'static str {
        match self {
            EmotionCategory::Anger => "High distress (agitation)",
            EmotionCategory::Fear => "High distress (fear/panic)",
            EmotionCategory::Sadness => "Depressive symptoms / low mood",
            EmotionCategory::Happiness => "Stable / positive affect",
            EmotionCategory::Calm => "Settled / calm affect",
            EmotionCategory::Neutral => "Neutral / baseline",
        }
    }
}

impl fmt::Display for EmotionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Categorical arousal level derived from a score distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArousalLevel {
    Low,
    Medium,
    High,
}

/// Categorical valence level derived from a score distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValenceLevel {
    Negative,
    Neutral,
    Positive,
}

/// A complete, immutable score distribution over emotion categories.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionScores {
    scores: BTreeMap<EmotionCategory, f32>,
}

impl EmotionScores {
    /// Wraps raw backend scores without validation; callers that need a
    /// proper distribution run [`EmotionScores::validate`].
    pub fn new(scores: BTreeMap<EmotionCategory, f32>) -> Self {
        Self { scores }
    }

    pub fn from_pairs(pairs: &[(EmotionCategory, f32)]) -> Self {
        Self {
            scores: pairs.iter().copied().collect(),
        }
    }

    /// Normalizes non-negative weights into a proper distribution.
    ///
    /// Used by rule-based backends that produce unnormalized evidence
    /// weights rather than classifier probabilities.
    pub fn from_weights(weights: BTreeMap<EmotionCategory, f32>) -> TriageResult<Self> {
        let total: f32 = weights.values().sum();
        if !total.is_finite() || total <= 0.0 {
            return Err(TriageError::Validation(format!(
                "weights must sum to a positive finite value, got {total}"
            )));
        }
        if weights.values().any(|w| *w < 0.0) {
            return Err(TriageError::Validation(
                "weights must be non-negative".to_string(),
            ));
        }
        let scores = weights.into_iter().map(|(c, w)| (c, w / total)).collect();
        Ok(Self { scores })
    }

    pub fn get(&self, category: EmotionCategory) -> f32 {
        self.scores.get(&category).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EmotionCategory, f32)> + '_ {
        self.scores.iter().map(|(c, s)| (*c, *s))
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// Checks the proper-distribution invariants: non-empty, finite,
    /// non-negative, summing to 1.0 within [`SUM_TOLERANCE`].
    ///
    /// A malformed distribution is never repaired here; it indicates a broken
    /// or incompatible inference adapter.
    pub fn validate(&self) -> TriageResult<()> {
        if self.scores.is_empty() {
            return Err(TriageError::Validation(
                "empty score distribution".to_string(),
            ));
        }
        for (category, score) in &self.scores {
            if !score.is_finite() {
                return Err(TriageError::Validation(format!(
                    "score for {category} is not finite"
                )));
            }
            if *score < 0.0 {
                return Err(TriageError::Validation(format!(
                    "score for {category} is negative ({score})"
                )));
            }
        }
        let sum: f32 = self.scores.values().sum();
        if (sum - 1.0).abs() > SUM_TOLERANCE {
            return Err(TriageError::Validation(format!(
                "scores sum to {sum:.4}, expected 1.0 +/- {SUM_TOLERANCE}"
            )));
        }
        Ok(())
    }

    /// Category with the maximum score; ties resolve by [`TIE_BREAK_ORDER`]
    /// so repeated runs always agree. Returns `None` for an empty mapping.
    pub fn dominant(&self) -> Option<(EmotionCategory, f32)> {
        let mut best: Option<(EmotionCategory, f32)> = None;
        for category in TIE_BREAK_ORDER {
            let Some(score) = self.scores.get(&category).copied() else {
                continue;
            };
            match best {
                // Strictly greater: earlier entries in the ordering win ties.
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((category, score)),
            }
        }
        best
    }
}

/// Fixed arousal/valence coordinates for one emotion category.
///
/// Arousal lives in `[0, 1]` (activation), valence in `[-1, 1]` (polarity).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AffectCoordinates {
    pub arousal: f32,
    pub valence: f32,
}

/// Ephemeral signals derived from one score distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedAcousticSignals {
    /// Continuous arousal expectation in `[0, 1]`.
    pub arousal: f32,
    /// Continuous valence expectation in `[-1, 1]`.
    pub valence: f32,
    pub arousal_level: ArousalLevel,
    pub valence_level: ValenceLevel,
}

impl DerivedAcousticSignals {
    /// Buckets continuous expectations into the categorical levels the
    /// override rules are written against.
    pub fn from_continuous(arousal: f32, valence: f32) -> Self {
        let arousal_level = if arousal < AROUSAL_LOW_BELOW {
            ArousalLevel::Low
        } else if arousal >= AROUSAL_HIGH_FROM {
            ArousalLevel::High
        } else {
            ArousalLevel::Medium
        };
        let valence_level = if valence < VALENCE_NEGATIVE_BELOW {
            ValenceLevel::Negative
        } else if valence > VALENCE_POSITIVE_ABOVE {
            ValenceLevel::Positive
        } else {
            ValenceLevel::Neutral
        };
        Self {
            arousal,
            valence,
            arousal_level,
            valence_level,
        }
    }
}

/// Per-category arousal/valence lookup table.
///
/// Signals are derived as the score-weighted expectation over the whole
/// distribution, not a dominant-label lookup: a distribution that splits
/// between a positive label and an agitated one still registers the
/// agitation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArousalValenceTable {
    coordinates: BTreeMap<EmotionCategory, AffectCoordinates>,
}

impl Default for ArousalValenceTable {
    fn default() -> Self {
        // Circumplex placement tuned so that a fully-confident happy or
        // neutral message stays out of the High/Low arousal bands, while
        // mixed agitated distributions cross into them.
        let coordinates = [
            (EmotionCategory::Anger, AffectCoordinates { arousal: 0.90, valence: -0.80 }),
            (EmotionCategory::Fear, AffectCoordinates { arousal: 0.85, valence: -0.70 }),
            (EmotionCategory::Sadness, AffectCoordinates { arousal: 0.25, valence: -0.70 }),
            (EmotionCategory::Happiness, AffectCoordinates { arousal: 0.55, valence: 0.80 }),
            (EmotionCategory::Calm, AffectCoordinates { arousal: 0.15, valence: 0.40 }),
            (EmotionCategory::Neutral, AffectCoordinates { arousal: 0.30, valence: 0.00 }),
        ]
        .into_iter()
        .collect();
        Self { coordinates }
    }
}

impl ArousalValenceTable {
    pub fn new(coordinates: BTreeMap<EmotionCategory, AffectCoordinates>) -> Self {
        Self { coordinates }
    }

    pub fn coordinates(&self, category: EmotionCategory) -> Option<AffectCoordinates> {
        self.coordinates.get(&category).copied()
    }

    /// Derives arousal/valence signals from a validated distribution.
    ///
    /// Deterministic: the same distribution always yields the same signals.
    /// Categories missing from the table contribute nothing.
    pub fn derive(&self, scores: &EmotionScores) -> DerivedAcousticSignals {
        let mut arousal = 0.0f32;
        let mut valence = 0.0f32;
        let mut weight = 0.0f32;
        for (category, score) in scores.iter() {
            if let Some(coords) = self.coordinates.get(&category) {
                arousal += coords.arousal * score;
                valence += coords.valence * score;
                weight += score;
            }
        }
        if weight > 0.0 {
            arousal /= weight;
            valence /= weight;
        }
        DerivedAcousticSignals::from_continuous(arousal, valence)
    }
}
