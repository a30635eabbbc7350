use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::emotion::{DerivedAcousticSignals, EmotionCategory};

/// Clinical review priority. Orders human review; not a diagnosis.
///
/// Variants are declared in escalation order so `Ord` can be used to take
/// the more urgent of two priorities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Routine,
    ElevatedReview,
    Urgent,
}

impl Priority {
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Priority::Routine => "routine",
            Priority::ElevatedReview => "elevated_review",
            Priority::Urgent => "urgent",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Priority {
    type Err = std::convert::Infallible;

    /// Unrecognized labels parse as `ElevatedReview`: a consumer reading a
    /// priority written by a newer producer must not mistake an unknown
    /// urgency for `Routine`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_lowercase().as_str() {
            "routine" => Priority::Routine,
            "urgent" => Priority::Urgent,
            "elevated_review" | "elevated-review" => Priority::ElevatedReview,
            _ => Priority::ElevatedReview,
        })
    }
}

/// Which override rule changed or flagged the base label-derived priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverrideRule {
    /// High arousal escalates regardless of the dominant label's polarity;
    /// agitated speech scored as positive excitement must not file as
    /// routine.
    HighArousalOverride,
    /// Low arousal with negative/neutral valence defers the
    /// calm-vs-depressive distinction to a human reviewer.
    LowArousalAmbiguity,
}

impl OverrideRule {
    #[inline]
    pub const fn as_str(&self) -> &'static str {
        match self {
            OverrideRule::HighArousalOverride => "high_arousal_override",
            OverrideRule::LowArousalAmbiguity => "low_arousal_ambiguity",
        }
    }
}

impl fmt::Display for OverrideRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Terminal artifact of one triage run, consumed by the reviewing system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageVerdict {
    pub id: Uuid,
    pub priority: Priority,
    pub dominant_emotion: EmotionCategory,
    /// Raw score of the dominant category, clamped to `[0, 1]`.
    pub confidence: f32,
    pub override_applied: Option<OverrideRule>,
    /// Human-readable account of the rule(s) that produced the priority.
    pub rationale: String,
    pub signals: DerivedAcousticSignals,
    pub created_at: DateTime<Utc>,
    pub metadata: VerdictMetadata,
}

/// Metadata associated with a verdict
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerdictMetadata {
    pub backend: String,
    pub model: Option<String>,
    pub input_duration_seconds: f64,
}

impl TriageVerdict {
    pub(crate) fn new(
        priority: Priority,
        dominant_emotion: EmotionCategory,
        confidence: f32,
        override_applied: Option<OverrideRule>,
        rationale: String,
        signals: DerivedAcousticSignals,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            priority,
            dominant_emotion,
            confidence,
            override_applied,
            rationale,
            signals,
            created_at: Utc::now(),
            metadata: VerdictMetadata::default(),
        }
    }

    /// Attaches run context before the verdict leaves the pipeline.
    pub(crate) fn with_metadata(mut self, metadata: VerdictMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}
