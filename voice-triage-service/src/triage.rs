//! Arousal-aware mapping from emotion score distributions to clinical
//! review priorities.
//!
//! The base label-to-priority table is deliberately simple; the clinical
//! value is in the two override rules, which encode known failure modes of
//! naive top-label mapping and are kept as standalone functions so each
//! firing condition stays auditable.

use tracing::debug;

use crate::emotion::{
    ArousalLevel, ArousalValenceTable, DerivedAcousticSignals, EmotionCategory, EmotionScores,
    ValenceLevel,
};
use crate::error::{TriageError, TriageResult};
use crate::verdict::{OverrideRule, Priority, TriageVerdict};

/// Base label-derived priority, before any override rule runs.
pub fn base_priority(category: EmotionCategory) -> Priority {
    match category {
        EmotionCategory::Anger | EmotionCategory::Fear => Priority::Urgent,
        EmotionCategory::Sadness => Priority::ElevatedReview,
        EmotionCategory::Happiness | EmotionCategory::Calm | EmotionCategory::Neutral => {
            Priority::Routine
        }
    }
}

/// High arousal escalates regardless of the dominant label's polarity.
///
/// Agitated, pressured speech can score as positive excitement; filing it as
/// routine on the strength of that label is the failure mode this rule
/// exists to prevent, so it is mandatory, not tunable.
pub fn high_arousal_override(signals: &DerivedAcousticSignals) -> bool {
    signals.arousal_level == ArousalLevel::High
}

/// Low arousal with non-positive valence is ambiguous between calm speech
/// and genuine depressive flattening. The verdict is flagged and held at
/// elevated review instead of guessing; a human makes the distinction.
pub fn low_arousal_ambiguity(signals: &DerivedAcousticSignals) -> bool {
    signals.arousal_level == ArousalLevel::Low
        && matches!(
            signals.valence_level,
            ValenceLevel::Negative | ValenceLevel::Neutral
        )
}

/// Pure classifier from score distributions to triage verdicts.
///
/// No state persists between calls; the same distribution always yields the
/// same priority, dominant emotion, confidence, override, and rationale.
pub struct TriageClassifier {
    table: ArousalValenceTable,
}

impl TriageClassifier {
    pub fn new(table: ArousalValenceTable) -> Self {
        Self { table }
    }

    pub fn classify(&self, scores: &EmotionScores) -> TriageResult<TriageVerdict> {
        scores.validate()?;

        let (dominant, raw_score) = scores.dominant().ok_or_else(|| {
            TriageError::Validation("empty score distribution".to_string())
        })?;
        let confidence = raw_score.clamp(0.0, 1.0);

        let signals = self.table.derive(scores);
        let base = base_priority(dominant);

        let mut priority = base;
        let mut override_applied = None;

        if high_arousal_override(&signals) {
            // Escalate to at least elevated review; an urgent base mapping
            // stays urgent.
            priority = priority.max(Priority::ElevatedReview);
            override_applied = Some(OverrideRule::HighArousalOverride);
        } else if low_arousal_ambiguity(&signals) {
            priority = priority.max(Priority::ElevatedReview);
            override_applied = Some(OverrideRule::LowArousalAmbiguity);
        }

        let rationale = build_rationale(dominant, confidence, base, priority, override_applied, &signals);

        debug!(
            dominant = %dominant,
            priority = %priority,
            override_applied = override_applied.map(|r| r.as_str()),
            "classified distribution"
        );

        Ok(TriageVerdict::new(
            priority,
            dominant,
            confidence,
            override_applied,
            rationale,
            signals,
        ))
    }
}

impl Default for TriageClassifier {
    fn default() -> Self {
        Self::new(ArousalValenceTable::default())
    }
}

/// Assembles the human-readable account of every rule that fired; overrides
/// are never silently dropped from the explanation.
fn build_rationale(
    dominant: EmotionCategory,
    confidence: f32,
    base: Priority,
    priority: Priority,
    override_applied: Option<OverrideRule>,
    signals: &DerivedAcousticSignals,
) -> String {
    let mut rationale = format!(
        "dominant emotion {dominant} ({}) at {confidence:.2} confidence; base mapping {dominant} -> {base}",
        dominant.clinical_label(),
    );

    match override_applied {
        Some(OverrideRule::HighArousalOverride) => {
            rationale.push_str(&format!(
                "; high-arousal override (arousal {:.2}) held priority at {priority}",
                signals.arousal
            ));
        }
        Some(OverrideRule::LowArousalAmbiguity) => {
            rationale.push_str(&format!(
                "; low-arousal non-positive affect (arousal {:.2}, valence {:.2}) flagged for human review at {priority}",
                signals.arousal, signals.valence
            ));
        }
        None => {}
    }

    rationale
}
