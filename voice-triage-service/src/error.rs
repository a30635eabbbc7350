use thiserror::Error;

/// Error taxonomy for the triage pipeline.
///
/// Every failure surfaces unchanged to the caller; a failed classification is
/// never converted into a default verdict, because a silent low-priority
/// verdict would be indistinguishable from a genuine `Routine` one.
#[derive(Error, Debug)]
pub enum TriageError {
    /// Unusable input audio: corrupt file, unsupported codec, zero-length
    /// stream, or a recording rejected by the duration policy.
    #[error("Decode error: {0}")]
    Decode(String),

    /// Contract violation between normalizer and engine (non-canonical
    /// waveform reached an inference backend). Indicates a programming or
    /// configuration bug, never expected in correct operation.
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// Backend failure during inference. Transient; the caller may retry the
    /// whole pipeline.
    #[error("Inference error from backend '{backend}' ({input_seconds:.2}s input): {message}")]
    Inference {
        backend: String,
        input_seconds: f64,
        message: String,
    },

    /// Malformed score distribution from an engine (scores not summing to ~1,
    /// negative scores, empty mapping). Indicates a broken or incompatible
    /// inference adapter.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration error: unknown engine, missing model, mismatched label
    /// set.
    #[error("Configuration error: {0}")]
    Config(String),
}

impl TriageError {
    /// Whether retrying the whole pipeline run can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, TriageError::Inference { .. })
    }
}

/// Result type alias for triage operations
pub type TriageResult<T> = Result<T, TriageError>;
