// Logging macros
//
// Free-text arguments must be passed through a `PiiRedactor` first; structured
// fields carrying only ids/durations can be logged as-is.
#[macro_export]
macro_rules! redacted_info {
    ($redactor:expr, $msg:expr) => {
        tracing::info!("{}", $redactor.redact($msg))
    };
}

#[macro_export]
macro_rules! redacted_warn {
    ($redactor:expr, $msg:expr) => {
        tracing::warn!("{}", $redactor.redact($msg))
    };
}

#[cfg(test)]
mod tests {
    use crate::{PiiRedactor, RedactionConfig};

    #[test]
    fn test_macros_expand_with_redactor() {
        let redactor = PiiRedactor::new(RedactionConfig::default());
        crate::redacted_info!(redactor, "processed /uploads/jane_doe.wav");
        crate::redacted_warn!(redactor, "retrying MRN-123456");
    }
}
