use base64::{engine::general_purpose, Engine as _};
use lazy_static::lazy_static;
use regex::Regex;
use sha2::{Digest, Sha256};

lazy_static! {
    static ref EMAIL_REGEX: Regex =
        Regex::new(r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Z|a-z]{2,}\b").unwrap();
    static ref PHONE_REGEX: Regex =
        Regex::new(r"\b(?:\+1[-.\s]?)?\(?([0-9]{3})\)?[-.\s]?([0-9]{3})[-.\s]?([0-9]{4})\b")
            .unwrap();
    static ref MRN_REGEX: Regex = Regex::new(r"\bMRN[-: ]?\d{4,}\b").unwrap();
    static ref RECORDING_PATH_REGEX: Regex = Regex::new(
        r#"[A-Za-z0-9_./\\:-]+\.(?:wav|mp3|flac|ogg|m4a|mp4|aac)\b"#
    )
    .unwrap();
}

/// PHI redaction configuration
#[derive(Debug, Clone)]
pub struct RedactionConfig {
    pub redact_emails: bool,
    pub redact_phones: bool,
    pub redact_mrns: bool,
    pub redact_recording_paths: bool,
    pub hash_for_correlation: bool,
    pub custom_patterns: Vec<(Regex, String)>,
}

impl Default for RedactionConfig {
    fn default() -> Self {
        Self {
            redact_emails: true,
            redact_phones: true,
            redact_mrns: true,
            redact_recording_paths: true,
            hash_for_correlation: true,
            custom_patterns: Vec::new(),
        }
    }
}

/// PHI redactor for free-text log fields
pub struct PiiRedactor {
    config: RedactionConfig,
}

impl PiiRedactor {
    pub fn new(config: RedactionConfig) -> Self {
        Self { config }
    }

    pub fn redact(&self, text: &str) -> String {
        let mut result = text.to_string();

        // Paths first: a filename may itself contain a phone number or MRN,
        // and replacing the whole path keeps the hash stable per recording.
        if self.config.redact_recording_paths {
            result = self.replace_all(&RECORDING_PATH_REGEX, &result, "AUDIO");
        }

        if self.config.redact_mrns {
            result = self.replace_all(&MRN_REGEX, &result, "MRN");
        }

        if self.config.redact_emails {
            result = self.replace_all(&EMAIL_REGEX, &result, "EMAIL");
        }

        if self.config.redact_phones {
            result = self.replace_all(&PHONE_REGEX, &result, "PHONE");
        }

        for (pattern, replacement) in &self.config.custom_patterns {
            result = pattern.replace_all(&result, replacement.as_str()).to_string();
        }

        result
    }

    fn replace_all(&self, pattern: &Regex, text: &str, tag: &str) -> String {
        pattern
            .replace_all(text, |caps: &regex::Captures| {
                if self.config.hash_for_correlation {
                    format!("{}[{}]", tag, hash_value(&caps[0]))
                } else {
                    format!("{}[REDACTED]", tag)
                }
            })
            .to_string()
    }
}

fn hash_value(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let result = hasher.finalize();
    // First 8 bytes are enough for log correlation
    general_purpose::STANDARD.encode(&result[..8])
}
