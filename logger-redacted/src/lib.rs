//! PHI-redacting log utilities for the VoiceTriage engine
//!
//! Patient voice messages arrive as files and URLs whose names routinely embed
//! identifiers (patient names in recording filenames, MRNs in upload paths,
//! callback phone numbers in voicemail metadata). Any of those strings can end
//! up in a log line when decoding or inference fails, so free-text log fields
//! must pass through a redactor before they are emitted.
//!
//! # Detected data types
//!
//! - **Email addresses**: `user@example.com` → `EMAIL[hash]`
//! - **Phone numbers**: `(555) 123-4567` → `PHONE[hash]`
//! - **Medical record numbers**: `MRN-123456` → `MRN[hash]`
//! - **Recording paths**: `/uploads/jane_doe_2024.wav` → `AUDIO[hash]`
//! - **Custom patterns**: configurable per deployment
//!
//! Redacted values are replaced by a truncated SHA-256 hash by default so that
//! repeated failures for the same recording can still be correlated without
//! storing the identifier itself.
//!
//! # Example
//!
//! ```rust
//! use logger_redacted::{PiiRedactor, RedactionConfig};
//!
//! let redactor = PiiRedactor::new(RedactionConfig::default());
//! let line = redactor.redact("decode failed for /uploads/jane_doe_2024.wav");
//! assert!(!line.contains("jane_doe"));
//! ```

pub mod config;
pub mod macros;
pub mod redactor;

pub use config::*;
pub use redactor::*;

/// Install a global tracing subscriber honoring `LoggerConfig::log_level`.
///
/// Intended for binaries and integration tests; returns an error instead of
/// panicking when a subscriber is already installed.
pub fn init_tracing(config: &LoggerConfig) -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(&config.log_level))
        .try_init()
        .map_err(|e| e.to_string())
}
