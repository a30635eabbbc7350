//! HTTP adapter for self-hosted speech-emotion inference servers.
//!
//! Posts the canonical waveform as 16-bit PCM WAV and expects a JSON score
//! map over the server's label set, e.g.
//! `{"scores": {"ang": 0.62, "neu": 0.21, "sad": 0.12, "hap": 0.05}}`.

use std::collections::HashMap;
use std::io::Cursor;
use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use crate::audio::Waveform;
use crate::emotion::{EmotionCategory, EmotionScores};
use crate::engines::{ensure_canonical, EmotionInferenceEngine};
use crate::error::{TriageError, TriageResult};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct ScoreResponse {
    scores: HashMap<String, f32>,
}

pub struct RemoteEmotionEngine {
    client: reqwest::blocking::Client,
    api_url: String,
    api_key: Option<String>,
    model: Option<String>,
    expected_rate: u32,
}

impl RemoteEmotionEngine {
    pub fn new(
        api_url: String,
        api_key: Option<String>,
        model: Option<String>,
        expected_rate: u32,
    ) -> TriageResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| TriageError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_url,
            api_key,
            model,
            expected_rate,
        })
    }

    /// Maps a server score map onto the service's category set.
    ///
    /// Unknown labels indicate an incompatible backend and fail instead of
    /// being dropped; categories the server did not mention score 0.0 so the
    /// distribution stays complete.
    fn parse_scores(raw: HashMap<String, f32>) -> TriageResult<EmotionScores> {
        let mut scores = std::collections::BTreeMap::new();
        for (label, score) in raw {
            let category = EmotionCategory::from_label(&label).ok_or_else(|| {
                TriageError::Validation(format!("backend returned unknown label '{label}'"))
            })?;
            scores.insert(category, score);
        }
        for &category in EmotionCategory::all() {
            scores.entry(category).or_insert(0.0);
        }
        Ok(EmotionScores::new(scores))
    }

    fn encode_wav(waveform: &Waveform) -> TriageResult<Vec<u8>> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: waveform.sample_rate(),
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).map_err(|e| {
                TriageError::Decode(format!("failed to encode request audio: {e}"))
            })?;
            for &sample in waveform.samples() {
                let value = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
                writer.write_sample(value).map_err(|e| {
                    TriageError::Decode(format!("failed to encode request audio: {e}"))
                })?;
            }
            writer.finalize().map_err(|e| {
                TriageError::Decode(format!("failed to encode request audio: {e}"))
            })?;
        }
        Ok(cursor.into_inner())
    }

    fn inference_error(&self, waveform: &Waveform, message: String) -> TriageError {
        TriageError::Inference {
            backend: self.name().to_string(),
            input_seconds: waveform.duration_seconds(),
            message,
        }
    }
}

impl EmotionInferenceEngine for RemoteEmotionEngine {
    fn name(&self) -> &str {
        "remote-emotion"
    }

    fn labels(&self) -> &[EmotionCategory] {
        EmotionCategory::all()
    }

    fn infer(&self, waveform: &Waveform) -> TriageResult<EmotionScores> {
        ensure_canonical(waveform, self.expected_rate)?;

        let body = Self::encode_wav(waveform)?;
        debug!(
            bytes = body.len(),
            api_url = %self.api_url,
            "posting audio for emotion inference"
        );

        let mut request = self
            .client
            .post(format!("{}/v1/emotion", self.api_url))
            .header(reqwest::header::CONTENT_TYPE, "audio/wav")
            .body(body);

        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        if let Some(model) = &self.model {
            request = request.query(&[("model", model.as_str())]);
        }

        let response = request
            .send()
            .map_err(|e| self.inference_error(waveform, format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().unwrap_or_default();
            return Err(self.inference_error(
                waveform,
                format!("backend returned {status}: {detail}"),
            ));
        }

        let parsed: ScoreResponse = response
            .json()
            .map_err(|e| TriageError::Validation(format!("unparseable backend response: {e}")))?;

        Self::parse_scores(parsed.scores)
    }
}
