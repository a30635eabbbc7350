//! Audio normalization: arbitrary decodable input to canonical waveforms.
//!
//! Every inference backend consumes the same canonical form: mono,
//! `target_sample_rate` Hz, duration bounded by the configured policy.
//! Normalization owns decoding, downmixing, and resampling; engines never
//! resample on their own.

use std::io::Cursor;
use std::path::Path;

use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use crate::config::{DurationPolicy, TriageConfig};
use crate::error::{TriageError, TriageResult};

/// Canonical mono waveform produced by [`AudioNormalizer`].
///
/// Owned by the pipeline invocation that created it and discarded after
/// inference; samples are normalized to `[-1.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl Waveform {
    /// Builds a waveform, enforcing the non-empty / positive-rate invariant.
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> TriageResult<Self> {
        if sample_rate == 0 {
            return Err(TriageError::Precondition(
                "waveform sample rate must be positive".to_string(),
            ));
        }
        if samples.is_empty() {
            return Err(TriageError::Precondition(
                "waveform must contain at least one sample".to_string(),
            ));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Always 1 after normalization.
    pub const fn channel_count(&self) -> u16 {
        1
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Converts arbitrary source audio into the canonical waveform.
///
/// Deterministic: the same input bytes and configuration always produce the
/// same waveform (sinc resampling with fixed parameters, no dithering).
pub struct AudioNormalizer {
    target_sample_rate: u32,
    max_duration_seconds: f64,
    duration_policy: DurationPolicy,
}

impl AudioNormalizer {
    pub fn new(config: &TriageConfig) -> Self {
        Self {
            target_sample_rate: config.target_sample_rate,
            max_duration_seconds: config.max_duration_seconds,
            duration_policy: config.duration_policy,
        }
    }

    /// Normalize a recording stored on disk.
    pub fn normalize_path<P: AsRef<Path>>(&self, path: P) -> TriageResult<Waveform> {
        let path = path.as_ref();
        let metadata = std::fs::metadata(path)
            .map_err(|e| TriageError::Decode(format!("could not open {}: {e}", path.display())))?;
        if metadata.len() == 0 {
            return Err(TriageError::Decode(format!(
                "audio file is empty: {}",
                path.display()
            )));
        }

        let file = std::fs::File::open(path)
            .map_err(|e| TriageError::Decode(format!("could not open {}: {e}", path.display())))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        self.normalize_stream(mss, hint)
    }

    /// Normalize raw audio bytes of any decodable container format.
    ///
    /// `extension_hint` helps the probe with headerless containers and may be
    /// omitted.
    pub fn normalize_bytes(&self, bytes: &[u8], extension_hint: Option<&str>) -> TriageResult<Waveform> {
        if bytes.is_empty() {
            return Err(TriageError::Decode("empty audio input".to_string()));
        }

        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = extension_hint {
            hint.with_extension(ext);
        }

        self.normalize_stream(mss, hint)
    }

    fn normalize_stream(&self, mss: MediaSourceStream, hint: Hint) -> TriageResult<Waveform> {
        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| TriageError::Decode(format!("unsupported or corrupt audio: {e}")))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| TriageError::Decode("no audio track found".to_string()))?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let native_sample_rate = codec_params
            .sample_rate
            .ok_or_else(|| TriageError::Decode("sample rate not specified by codec".to_string()))?;

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| TriageError::Decode(format!("failed to create decoder: {e}")))?;

        debug!(
            native_sample_rate,
            target_sample_rate = self.target_sample_rate,
            "decoding audio"
        );

        // Duration bound applied at the native rate, before resampling.
        let native_cap = (self.max_duration_seconds * native_sample_rate as f64).ceil() as usize;

        let mut samples: Vec<f32> = Vec::new();
        let mut truncated = false;

        'decode: loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(symphonia::core::errors::Error::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => {
                    return Err(TriageError::Decode(format!("failed to read packet: {e}")))
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = decoder
                .decode(&packet)
                .map_err(|e| TriageError::Decode(format!("failed to decode packet: {e}")))?;

            append_downmixed(&decoded, &mut samples);

            if samples.len() > native_cap {
                match self.duration_policy {
                    DurationPolicy::Reject => {
                        return Err(TriageError::Decode(format!(
                            "recording exceeds the configured maximum of {:.1}s",
                            self.max_duration_seconds
                        )));
                    }
                    DurationPolicy::Truncate => {
                        samples.truncate(native_cap);
                        truncated = true;
                        break 'decode;
                    }
                }
            }
        }

        if truncated {
            warn!(
                max_duration_seconds = self.max_duration_seconds,
                "recording longer than the analysis window; leading segment kept"
            );
        }

        if samples.is_empty() {
            return Err(TriageError::Decode(
                "no audio samples decoded".to_string(),
            ));
        }

        let samples = if native_sample_rate != self.target_sample_rate {
            self.resample_mono(samples, native_sample_rate)?
        } else {
            samples
        };

        if samples.is_empty() {
            return Err(TriageError::Decode(
                "audio too short to resample".to_string(),
            ));
        }

        Waveform::new(samples, self.target_sample_rate)
    }

    /// Resample mono PCM to the target rate with fixed sinc parameters
    /// (256-tap filter, BlackmanHarris2 window, 0.95 cutoff), single pass.
    fn resample_mono(&self, samples: Vec<f32>, source_rate: u32) -> TriageResult<Vec<f32>> {
        let num_frames = samples.len();

        let params = SincInterpolationParameters {
            sinc_len: 256,
            f_cutoff: 0.95,
            interpolation: SincInterpolationType::Linear,
            oversampling_factor: 256,
            window: WindowFunction::BlackmanHarris2,
        };

        let resample_ratio = self.target_sample_rate as f64 / source_rate as f64;

        let mut resampler = SincFixedIn::<f32>::new(
            resample_ratio,
            2.0,
            params,
            num_frames, // chunk size = input length, single-pass
            1,          // mono
        )
        .map_err(|e| TriageError::Decode(format!("failed to create resampler: {e}")))?;

        let mut output = resampler
            .process(&[samples], None)
            .map_err(|e| TriageError::Decode(format!("resampling failed: {e}")))?;

        debug!(
            source_rate,
            target_rate = self.target_sample_rate,
            output_frames = output.first().map(Vec::len).unwrap_or(0),
            "resampled audio"
        );

        Ok(output.pop().unwrap_or_default())
    }
}

/// Downmix one decoded buffer to mono by averaging all channels.
fn append_downmixed(decoded: &AudioBufferRef<'_>, out: &mut Vec<f32>) {
    match decoded {
        AudioBufferRef::F32(buf) => downmix(buf, |s| s, out),
        AudioBufferRef::F64(buf) => downmix(buf, |s| s as f32, out),
        AudioBufferRef::S8(buf) => downmix(buf, |s| s as f32 / 128.0, out),
        AudioBufferRef::S16(buf) => downmix(buf, |s| s as f32 / 32_768.0, out),
        AudioBufferRef::S24(buf) => downmix(buf, |s| s.inner() as f32 / 8_388_608.0, out),
        AudioBufferRef::S32(buf) => downmix(buf, |s| s as f32 / 2_147_483_648.0, out),
        AudioBufferRef::U8(buf) => downmix(buf, |s| (s as f32 - 128.0) / 128.0, out),
        AudioBufferRef::U16(buf) => downmix(buf, |s| (s as f32 - 32_768.0) / 32_768.0, out),
        AudioBufferRef::U24(buf) => {
            downmix(buf, |s| (s.inner() as f32 - 8_388_608.0) / 8_388_608.0, out)
        }
        AudioBufferRef::U32(buf) => {
            downmix(buf, |s| (s as f32 - 2_147_483_648.0) / 2_147_483_648.0, out)
        }
    }
}

fn downmix<S>(
    buf: &symphonia::core::audio::AudioBuffer<S>,
    convert: impl Fn(S) -> f32,
    out: &mut Vec<f32>,
) where
    S: symphonia::core::sample::Sample + Copy,
{
    let channels = buf.spec().channels.count();
    let frames = buf.frames();
    if channels == 0 {
        return;
    }
    let scale = 1.0 / channels as f32;
    out.reserve(frames);
    for i in 0..frames {
        let mut acc = 0.0f32;
        for ch in 0..channels {
            acc += convert(buf.chan(ch)[i]);
        }
        out.push(acc * scale);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TriageConfig;

    fn wav_bytes(
        sample_rate: u32,
        channels: u16,
        frames: usize,
        sample: impl Fn(usize, usize) -> f32,
    ) -> Vec<u8> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
            for i in 0..frames {
                for ch in 0..channels as usize {
                    let v = (sample(i, ch).clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
                    writer.write_sample(v).unwrap();
                }
            }
            writer.finalize().unwrap();
        }
        cursor.into_inner()
    }

    fn normalizer(max_duration_seconds: f64, policy: DurationPolicy) -> AudioNormalizer {
        let config = TriageConfig {
            max_duration_seconds,
            duration_policy: policy,
            ..Default::default()
        };
        AudioNormalizer::new(&config)
    }

    #[test]
    fn test_output_is_canonical() {
        let bytes = wav_bytes(44_100, 1, 22_050, |i, _| {
            (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44_100.0).sin() * 0.5
        });
        let waveform = normalizer(30.0, DurationPolicy::Truncate)
            .normalize_bytes(&bytes, Some("wav"))
            .unwrap();

        assert_eq!(waveform.sample_rate(), 16_000);
        assert_eq!(waveform.channel_count(), 1);
        assert!((waveform.duration_seconds() - 0.5).abs() < 0.05);
        // Sinc interpolation may overshoot slightly, never more than ~1%.
        for &s in waveform.samples() {
            assert!(s.abs() <= 1.01);
        }
    }

    #[test]
    fn test_stereo_downmix_averages_channels() {
        // Opposite-phase channels cancel to silence under averaging.
        let bytes = wav_bytes(16_000, 2, 1_600, |_, ch| if ch == 0 { 0.4 } else { -0.4 });
        let waveform = normalizer(30.0, DurationPolicy::Truncate)
            .normalize_bytes(&bytes, Some("wav"))
            .unwrap();

        assert_eq!(waveform.channel_count(), 1);
        for &s in waveform.samples() {
            assert!(s.abs() < 1e-3, "expected cancellation, got {s}");
        }
    }

    #[test]
    fn test_silence_normalizes_successfully() {
        let bytes = wav_bytes(16_000, 1, 8_000, |_, _| 0.0);
        let waveform = normalizer(30.0, DurationPolicy::Truncate)
            .normalize_bytes(&bytes, Some("wav"))
            .unwrap();

        assert!((waveform.duration_seconds() - 0.5).abs() < 1e-3);
        assert!(waveform.samples().iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_empty_input_is_decode_error() {
        let err = normalizer(30.0, DurationPolicy::Truncate)
            .normalize_bytes(&[], None)
            .unwrap_err();
        assert!(matches!(err, TriageError::Decode(_)));
    }

    #[test]
    fn test_garbage_input_is_decode_error() {
        let bytes: Vec<u8> = (0u16..256).map(|i| (i * 7 % 251) as u8).collect();
        let err = normalizer(30.0, DurationPolicy::Truncate)
            .normalize_bytes(&bytes, None)
            .unwrap_err();
        assert!(matches!(err, TriageError::Decode(_)));
    }

    #[test]
    fn test_wav_without_samples_is_decode_error() {
        let bytes = wav_bytes(16_000, 1, 0, |_, _| 0.0);
        let err = normalizer(30.0, DurationPolicy::Truncate)
            .normalize_bytes(&bytes, Some("wav"))
            .unwrap_err();
        assert!(matches!(err, TriageError::Decode(_)));
    }

    #[test]
    fn test_truncate_policy_bounds_duration() {
        let bytes = wav_bytes(16_000, 1, 48_000, |_, _| 0.1); // 3s
        let waveform = normalizer(1.0, DurationPolicy::Truncate)
            .normalize_bytes(&bytes, Some("wav"))
            .unwrap();
        assert!(waveform.duration_seconds() <= 1.05);
        assert!(waveform.duration_seconds() >= 0.95);
    }

    #[test]
    fn test_reject_policy_fails_long_recording() {
        let bytes = wav_bytes(16_000, 1, 48_000, |_, _| 0.1); // 3s
        let err = normalizer(1.0, DurationPolicy::Reject)
            .normalize_bytes(&bytes, Some("wav"))
            .unwrap_err();
        assert!(matches!(err, TriageError::Decode(_)));
    }

    #[test]
    fn test_normalize_path_rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.wav");
        std::fs::write(&path, []).unwrap();

        let err = normalizer(30.0, DurationPolicy::Truncate)
            .normalize_path(&path)
            .unwrap_err();
        assert!(matches!(err, TriageError::Decode(_)));
    }

    #[test]
    fn test_normalization_is_deterministic() {
        let bytes = wav_bytes(44_100, 2, 4_410, |i, ch| {
            let t = i as f32 / 44_100.0;
            if ch == 0 {
                (2.0 * std::f32::consts::PI * 220.0 * t).sin() * 0.3
            } else {
                (2.0 * std::f32::consts::PI * 330.0 * t).sin() * 0.3
            }
        });
        let n = normalizer(30.0, DurationPolicy::Truncate);
        let a = n.normalize_bytes(&bytes, Some("wav")).unwrap();
        let b = n.normalize_bytes(&bytes, Some("wav")).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_waveform_invariants() {
        assert!(Waveform::new(Vec::new(), 16_000).is_err());
        assert!(Waveform::new(vec![0.0], 0).is_err());
        let w = Waveform::new(vec![0.0; 16_000], 16_000).unwrap();
        assert!((w.duration_seconds() - 1.0).abs() < 1e-9);
    }
}
