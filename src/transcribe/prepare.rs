use std::io::Read;
use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Whisper's required input sample rate
pub const WHISPER_SAMPLE_RATE: u32 = 16000;

/// whisper.cpp rejects audio shorter than one second
const MIN_SAMPLES: usize = WHISPER_SAMPLE_RATE as usize;

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("failed to read WAV: {0}")]
    Wav(#[from] hound::Error),
    #[error("audio file contains no samples")]
    Empty,
}

/// Audio decoded into the format Whisper consumes
#[derive(Debug, Clone)]
pub struct PreparedAudio {
    /// Samples at 16kHz, mono, normalized to [-1.0, 1.0]
    pub samples_16khz: Vec<f32>,
    /// Duration of the source audio in seconds, before any padding
    pub duration_secs: f32,
}

/// Load an audio file and convert it to what Whisper expects.
///
/// Accepts WAV with integer (8/16/24/32-bit) or 32-bit float samples, any
/// channel count and sample rate. Channels are averaged down to mono, the
/// stream is resampled to 16kHz, and anything under one second is padded
/// with silence.
pub fn load_audio(path: &Path) -> Result<PreparedAudio, AudioError> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();

    info!(
        "Decoding {}: {} Hz, {} channel(s), {}-bit {:?}",
        path.display(),
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample,
        spec.sample_format
    );

    let interleaved = decode_samples(&mut reader)?;
    if interleaved.is_empty() {
        return Err(AudioError::Empty);
    }

    let mono = mix_to_mono(&interleaved, spec.channels);
    let mut samples_16khz = resample(&mono, spec.sample_rate, WHISPER_SAMPLE_RATE);
    let duration_secs = samples_16khz.len() as f32 / WHISPER_SAMPLE_RATE as f32;

    if samples_16khz.len() < MIN_SAMPLES {
        samples_16khz.resize(MIN_SAMPLES, 0.0);
    }

    info!(
        "Prepared {:.2}s of audio ({} samples at {}Hz)",
        duration_secs,
        samples_16khz.len(),
        WHISPER_SAMPLE_RATE
    );

    Ok(PreparedAudio {
        samples_16khz,
        duration_secs,
    })
}

/// Decode every sample as f32 in [-1.0, 1.0]
fn decode_samples<R: Read>(reader: &mut hound::WavReader<R>) -> Result<Vec<f32>, AudioError> {
    let spec = reader.spec();
    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|s| s as f32 / scale))
                .collect::<Result<Vec<_>, _>>()?
        }
    };
    Ok(samples)
}

/// Average interleaved channels down to one sample per frame
fn mix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels as usize)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Resample using linear interpolation. Identity when the rates already match.
fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate || samples.is_empty() {
        return samples.to_vec();
    }

    let ratio = from_rate as f64 / to_rate as f64;
    let out_len = ((samples.len() as f64 / ratio).round() as usize).max(1);
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos as usize;
            let frac = (pos - idx as f64) as f32;
            let a = samples[idx.min(last)];
            let b = samples[(idx + 1).min(last)];
            a + (b - a) * frac
        })
        .collect()
}
