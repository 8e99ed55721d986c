use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use whisper_rs::{FullParams, SamplingStrategy, WhisperContext, WhisperContextParameters};

use super::{load_audio, PreparedAudio};

/// Available Whisper model sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhisperModel {
    Tiny,
    Base,
    Small,
    Medium,
    Large,
}

impl WhisperModel {
    /// Short model name, as accepted by `FromStr`
    pub fn name(&self) -> &'static str {
        match self {
            WhisperModel::Tiny => "tiny",
            WhisperModel::Base => "base",
            WhisperModel::Small => "small",
            WhisperModel::Medium => "medium",
            WhisperModel::Large => "large",
        }
    }

    /// ggml checkpoint filename as published on Hugging Face
    pub fn filename(&self) -> &'static str {
        match self {
            WhisperModel::Tiny => "ggml-tiny.bin",
            WhisperModel::Base => "ggml-base.bin",
            WhisperModel::Small => "ggml-small.bin",
            WhisperModel::Medium => "ggml-medium.bin",
            WhisperModel::Large => "ggml-large-v3.bin",
        }
    }

    /// Download URL for this model
    pub fn hf_url(&self) -> String {
        format!(
            "https://huggingface.co/ggerganov/whisper.cpp/resolve/main/{}",
            self.filename()
        )
    }

    /// Approximate model size in MB
    pub fn size_mb(&self) -> u64 {
        match self {
            WhisperModel::Tiny => 75,
            WhisperModel::Base => 142,
            WhisperModel::Small => 466,
            WhisperModel::Medium => 1500,
            WhisperModel::Large => 3100,
        }
    }
}

impl std::fmt::Display for WhisperModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for WhisperModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "tiny" => Ok(WhisperModel::Tiny),
            "base" => Ok(WhisperModel::Base),
            "small" => Ok(WhisperModel::Small),
            "medium" => Ok(WhisperModel::Medium),
            "large" => Ok(WhisperModel::Large),
            _ => Err(format!(
                "Unknown model: {}. Use tiny, base, small, medium, or large",
                s
            )),
        }
    }
}

#[derive(Error, Debug)]
pub enum WhisperError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to prepare audio: {0}")]
    Audio(#[from] super::AudioError),
    #[error("Failed to download model: {0}")]
    Download(String),
    #[error("Failed to initialize Whisper: {0}")]
    Init(String),
    #[error("Transcription failed: {0}")]
    Transcription(String),
}

/// A single transcribed segment with timing
#[derive(Debug, Clone)]
pub struct Segment {
    /// Start time in seconds
    pub start_secs: f32,
    /// End time in seconds
    pub end_secs: f32,
    /// The transcribed text, trimmed
    pub text: String,
}

/// Result of transcribing one piece of audio
#[derive(Debug, Clone)]
pub struct Transcription {
    /// Language the model detected, if any
    pub language: Option<String>,
    /// Transcribed segments in order
    pub segments: Vec<Segment>,
    /// All segment texts joined with single spaces
    pub text: String,
}

/// Environment variable overriding where model files are cached
const MODEL_DIR_ENV: &str = "HARK_MODEL_DIR";

/// Get the models directory path
pub fn models_dir() -> PathBuf {
    std::env::var_os(MODEL_DIR_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("models").join("whisper"))
}

/// Get the path to a specific model file
pub fn model_path(model: WhisperModel) -> PathBuf {
    models_dir().join(model.filename())
}

/// Check if a model is already downloaded
pub fn is_model_downloaded(model: WhisperModel) -> bool {
    plausible_size(&model_path(model), model.size_mb())
}

/// A file at least half the published size counts as complete
fn plausible_size(path: &Path, expected_mb: u64) -> bool {
    match fs::metadata(path) {
        Ok(metadata) => metadata.len() >= expected_mb * 1024 * 1024 / 2,
        Err(_) => false,
    }
}

/// Download a Whisper model from Hugging Face.
///
/// The response is streamed into a `.part` file and renamed once complete,
/// so an interrupted download never leaves a truncated model behind.
pub fn download_model(model: WhisperModel) -> Result<PathBuf, WhisperError> {
    let path = model_path(model);

    if is_model_downloaded(model) {
        info!("Model {} already downloaded at {:?}", model, path);
        return Ok(path);
    }

    fs::create_dir_all(models_dir())?;

    let url = model.hf_url();
    info!(
        "Downloading Whisper {} model (~{}MB) from {}",
        model,
        model.size_mb(),
        url
    );

    // No request timeout: the larger models take minutes to fetch
    let client = reqwest::blocking::Client::builder()
        .timeout(None)
        .build()
        .map_err(|e| WhisperError::Download(format!("Failed to build HTTP client: {}", e)))?;

    let response = client
        .get(&url)
        .send()
        .map_err(|e| WhisperError::Download(format!("HTTP request failed: {}", e)))?;

    if !response.status().is_success() {
        return Err(WhisperError::Download(format!(
            "HTTP {} from {}",
            response.status(),
            url
        )));
    }

    let total_size = response
        .content_length()
        .unwrap_or(model.size_mb() * 1024 * 1024);

    let pb = indicatif::ProgressBar::new(total_size);
    pb.set_style(
        indicatif::ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .unwrap()
            .progress_chars("#>-"),
    );

    let temp_path = path.with_extension("bin.part");
    let mut file = File::create(&temp_path)?;
    let mut reader = pb.wrap_read(response);
    io::copy(&mut reader, &mut file)?;
    pb.finish_with_message("Download complete");

    fs::rename(&temp_path, &path)?;

    info!("Model downloaded to {:?}", path);

    Ok(path)
}

/// Whisper transcriber
pub struct Transcriber {
    ctx: WhisperContext,
    model: WhisperModel,
    n_threads: i32,
}

impl Transcriber {
    /// Load a model by name, downloading it first if needed
    pub fn new(model: WhisperModel) -> Result<Self, WhisperError> {
        let path = download_model(model)?;

        info!("Loading Whisper {} model...", model);
        let load_start = std::time::Instant::now();

        let path_str = path.to_str().ok_or_else(|| {
            WhisperError::Init(format!("Model path is not valid UTF-8: {:?}", path))
        })?;

        let ctx = WhisperContext::new_with_params(path_str, WhisperContextParameters::default())
            .map_err(|e| WhisperError::Init(format!("Failed to load model: {}", e)))?;

        let n_threads = std::thread::available_parallelism()
            .map(|p| p.get() as i32)
            .unwrap_or(4);

        info!(
            "Whisper model loaded in {:.1}s (using {} threads)",
            load_start.elapsed().as_secs_f32(),
            n_threads
        );

        Ok(Self {
            ctx,
            model,
            n_threads,
        })
    }

    /// Transcribe an audio file from disk
    pub fn transcribe_file(&self, path: &Path) -> Result<Transcription, WhisperError> {
        let audio = load_audio(path)?;
        self.transcribe(&audio)
    }

    /// Run the model over prepared audio
    pub fn transcribe(&self, audio: &PreparedAudio) -> Result<Transcription, WhisperError> {
        let start_time = std::time::Instant::now();

        info!(
            "Transcribing {:.2}s of audio with {} model",
            audio.duration_secs, self.model
        );

        // Greedy sampling with the decode thresholds the model ships with
        let mut params = FullParams::new(SamplingStrategy::Greedy { best_of: 1 });
        params.set_n_threads(self.n_threads);

        // Skip likely non-speech, reject low-confidence decodes, retry at
        // higher temperature when decoding fails
        params.set_no_speech_thold(0.6);
        params.set_entropy_thold(2.4);
        params.set_logprob_thold(-1.0);
        params.set_temperature(0.0);
        params.set_temperature_inc(0.2);

        // Detect the language, never translate
        params.set_language(Some("auto"));
        params.set_translate(false);

        params.set_print_progress(false);
        params.set_print_realtime(false);
        params.set_print_timestamps(false);
        params.set_print_special(false);

        let mut state = self
            .ctx
            .create_state()
            .map_err(|e| WhisperError::Transcription(format!("Failed to create state: {}", e)))?;

        state
            .full(params, &audio.samples_16khz)
            .map_err(|e| WhisperError::Transcription(format!("Inference failed: {}", e)))?;

        let num_segments = state
            .full_n_segments()
            .map_err(|e| WhisperError::Transcription(format!("Failed to get segments: {}", e)))?;

        let mut segments = Vec::new();
        let mut text = String::new();

        for i in 0..num_segments {
            let start_ts = state.full_get_segment_t0(i).map_err(|e| {
                WhisperError::Transcription(format!("Failed to get start time: {}", e))
            })?;
            let end_ts = state.full_get_segment_t1(i).map_err(|e| {
                WhisperError::Transcription(format!("Failed to get end time: {}", e))
            })?;
            let segment_text = state
                .full_get_segment_text(i)
                .map_err(|e| WhisperError::Transcription(format!("Failed to get text: {}", e)))?;

            let segment_text = segment_text.trim().to_string();
            if segment_text.is_empty() {
                continue;
            }

            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(&segment_text);

            // Timestamps are in centiseconds (1/100 second)
            segments.push(Segment {
                start_secs: start_ts as f32 / 100.0,
                end_secs: end_ts as f32 / 100.0,
                text: segment_text,
            });
        }

        for segment in &segments {
            debug!(
                "[{:.2}s - {:.2}s] {}",
                segment.start_secs, segment.end_secs, segment.text
            );
        }

        let language = state
            .full_lang_id_from_state()
            .ok()
            .and_then(|id| whisper_rs::get_lang_str(id).map(|s| s.to_string()));

        let elapsed = start_time.elapsed();
        info!(
            "Transcribed in {:.1}s ({:.1}x realtime): {} segments",
            elapsed.as_secs_f32(),
            audio.duration_secs / elapsed.as_secs_f32().max(0.001),
            segments.len()
        );

        Ok(Transcription {
            language,
            segments,
            text,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_parsing() {
        assert_eq!("tiny".parse::<WhisperModel>().unwrap(), WhisperModel::Tiny);
        assert_eq!("SMALL".parse::<WhisperModel>().unwrap(), WhisperModel::Small);
        assert!("invalid".parse::<WhisperModel>().is_err());
    }

    #[test]
    fn test_model_name_round_trips() {
        assert_eq!("base".parse::<WhisperModel>().unwrap().to_string(), "base");
    }

    #[test]
    fn test_model_paths() {
        assert!(model_path(WhisperModel::Tiny)
            .to_str()
            .unwrap()
            .contains("ggml-tiny.bin"));
    }

    #[test]
    fn test_hf_url_points_at_model_file() {
        let url = WhisperModel::Base.hf_url();
        assert!(url.starts_with("https://huggingface.co/ggerganov/whisper.cpp/"));
        assert!(url.ends_with("ggml-base.bin"));
    }

    #[test]
    fn test_plausible_size_requires_half_of_expected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ggml-test.bin");

        // Missing file
        assert!(!plausible_size(&path, 1));

        // 600KB against an expected 1MB clears the halfway mark
        std::fs::write(&path, vec![0u8; 600_000]).unwrap();
        assert!(plausible_size(&path, 1));

        // 100KB does not
        std::fs::write(&path, vec![0u8; 100_000]).unwrap();
        assert!(!plausible_size(&path, 1));
    }
}
