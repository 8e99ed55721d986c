mod prepare;
mod whisper;

pub use prepare::{load_audio, AudioError, PreparedAudio, WHISPER_SAMPLE_RATE};

pub use whisper::{
    download_model, is_model_downloaded, model_path, models_dir, Segment, Transcriber,
    Transcription, WhisperError, WhisperModel,
};
