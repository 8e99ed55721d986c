use std::env;
use std::path::Path;
use std::process;

use anyhow::Context as _;
use dotenvy::dotenv;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod transcribe;

use transcribe::{Transcriber, WhisperModel};

/// Printed when invoked with the wrong number of arguments
const USAGE: &str = "Usage: hark <audio_file_path>";

fn main() -> anyhow::Result<()> {
    dotenv().ok();

    // Logs go to stderr so stdout carries nothing but the transcript
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let Some(audio_path) = audio_path_from_args(&args) else {
        println!("{}", USAGE);
        process::exit(1);
    };

    let text = transcribe_audio(Path::new(audio_path))?;
    println!("{}", text);

    Ok(())
}

/// The audio file path, when exactly one argument was given
fn audio_path_from_args(args: &[String]) -> Option<&str> {
    match args {
        [_, path] => Some(path.as_str()),
        _ => None,
    }
}

/// Load the base model and transcribe a single file, returning its text
fn transcribe_audio(audio_path: &Path) -> anyhow::Result<String> {
    let transcriber =
        Transcriber::new(WhisperModel::Base).context("Failed to load Whisper model")?;

    let transcription = transcriber
        .transcribe_file(audio_path)
        .with_context(|| format!("Failed to transcribe {}", audio_path.display()))?;

    info!(
        "Detected language {:?}, {} segment(s)",
        transcription.language,
        transcription.segments.len()
    );

    Ok(transcription.text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_audio_path_requires_exactly_one_argument() {
        assert_eq!(audio_path_from_args(&argv(&["hark"])), None);
        assert_eq!(
            audio_path_from_args(&argv(&["hark", "meeting.wav"])),
            Some("meeting.wav")
        );
        assert_eq!(
            audio_path_from_args(&argv(&["hark", "a.wav", "b.wav"])),
            None
        );
    }

    #[test]
    fn test_audio_path_handles_empty_argv() {
        assert_eq!(audio_path_from_args(&argv(&[])), None);
    }

    #[test]
    fn test_usage_line() {
        assert!(USAGE.starts_with("Usage:"));
        assert!(USAGE.contains("<audio_file_path>"));
    }
}
