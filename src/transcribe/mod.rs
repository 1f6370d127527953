use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use tokio::process::Command;

use crate::config::MediaConfig;
use crate::persist;
use crate::PipelineError;

/// Speech-to-text over one audio file. An empty transcript is a valid
/// result, not a failure; callers decide whether to skip downstream stages.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, PipelineError>;
}

/// JSON document written by the Whisper CLI alongside the transcript.
#[derive(Debug, Deserialize)]
struct WhisperOutput {
    text: String,
}

/// Whisper CLI engine with a fixed model profile.
///
/// Construct one engine per run and reuse it across items: the binary and
/// model names are resolved once here, while the external process still
/// loads the model on each invocation.
pub struct WhisperEngine {
    binary: String,
    model: String,
}

impl WhisperEngine {
    pub fn new(media: &MediaConfig) -> Self {
        Self {
            binary: media.whisper_binary.clone(),
            model: media.whisper_model.clone(),
        }
    }
}

fn transcription_failed(path: &Path, reason: impl Into<String>) -> PipelineError {
    PipelineError::TranscriptionFailed {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Extract the trimmed transcript text from the engine's JSON output.
fn parse_transcript(json: &str) -> Result<String, serde_json::Error> {
    let output: WhisperOutput = serde_json::from_str(json)?;
    Ok(output.text.trim().to_string())
}

#[async_trait]
impl SpeechEngine for WhisperEngine {
    async fn transcribe(&self, audio_path: &Path) -> Result<String, PipelineError> {
        if !audio_path.is_file() {
            return Err(transcription_failed(audio_path, "audio file does not exist"));
        }

        let base = persist::base_name(audio_path)
            .map_err(|e| transcription_failed(audio_path, e.to_string()))?;

        let scratch = tempfile::tempdir()
            .map_err(|e| transcription_failed(audio_path, e.to_string()))?;

        tracing::info!("Transcribing {} with model '{}'", audio_path.display(), self.model);

        let output = Command::new(&self.binary)
            .arg(audio_path)
            .arg("--model")
            .arg(&self.model)
            .arg("--output_format")
            .arg("json")
            .arg("--output_dir")
            .arg(scratch.path())
            .output()
            .await
            .map_err(|e| {
                transcription_failed(audio_path, format!("failed to run {}: {}", self.binary, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr.lines().last().unwrap_or("whisper exited with error");
            return Err(transcription_failed(audio_path, reason));
        }

        let json_path = scratch.path().join(format!("{base}.json"));
        let json = fs_err::read_to_string(&json_path)
            .map_err(|e| transcription_failed(audio_path, e.to_string()))?;

        parse_transcript(&json).map_err(|e| transcription_failed(audio_path, e.to_string()))
    }
}
