use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

use crate::config::MediaConfig;
use crate::persist::{self, OutputLayout};
use crate::PipelineError;

/// Extracts the audio track of a video into a deterministic MP3 path.
#[async_trait]
pub trait AudioExtractor: Send + Sync {
    /// Extract audio from `video_path` into
    /// `<output_root>/Conversao/<base>/<base>.mp3` and return that path.
    async fn extract(
        &self,
        video_path: &Path,
        output_root: &Path,
    ) -> Result<PathBuf, PipelineError>;
}

/// ffmpeg-based extractor: constant 320 kbit/s MP3, no video stream,
/// chapter metadata stripped, existing output overwritten.
pub struct FfmpegExtractor {
    binary: String,
    bitrate: String,
}

impl FfmpegExtractor {
    pub fn new(media: &MediaConfig) -> Self {
        Self {
            binary: media.ffmpeg_binary.clone(),
            bitrate: media.audio_bitrate.clone(),
        }
    }
}

fn extraction_failed(path: &Path, reason: impl Into<String>) -> PipelineError {
    PipelineError::ExtractionFailed {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

#[async_trait]
impl AudioExtractor for FfmpegExtractor {
    async fn extract(
        &self,
        video_path: &Path,
        output_root: &Path,
    ) -> Result<PathBuf, PipelineError> {
        if !video_path.is_file() {
            return Err(extraction_failed(video_path, "input file does not exist"));
        }

        let base = persist::base_name(video_path)
            .map_err(|e| extraction_failed(video_path, e.to_string()))?;

        let audio_path = OutputLayout::new(output_root).audio_path(&base);
        if let Some(parent) = audio_path.parent() {
            fs_err::create_dir_all(parent)
                .map_err(|e| extraction_failed(video_path, e.to_string()))?;
        }

        tracing::info!(
            "Extracting audio: {} -> {}",
            video_path.display(),
            audio_path.display()
        );

        let output = Command::new(&self.binary)
            .arg("-i")
            .arg(video_path)
            .arg("-vn")
            .arg("-ab")
            .arg(&self.bitrate)
            .arg("-map_chapters")
            .arg("-1")
            .arg("-y")
            .arg(&audio_path)
            .output()
            .await
            .map_err(|e| {
                extraction_failed(video_path, format!("failed to run {}: {}", self.binary, e))
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let reason = stderr.lines().last().unwrap_or("ffmpeg exited with error");
            return Err(extraction_failed(video_path, reason));
        }

        Ok(audio_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn extractor() -> FfmpegExtractor {
        FfmpegExtractor::new(&Config::default().media)
    }

    #[tokio::test]
    async fn missing_input_is_extraction_failed() {
        let dir = tempfile::tempdir().unwrap();
        let err = extractor()
            .extract(Path::new("/no/such/video.mp4"), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::ExtractionFailed { .. }));
    }

    #[tokio::test]
    async fn missing_binary_is_extraction_failed_not_panic() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("clip.mp4");
        fs_err::write(&video, b"not really a video").unwrap();

        let media = crate::config::MediaConfig {
            ffmpeg_binary: "ffmpeg-binary-that-does-not-exist".to_string(),
            audio_bitrate: "320k".to_string(),
            whisper_binary: "whisper".to_string(),
            whisper_model: "small".to_string(),
        };
        let err = FfmpegExtractor::new(&media)
            .extract(&video, dir.path())
            .await
            .unwrap_err();

        match err {
            PipelineError::ExtractionFailed { path, .. } => assert_eq!(path, video),
            other => panic!("unexpected error: {other}"),
        }
    }
}
