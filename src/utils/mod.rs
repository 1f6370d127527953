use tokio::process::Command;

use crate::config::MediaConfig;

/// Check that the external engines are reachable. Missing tools are
/// reported as warnings; the pipeline fails per item if they really are
/// absent at run time.
pub async fn check_dependencies(media: &MediaConfig) -> Vec<String> {
    let mut missing = Vec::new();

    if !check_command_available(&media.ffmpeg_binary, "-version").await {
        missing.push(format!(
            "{} - required for audio extraction from videos",
            media.ffmpeg_binary
        ));
    }

    if !check_command_available(&media.whisper_binary, "--help").await {
        missing.push(format!(
            "{} - required for speech-to-text transcription",
            media.whisper_binary
        ));
    }

    missing
}

/// Check if a command is available in PATH
async fn check_command_available(command: &str, probe_arg: &str) -> bool {
    Command::new(command)
        .arg(probe_arg)
        .output()
        .await
        .map(|output| output.status.success())
        .unwrap_or(false)
}
