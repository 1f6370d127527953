use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::extract::{AudioExtractor, FfmpegExtractor};
use crate::persist::{self, OutputLayout};
use crate::summarize::{GeminiClient, Summarizer};
use crate::transcribe::{SpeechEngine, WhisperEngine};
use crate::Config;

/// Extensions recognized during folder discovery.
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "mkv", "avi", "mov", "flv", "wmv", "webm", "mpeg", "mpg",
];

/// What a single input file is, which decides where its pipeline starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemKind {
    Video,
    Audio,
    Transcript,
}

/// Terminal state of one item's pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    /// Transcript and summary both persisted.
    Completed,
    /// Summary persisted, but it holds an error message instead of content.
    SummaryFailed,
    /// Transcript persisted but empty; summarization was skipped.
    EmptyTranscript,
    ExtractionFailed(String),
    TranscriptionFailed(String),
}

/// Per-item outcome, with the artifact paths that were actually written.
#[derive(Debug, Clone)]
pub struct ItemReport {
    pub source: PathBuf,
    pub transcript_path: Option<PathBuf>,
    pub summary_path: Option<PathBuf>,
    pub status: ItemStatus,
}

impl ItemReport {
    fn failed(source: &Path, status: ItemStatus) -> Self {
        Self {
            source: source.to_path_buf(),
            transcript_path: None,
            summary_path: None,
            status,
        }
    }
}

/// Outcome of one batch run.
#[derive(Debug, Default)]
pub struct RunReport {
    pub items: Vec<ItemReport>,
}

impl RunReport {
    pub fn completed(&self) -> usize {
        self.items
            .iter()
            .filter(|i| i.status == ItemStatus::Completed)
            .count()
    }
}

/// Supplies the optional summarization instruction for a run. Resolved
/// lazily, exactly once per run, between transcription and summarization
/// of the first item that needs it.
pub trait InstructionSource: Send {
    fn instruction(&mut self) -> Option<String>;
}

/// Fixed run-level instruction (web front end and `--instruction` flag).
pub struct StaticInstruction(pub Option<String>);

impl InstructionSource for StaticInstruction {
    fn instruction(&mut self) -> Option<String> {
        self.0.clone()
    }
}

struct CachedInstruction<'a> {
    source: &'a mut dyn InstructionSource,
    cached: Option<Option<String>>,
}

impl CachedInstruction<'_> {
    fn resolve(&mut self) -> Option<String> {
        if self.cached.is_none() {
            self.cached = Some(self.source.instruction());
        }
        self.cached.clone().unwrap_or_default()
    }
}

/// Scan one directory level for video files, sorted by path so batch
/// ordering is deterministic.
pub fn discover_videos(folder: &Path) -> crate::Result<Vec<PathBuf>> {
    if !folder.is_dir() {
        anyhow::bail!("Not a valid folder: {}", folder.display());
    }

    let mut items = Vec::new();
    for entry in fs_err::read_dir(folder)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let recognized = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .is_some_and(|e| VIDEO_EXTENSIONS.contains(&e.as_str()));
        if recognized {
            items.push(path);
        }
    }

    items.sort();
    Ok(items)
}

/// Sequences extract -> transcribe -> summarize -> persist per item.
/// Items are processed strictly one at a time; a failed item is logged
/// and skipped, never aborting the run.
pub struct Pipeline {
    extractor: Arc<dyn AudioExtractor>,
    engine: Arc<dyn SpeechEngine>,
    summarizer: Summarizer,
}

impl Pipeline {
    pub fn new(
        extractor: Arc<dyn AudioExtractor>,
        engine: Arc<dyn SpeechEngine>,
        summarizer: Summarizer,
    ) -> Self {
        Self {
            extractor,
            engine,
            summarizer,
        }
    }

    /// Build the production pipeline from configuration plus the resolved
    /// API key. The Whisper engine is constructed once here and reused for
    /// every item of the run.
    pub fn from_config(config: &Config, api_key: String) -> crate::Result<Self> {
        let client =
            GeminiClient::new(&config.gemini, api_key).context("Failed to build Gemini client")?;

        Ok(Self::new(
            Arc::new(FfmpegExtractor::new(&config.media)),
            Arc::new(WhisperEngine::new(&config.media)),
            Summarizer::new(Box::new(client)),
        ))
    }

    /// Process every recognized video in `folder`, in sorted order.
    /// Output artifacts land under the folder's parent directory.
    pub async fn run_batch(
        &self,
        folder: &Path,
        instructions: &mut dyn InstructionSource,
    ) -> crate::Result<RunReport> {
        let items = discover_videos(folder)?;
        if items.is_empty() {
            tracing::info!("No videos found in {}", folder.display());
            return Ok(RunReport::default());
        }

        let root = folder
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        let layout = OutputLayout::new(root);

        let mut cached = CachedInstruction {
            source: instructions,
            cached: None,
        };

        let mut report = RunReport::default();
        for item in items {
            let item_report = self
                .process_item(&item, ItemKind::Video, &layout, &mut cached)
                .await;
            report.items.push(item_report);
        }

        Ok(report)
    }

    /// Process one file of the given kind into `output_root`.
    pub async fn run_single(
        &self,
        source: &Path,
        kind: ItemKind,
        instruction: Option<String>,
        output_root: &Path,
    ) -> ItemReport {
        let layout = OutputLayout::new(output_root);
        let mut source_instruction = StaticInstruction(instruction);
        let mut cached = CachedInstruction {
            source: &mut source_instruction,
            cached: None,
        };
        self.process_item(source, kind, &layout, &mut cached).await
    }

    async fn process_item(
        &self,
        source: &Path,
        kind: ItemKind,
        layout: &OutputLayout,
        instructions: &mut CachedInstruction<'_>,
    ) -> ItemReport {
        let base = match persist::base_name(source) {
            Ok(base) => base,
            Err(e) => {
                tracing::warn!("Skipping {}: {e:#}", source.display());
                return ItemReport::failed(source, ItemStatus::ExtractionFailed(e.to_string()));
            }
        };

        // EXTRACT (videos only)
        let audio_path = match kind {
            ItemKind::Video => match self.extractor.extract(source, layout.root()).await {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::warn!("Skipping {}: {e}", source.display());
                    return ItemReport::failed(source, ItemStatus::ExtractionFailed(e.to_string()));
                }
            },
            ItemKind::Audio => Some(source.to_path_buf()),
            ItemKind::Transcript => None,
        };

        // TRANSCRIBE (or read the supplied transcript)
        let transcript = match &audio_path {
            Some(audio) => {
                let progress = spinner(format!("Transcribing {base}..."));
                let result = self.engine.transcribe(audio).await;
                progress.finish_and_clear();
                match result {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::warn!("Skipping {}: {e}", source.display());
                        return ItemReport::failed(
                            source,
                            ItemStatus::TranscriptionFailed(e.to_string()),
                        );
                    }
                }
            }
            None => match fs_err::read_to_string(source) {
                Ok(text) => text.trim().to_string(),
                Err(e) => {
                    tracing::warn!("Skipping {}: {e}", source.display());
                    return ItemReport::failed(
                        source,
                        ItemStatus::TranscriptionFailed(e.to_string()),
                    );
                }
            },
        };

        // The transcript is persisted even when empty.
        let transcript_path = match layout.save_transcript(&base, &transcript) {
            Ok(path) => {
                tracing::info!("Transcript saved to {}", path.display());
                path
            }
            Err(e) => {
                tracing::warn!("Skipping {}: {e:#}", source.display());
                return ItemReport::failed(source, ItemStatus::TranscriptionFailed(e.to_string()));
            }
        };

        if transcript.is_empty() {
            tracing::warn!(
                "Transcription of {} produced no text, skipping summarization",
                source.display()
            );
            return ItemReport {
                source: source.to_path_buf(),
                transcript_path: Some(transcript_path),
                summary_path: None,
                status: ItemStatus::EmptyTranscript,
            };
        }

        // ASK_INSTRUCTION (once per run) then SUMMARIZE
        let instruction = instructions.resolve();

        let progress = spinner(format!("Summarizing {base}..."));
        let summary = self
            .summarizer
            .summarize(&transcript, instruction.as_deref())
            .await;
        progress.finish_and_clear();

        let (summary_path, status) = match layout.save_summary(&base, &summary.markdown) {
            Ok(path) => {
                tracing::info!("Summary saved to {}", path.display());
                let status = if summary.failed {
                    ItemStatus::SummaryFailed
                } else {
                    ItemStatus::Completed
                };
                (Some(path), status)
            }
            Err(e) => {
                tracing::warn!("Could not save summary for {}: {e:#}", source.display());
                (None, ItemStatus::SummaryFailed)
            }
        };

        ItemReport {
            source: source.to_path_buf(),
            transcript_path: Some(transcript_path),
            summary_path,
            status,
        }
    }
}

fn spinner(message: String) -> ProgressBar {
    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    progress.set_message(message);
    progress.enable_steady_tick(Duration::from_millis(120));
    progress
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::summarize::{GenerativeClient, MockGenerativeClient};
    use crate::PipelineError;
    use async_trait::async_trait;

    /// Writes an empty MP3 at the conventional path; fails for any source
    /// whose name contains "broken".
    struct FakeExtractor;

    #[async_trait]
    impl AudioExtractor for FakeExtractor {
        async fn extract(
            &self,
            video_path: &Path,
            output_root: &Path,
        ) -> Result<PathBuf, PipelineError> {
            if video_path.to_string_lossy().contains("broken") {
                return Err(PipelineError::ExtractionFailed {
                    path: video_path.to_path_buf(),
                    reason: "corrupt container".to_string(),
                });
            }
            let base = persist::base_name(video_path).unwrap();
            let path = OutputLayout::new(output_root).audio_path(&base);
            fs_err::create_dir_all(path.parent().unwrap()).unwrap();
            fs_err::write(&path, b"").unwrap();
            Ok(path)
        }
    }

    /// Returns a transcript derived from the file name; empty for "silent".
    struct FakeEngine;

    #[async_trait]
    impl SpeechEngine for FakeEngine {
        async fn transcribe(&self, audio_path: &Path) -> Result<String, PipelineError> {
            let base = persist::base_name(audio_path).unwrap();
            if base.contains("silent") {
                Ok(String::new())
            } else {
                Ok(format!("transcript of {base}"))
            }
        }
    }

    fn generator(times: usize) -> Box<dyn GenerativeClient> {
        let mut client = MockGenerativeClient::new();
        client
            .expect_generate()
            .times(times)
            .returning(|_| Ok("# Summary".to_string()));
        Box::new(client)
    }

    fn pipeline(times: usize) -> Pipeline {
        Pipeline::new(
            Arc::new(FakeExtractor),
            Arc::new(FakeEngine),
            Summarizer::new(generator(times)),
        )
    }

    fn touch(path: &Path) {
        fs_err::write(path, b"media bytes").unwrap();
    }

    #[test]
    fn discovery_is_sorted_and_filtered() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.mp4", "a.mp4", "c.mp4", "notes.txt", "clip.MOV"] {
            touch(&dir.path().join(name));
        }

        let found = discover_videos(dir.path()).unwrap();
        let names: Vec<_> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap())
            .collect();
        assert_eq!(names, vec!["a.mp4", "b.mp4", "c.mp4", "clip.MOV"]);
    }

    #[test]
    fn discovery_rejects_non_folders() {
        assert!(discover_videos(Path::new("/no/such/folder")).is_err());
    }

    #[tokio::test]
    async fn corrupt_item_is_skipped_and_batch_continues() {
        let dir = tempfile::tempdir().unwrap();
        let videos = dir.path().join("videos");
        fs_err::create_dir_all(&videos).unwrap();
        touch(&videos.join("broken.mp4"));
        touch(&videos.join("good.mp4"));

        let pipeline = pipeline(1);
        let mut instructions = StaticInstruction(None);
        let report = pipeline.run_batch(&videos, &mut instructions).await.unwrap();

        assert_eq!(report.items.len(), 2);
        assert!(matches!(
            report.items[0].status,
            ItemStatus::ExtractionFailed(_)
        ));
        assert_eq!(report.items[1].status, ItemStatus::Completed);
        assert_eq!(report.completed(), 1);

        let layout = OutputLayout::new(dir.path());
        assert!(layout.transcript_path("good").exists());
        assert!(layout.summary_path("good").exists());
        assert!(!layout.transcript_path("broken").exists());
        assert!(!layout.summary_path("broken").exists());
    }

    #[tokio::test]
    async fn empty_transcript_skips_summary_but_is_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let videos = dir.path().join("videos");
        fs_err::create_dir_all(&videos).unwrap();
        touch(&videos.join("silent.mp4"));

        // The generative client must never be called.
        let pipeline = pipeline(0);
        let mut instructions = StaticInstruction(None);
        let report = pipeline.run_batch(&videos, &mut instructions).await.unwrap();

        assert_eq!(report.items.len(), 1);
        assert_eq!(report.items[0].status, ItemStatus::EmptyTranscript);
        assert!(report.items[0].summary_path.is_none());

        let layout = OutputLayout::new(dir.path());
        assert!(layout.transcript_path("silent").exists());
        assert_eq!(
            fs_err::read_to_string(layout.transcript_path("silent")).unwrap(),
            ""
        );
        assert!(!layout.summary_path("silent").exists());
    }

    #[tokio::test]
    async fn rerunning_overwrites_the_same_paths() {
        let dir = tempfile::tempdir().unwrap();
        let videos = dir.path().join("videos");
        fs_err::create_dir_all(&videos).unwrap();
        touch(&videos.join("talk.mp4"));

        let first = pipeline(1)
            .run_batch(&videos, &mut StaticInstruction(None))
            .await
            .unwrap();
        let second = pipeline(1)
            .run_batch(&videos, &mut StaticInstruction(None))
            .await
            .unwrap();

        assert_eq!(
            first.items[0].summary_path.as_ref().unwrap(),
            second.items[0].summary_path.as_ref().unwrap()
        );

        // Exactly one summary file, no numbered duplicates.
        let summary_dir = OutputLayout::new(dir.path())
            .summary_path("talk")
            .parent()
            .unwrap()
            .to_path_buf();
        assert_eq!(fs_err::read_dir(summary_dir).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn instruction_is_requested_once_per_run() {
        struct Counting(usize);
        impl InstructionSource for Counting {
            fn instruction(&mut self) -> Option<String> {
                self.0 += 1;
                Some("focus on decisions".to_string())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let videos = dir.path().join("videos");
        fs_err::create_dir_all(&videos).unwrap();
        touch(&videos.join("one.mp4"));
        touch(&videos.join("two.mp4"));

        let mut client = MockGenerativeClient::new();
        client
            .expect_generate()
            .times(2)
            .withf(|prompt| prompt.contains("focus on decisions"))
            .returning(|_| Ok("# ok".to_string()));
        let pipeline = Pipeline::new(
            Arc::new(FakeExtractor),
            Arc::new(FakeEngine),
            Summarizer::new(Box::new(client)),
        );

        let mut instructions = Counting(0);
        pipeline.run_batch(&videos, &mut instructions).await.unwrap();
        assert_eq!(instructions.0, 1);
    }

    #[tokio::test]
    async fn single_transcript_file_goes_straight_to_summary() {
        let dir = tempfile::tempdir().unwrap();
        let notes = dir.path().join("meeting.txt");
        fs_err::write(&notes, "we agreed on the rollout plan\n").unwrap();

        let report = pipeline(1)
            .run_single(&notes, ItemKind::Transcript, None, dir.path())
            .await;

        assert_eq!(report.status, ItemStatus::Completed);
        let layout = OutputLayout::new(dir.path());
        assert_eq!(
            fs_err::read_to_string(layout.transcript_path("meeting")).unwrap(),
            "we agreed on the rollout plan"
        );
        assert!(layout.summary_path("meeting").exists());
    }

    #[tokio::test]
    async fn failed_generation_is_recorded_as_summary_failed() {
        let dir = tempfile::tempdir().unwrap();
        let video = dir.path().join("talk.mp4");
        touch(&video);

        let mut client = MockGenerativeClient::new();
        client
            .expect_generate()
            .times(1)
            .returning(|_| Err(anyhow::anyhow!("quota exceeded")));
        let pipeline = Pipeline::new(
            Arc::new(FakeExtractor),
            Arc::new(FakeEngine),
            Summarizer::new(Box::new(client)),
        );

        let report = pipeline
            .run_single(&video, ItemKind::Video, None, dir.path())
            .await;

        assert_eq!(report.status, ItemStatus::SummaryFailed);
        let saved =
            fs_err::read_to_string(report.summary_path.unwrap()).unwrap();
        assert!(saved.contains("quota exceeded"));
    }
}
