//! Video Summarizer - turns videos and audio files into Markdown summaries
//!
//! This library wires three external engines into one pipeline: ffmpeg for
//! audio extraction, the Whisper CLI for speech-to-text, and the Gemini API
//! for summarization. Transcripts and summaries are persisted under fixed
//! directory conventions derived from each input's base name.

pub mod cli;
pub mod config;
pub mod console;
pub mod extract;
pub mod persist;
pub mod pipeline;
pub mod summarize;
pub mod transcribe;
pub mod utils;
pub mod web;

pub use cli::{Cli, Commands};
pub use config::Config;
pub use extract::{AudioExtractor, FfmpegExtractor};
pub use persist::OutputLayout;
pub use pipeline::{ItemKind, ItemReport, ItemStatus, Pipeline, RunReport};
pub use summarize::{GenerativeClient, Summarizer, Summary};
pub use transcribe::{SpeechEngine, WhisperEngine};

use std::path::PathBuf;

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;

/// Error taxonomy for the pipeline. Everything except `MissingCredential`
/// is caught at the item boundary; a failed item is skipped, the run goes on.
#[derive(thiserror::Error, Debug)]
pub enum PipelineError {
    #[error("No API key found: set GEMINI_API_KEY or run `summarizer setup`")]
    MissingCredential,

    #[error("Audio extraction failed for {path}: {reason}")]
    ExtractionFailed { path: PathBuf, reason: String },

    #[error("Transcription failed for {path}: {reason}")]
    TranscriptionFailed { path: PathBuf, reason: String },

    #[error("Transcript is empty, nothing to summarize")]
    EmptyTranscript,

    #[error("Summarization failed: {0}")]
    SummarizationFailed(String),
}
