use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::pipeline::ItemKind;

#[derive(Parser)]
#[command(
    name = "summarizer",
    about = "Video Summarizer - transcribe videos with Whisper and summarize them with Gemini",
    version,
    long_about = "A pipeline that extracts audio from videos with ffmpeg, transcribes it with the \
Whisper CLI, sends the transcript to the Gemini API and saves the resulting Markdown summary. \
Runs either as an interactive console batch over a folder or as a local web form."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Process a folder of videos (prompts for the path if not given)
    Run {
        /// Folder containing the videos to process
        #[arg(value_name = "FOLDER")]
        folder: Option<PathBuf>,

        /// Instruction for the summarization step (prompted interactively if omitted)
        #[arg(short, long, value_name = "TEXT")]
        instruction: Option<String>,

        /// Output root for Conversao/Transcricao/Resultados_IA (defaults to the folder's parent)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// Process a single local file of a chosen kind
    File {
        /// Path to the video, audio or transcript file
        #[arg(value_name = "PATH")]
        path: PathBuf,

        /// What the file is
        #[arg(short, long, value_enum, default_value = "video")]
        kind: FileKind,

        /// Instruction for the summarization step (default instruction used if omitted)
        #[arg(short, long, value_name = "TEXT")]
        instruction: Option<String>,

        /// Output root (defaults to the current directory)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// Start the local web form front end
    Serve {
        /// Address to bind the server to
        #[arg(short, long, default_value = "127.0.0.1:8787")]
        addr: String,
    },

    /// Store the API key from GEMINI_API_KEY and the upload size limit
    Setup {
        /// Maximum accepted input file size in megabytes
        #[arg(long, default_value_t = 1000)]
        max_upload_mb: u64,
    },

    /// Show or edit the configuration
    Config {
        /// Show current configuration
        #[arg(short, long)]
        show: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum FileKind {
    /// A video file; audio is extracted first
    Video,
    /// An audio file; transcription starts directly
    Audio,
    /// A pre-existing plain-text transcript
    Transcript,
}

impl From<FileKind> for ItemKind {
    fn from(kind: FileKind) -> Self {
        match kind {
            FileKind::Video => ItemKind::Video,
            FileKind::Audio => ItemKind::Audio,
            FileKind::Transcript => ItemKind::Transcript,
        }
    }
}
