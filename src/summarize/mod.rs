use async_trait::async_trait;

use crate::PipelineError;

pub mod gemini;

pub use gemini::GeminiClient;

/// Instruction used when the user supplies none.
pub const DEFAULT_INSTRUCTION: &str =
    "Based on the following transcript, produce a concise, well-structured summary in Markdown format.";

/// A generative-language service: prompt in, text out.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    async fn generate(&self, prompt: &str) -> crate::Result<String>;
}

/// Outcome of one summarization. The reference behavior of embedding the
/// error message in the Markdown body is preserved; `failed` is the typed
/// flag callers use to detect it programmatically.
#[derive(Debug, Clone)]
pub struct Summary {
    pub markdown: String,
    pub failed: bool,
}

/// Build the prompt sent to the generative service. The transcript is
/// embedded verbatim, with no escaping and no chunking of long inputs.
pub fn build_prompt(transcript: &str, instruction: Option<&str>) -> String {
    let instruction = match instruction {
        Some(text) if !text.trim().is_empty() => text,
        _ => DEFAULT_INSTRUCTION,
    };

    format!(
        "**User instruction:**\n{instruction}\n\n---\n\n**Transcript for analysis:**\n{transcript}"
    )
}

pub struct Summarizer {
    client: Box<dyn GenerativeClient>,
}

impl Summarizer {
    pub fn new(client: Box<dyn GenerativeClient>) -> Self {
        Self { client }
    }

    /// Summarize a transcript under an optional instruction.
    ///
    /// An empty transcript returns a sentinel failure without calling the
    /// service. A service error is reported in the Markdown body with
    /// `failed` set, so a run never aborts on a bad summarization call.
    pub async fn summarize(&self, transcript: &str, instruction: Option<&str>) -> Summary {
        if transcript.trim().is_empty() {
            return Summary {
                markdown: format!("Error: {}", PipelineError::EmptyTranscript),
                failed: true,
            };
        }

        let prompt = build_prompt(transcript, instruction);

        tracing::info!("Sending transcript to the generative service");
        match self.client.generate(&prompt).await {
            Ok(markdown) => Summary {
                markdown,
                failed: false,
            },
            Err(e) => {
                let err = PipelineError::SummarizationFailed(format!("{e:#}"));
                tracing::warn!("{err}");
                Summary {
                    markdown: format!("Error while processing with the AI service: {e:#}"),
                    failed: true,
                }
            }
        }
    }
}
