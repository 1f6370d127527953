use anyhow::{anyhow, Result};
use std::path::{Path, PathBuf};

/// Subfolder that receives extracted MP3 audio.
pub const AUDIO_DIR: &str = "Conversao";

/// Subfolder that receives plain-text transcripts.
pub const TRANSCRIPT_DIR: &str = "Transcricao";

/// Subfolder that receives the Markdown summaries.
pub const SUMMARY_DIR: &str = "Resultados_IA";

/// Derive the base name (file stem) used for every artifact of an item.
pub fn base_name(path: &Path) -> Result<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("Cannot derive a base name from {}", path.display()))
}

/// Fixed on-disk layout for all pipeline artifacts, rooted at one directory.
///
/// Writes are plain overwrites: running the pipeline twice on the same input
/// produces the same paths with last-write-wins contents, never numbered
/// duplicates. There is no atomic-write guarantee.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/Conversao/<base>/<base>.mp3`
    pub fn audio_path(&self, base: &str) -> PathBuf {
        self.root
            .join(AUDIO_DIR)
            .join(base)
            .join(format!("{base}.mp3"))
    }

    /// `<root>/Transcricao/<base>.txt`
    pub fn transcript_path(&self, base: &str) -> PathBuf {
        self.root.join(TRANSCRIPT_DIR).join(format!("{base}.txt"))
    }

    /// `<root>/Resultados_IA/<base>/<base>_resultado_IA.md`
    pub fn summary_path(&self, base: &str) -> PathBuf {
        self.root
            .join(SUMMARY_DIR)
            .join(base)
            .join(format!("{base}_resultado_IA.md"))
    }

    /// Write the transcript verbatim, creating directories as needed.
    pub fn save_transcript(&self, base: &str, text: &str) -> Result<PathBuf> {
        let path = self.transcript_path(base);
        write_text(&path, text)?;
        Ok(path)
    }

    /// Write the summary Markdown verbatim, creating directories as needed.
    pub fn save_summary(&self, base: &str, markdown: &str) -> Result<PathBuf> {
        let path = self.summary_path(base);
        write_text(&path, markdown)?;
        Ok(path)
    }
}

fn write_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs_err::create_dir_all(parent)?;
    }
    fs_err::write(path, text)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_name_strips_extension() {
        assert_eq!(base_name(Path::new("/tmp/lecture 01.mp4")).unwrap(), "lecture 01");
        assert_eq!(base_name(Path::new("talk.mkv")).unwrap(), "talk");
    }

    #[test]
    fn paths_follow_the_fixed_conventions() {
        let layout = OutputLayout::new("/data/out");
        assert_eq!(
            layout.audio_path("talk"),
            PathBuf::from("/data/out/Conversao/talk/talk.mp3")
        );
        assert_eq!(
            layout.transcript_path("talk"),
            PathBuf::from("/data/out/Transcricao/talk.txt")
        );
        assert_eq!(
            layout.summary_path("talk"),
            PathBuf::from("/data/out/Resultados_IA/talk/talk_resultado_IA.md")
        );
    }

    #[test]
    fn save_creates_directories_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());

        let first = layout.save_transcript("talk", "first version").unwrap();
        assert!(first.parent().unwrap().exists());
        assert_eq!(fs_err::read_to_string(&first).unwrap(), "first version");

        let second = layout.save_transcript("talk", "second version").unwrap();
        assert_eq!(first, second);
        assert_eq!(fs_err::read_to_string(&second).unwrap(), "second version");
    }

    #[test]
    fn save_summary_writes_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let layout = OutputLayout::new(dir.path());

        let path = layout.save_summary("talk", "# Summary\n\n- point").unwrap();
        assert!(path.ends_with("Resultados_IA/talk/talk_resultado_IA.md"));
        assert_eq!(
            fs_err::read_to_string(&path).unwrap(),
            "# Summary\n\n- point"
        );
    }
}
