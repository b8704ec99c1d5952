//! Resolution of song ids to audio files in the song library directory.

use std::path::PathBuf;

/// Extensions tried, in order, when resolving a song id.
pub const AUDIO_EXTENSIONS: [&str; 8] = [".mp3", ".wav", ".flac", ".ogg", ".m4a", ".aac", ".wma", ".au"];

#[derive(Debug, Clone, Default)]
pub struct SongLibrary {
    root: Option<PathBuf>,
}

impl SongLibrary {
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root }
    }

    pub fn is_configured(&self) -> bool {
        self.root.is_some()
    }

    /// Ids must be plain file stems; anything that could escape the library
    /// directory is rejected.
    fn is_safe_id(song_id: &str) -> bool {
        !song_id.trim().is_empty()
            && !song_id.contains(['/', '\\', '\0'])
            && !song_id.contains("..")
    }

    /// First existing `<root>/<song_id><ext>`, if any.
    pub fn resolve(&self, song_id: &str) -> Option<PathBuf> {
        let root = self.root.as_deref()?;
        if !Self::is_safe_id(song_id) || !root.is_dir() {
            return None;
        }
        AUDIO_EXTENSIONS
            .iter()
            .map(|ext| root.join(format!("{}{}", song_id, ext)))
            .find(|candidate| candidate.is_file())
    }
}
