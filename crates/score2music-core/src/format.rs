//! Input score formats, resolved once from the file extension.

use crate::error::{Error, Result};
use std::fmt;
use std::path::Path;

/// Supported input score formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScoreFormat {
    /// Uncompressed MusicXML (`.xml`, `.musicxml`).
    MusicXml,
    /// Zipped MusicXML (`.mxl`).
    CompressedMusicXml,
    /// MuseScore native (`.mscz`, `.mscx`). Converted externally.
    MuseScore,
    /// Standard MIDI file (`.mid`, `.midi`). Converted externally.
    Midi,
}

impl ScoreFormat {
    /// All extensions accepted as input, lower-case without dot.
    pub const EXTENSIONS: [&'static str; 7] =
        ["xml", "musicxml", "mxl", "mscz", "mscx", "mid", "midi"];

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "xml" | "musicxml" => Some(ScoreFormat::MusicXml),
            "mxl" => Some(ScoreFormat::CompressedMusicXml),
            "mscz" | "mscx" => Some(ScoreFormat::MuseScore),
            "mid" | "midi" => Some(ScoreFormat::Midi),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Self::from_extension(extension).ok_or_else(|| Error::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: extension.to_string(),
        })
    }

    /// Whether loading needs an external converter.
    pub fn needs_conversion(&self) -> bool {
        matches!(self, ScoreFormat::MuseScore | ScoreFormat::Midi)
    }
}

impl fmt::Display for ScoreFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ScoreFormat::MusicXml => "MusicXML",
            ScoreFormat::CompressedMusicXml => "compressed MusicXML",
            ScoreFormat::MuseScore => "MuseScore",
            ScoreFormat::Midi => "MIDI",
        })
    }
}
