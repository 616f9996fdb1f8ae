//! Output format and encoding options.

use crate::error::{ExportError, Result};
use std::fmt;
use std::path::Path;

/// Compressed output format, chosen by the destination extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputFormat {
    /// MPEG-1 Layer III (`.mp3`).
    Mp3,
    /// AAC in an MP4 container (`.m4a`).
    M4a,
    /// Raw AAC in ADTS framing (`.aac`).
    Aac,
}

impl OutputFormat {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "mp3" => Some(OutputFormat::Mp3),
            "m4a" => Some(OutputFormat::M4a),
            "aac" => Some(OutputFormat::Aac),
            _ => None,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Self::from_extension(extension).ok_or_else(|| {
            ExportError::Encoding(format!(
                "unsupported output extension '{}' for {} (use .mp3, .m4a or .aac)",
                extension,
                path.display()
            ))
        })
    }

    /// File extension (without dot).
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Mp3 => "mp3",
            OutputFormat::M4a => "m4a",
            OutputFormat::Aac => "aac",
        }
    }

    /// ffmpeg audio codec.
    pub fn codec(&self) -> &'static str {
        match self {
            OutputFormat::Mp3 => "libmp3lame",
            OutputFormat::M4a | OutputFormat::Aac => "aac",
        }
    }

    /// ffmpeg muxer.
    pub fn muxer(&self) -> &'static str {
        match self {
            OutputFormat::Mp3 => "mp3",
            OutputFormat::M4a => "ipod",
            OutputFormat::Aac => "adts",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Mp3 => "MP3",
            OutputFormat::M4a => "AAC (MP4)",
            OutputFormat::Aac => "AAC (ADTS)",
        })
    }
}

/// Bit depth of the WAV intermediate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitDepth {
    #[default]
    Int16,
    Int24,
    Float32,
}

impl BitDepth {
    /// Bits per sample.
    pub fn bits(&self) -> u16 {
        match self {
            BitDepth::Int16 => 16,
            BitDepth::Int24 => 24,
            BitDepth::Float32 => 32,
        }
    }
}
