//! Error types for score2music-synth.

use score2music_core::ToolError;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for score2music-synth operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while rendering MIDI to PCM.
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (file operations).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The synthesizer failed or produced no audio.
    #[error("Synthesis failed: {0}")]
    Synthesis(String),

    /// SoundFont missing, unreadable or malformed.
    #[error("SoundFont error: {0}")]
    SoundFont(String),

    /// The SoundFont has no bank 0 preset for a requested program.
    #[error("SoundFont {} has no preset for program {program} ({name})", soundfont.display())]
    PresetUnavailable {
        program: u8,
        name: &'static str,
        soundfont: PathBuf,
    },

    #[error("{tool} did not finish within {}s", timeout.as_secs())]
    ExternalToolTimeout { tool: String, timeout: Duration },
}

impl Error {
    /// Map a failed synthesizer process; `label` names the track.
    pub(crate) fn from_tool(label: &str, err: ToolError) -> Self {
        match err {
            ToolError::Timeout { tool, timeout } => Error::ExternalToolTimeout { tool, timeout },
            other => Error::Synthesis(format!("{}: {}", label, other)),
        }
    }
}
