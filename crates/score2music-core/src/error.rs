//! Error types for score2music-core.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use crate::tool::ToolError;

/// Error type for score loading, assignment and tool invocation.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported score format '{extension}' ({path})")]
    UnsupportedFormat { path: PathBuf, extension: String },

    #[error("Conversion of {path} failed: {reason}")]
    Conversion { path: PathBuf, reason: String },

    #[error("Parse error in {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Score has no parts")]
    EmptyScore,

    #[error("Invalid MIDI program '{0}'. Must be an integer between 0 and 127")]
    InvalidProgram(String),

    #[error("Instrument request is empty")]
    EmptyRequest,

    #[error("{tool} did not finish within {}s", timeout.as_secs())]
    ExternalToolTimeout { tool: String, timeout: Duration },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Invalid PCM data: {0}")]
    Pcm(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::Parse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Map a tool failure raised while converting `path`.
    pub(crate) fn from_conversion(path: impl Into<PathBuf>, err: ToolError) -> Self {
        match err {
            ToolError::Timeout { tool, timeout } => Error::ExternalToolTimeout { tool, timeout },
            other => Error::Conversion {
                path: path.into(),
                reason: other.to_string(),
            },
        }
    }
}

impl From<hound::Error> for Error {
    fn from(e: hound::Error) -> Self {
        match e {
            hound::Error::IoError(io) => Error::Io(io),
            other => Error::Pcm(other.to_string()),
        }
    }
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
