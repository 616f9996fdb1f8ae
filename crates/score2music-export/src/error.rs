//! Error types for score2music-export

use score2music_core::ToolError;
use std::io;
use std::time::Duration;
use thiserror::Error;

/// Export error type
#[derive(Error, Debug)]
pub enum ExportError {
    /// I/O error during file operations
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Buffers to mix disagree on sample rate or channel count
    #[error("Format mismatch: {0}")]
    FormatMismatch(String),

    /// Unsupported output format or encoder failure
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Invalid audio data
    #[error("Invalid audio data: {0}")]
    InvalidData(String),

    #[error("{tool} did not finish within {}s", timeout.as_secs())]
    ExternalToolTimeout { tool: String, timeout: Duration },
}

impl ExportError {
    pub(crate) fn from_tool(err: ToolError) -> Self {
        match err {
            ToolError::Timeout { tool, timeout } => {
                ExportError::ExternalToolTimeout { tool, timeout }
            }
            other => ExportError::Encoding(other.to_string()),
        }
    }
}

/// Result type for export operations
pub type Result<T> = std::result::Result<T, ExportError>;

impl From<hound::Error> for ExportError {
    fn from(e: hound::Error) -> Self {
        match e {
            hound::Error::IoError(io) => ExportError::Io(io),
            other => ExportError::InvalidData(other.to_string()),
        }
    }
}
