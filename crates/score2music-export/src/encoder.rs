//! Compressed-audio encoding.

use crate::error::{ExportError, Result};
use crate::options::OutputFormat;
use score2music_core::{ExternalTool, DEFAULT_TOOL_TIMEOUT};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Default bitrate for lossy output, kbit/s.
pub const DEFAULT_BITRATE_KBPS: u32 = 192;

/// Encodes a WAV file into a compressed format.
pub trait Encoder: Send + Sync {
    fn name(&self) -> &str;

    /// Read `wav` and write `format` audio to `output`, overwriting it.
    fn encode(&self, wav: &Path, output: &Path, format: OutputFormat) -> Result<()>;
}

/// Encodes through the `ffmpeg` executable.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    program: PathBuf,
    bitrate_kbps: u32,
    timeout: Duration,
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new()
    }
}

impl Ffmpeg {
    /// Use `ffmpeg` from `PATH`.
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            bitrate_kbps: DEFAULT_BITRATE_KBPS,
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn bitrate(mut self, kbps: u32) -> Self {
        self.bitrate_kbps = kbps;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, wav: &Path, output: &Path, format: OutputFormat) -> ExternalTool {
        ExternalTool::new(self.name(), &self.program)
            .args(["-y", "-loglevel", "error", "-i"])
            .arg(wav)
            .args(["-c:a", format.codec()])
            .arg("-b:a")
            .arg(format!("{}k", self.bitrate_kbps))
            .args(["-f", format.muxer()])
            .arg(output)
            .timeout(self.timeout)
    }
}

impl Encoder for Ffmpeg {
    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn encode(&self, wav: &Path, output: &Path, format: OutputFormat) -> Result<()> {
        info!(%format, bitrate_kbps = self.bitrate_kbps, "encoding");
        self.command(wav, output, format)
            .run()
            .map_err(ExportError::from_tool)?;
        Ok(())
    }
}
