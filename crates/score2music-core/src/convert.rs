//! External score conversion (MuseScore and MIDI sources to MusicXML).

use crate::error::{Error, Result};
use crate::tool::{resolve_program, ExternalTool, DEFAULT_TOOL_TIMEOUT};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Converts a score file into uncompressed MusicXML.
pub trait ScoreConverter: Send + Sync {
    /// Human-readable converter name for logs.
    fn name(&self) -> &str;

    /// Write MusicXML for `input` to `output`.
    fn convert(&self, input: &Path, output: &Path) -> Result<()>;
}

/// Executable names tried on `PATH`, then well-known install locations.
const MUSESCORE_CANDIDATES: &[&str] = &[
    "mscore",
    "mscore4",
    "musescore",
    "MuseScore4",
    "MuseScore",
    "/Applications/MuseScore 4.app/Contents/MacOS/mscore",
    "/Applications/MuseScore 3.app/Contents/MacOS/mscore",
    r"C:\Program Files\MuseScore 4\bin\MuseScore4.exe",
    r"C:\Program Files\MuseScore 3\bin\MuseScore3.exe",
];

/// MuseScore command-line converter (`mscore -o out.musicxml in`).
#[derive(Debug, Clone)]
pub struct MuseScoreConverter {
    program: Option<PathBuf>,
    timeout: Duration,
}

impl Default for MuseScoreConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl MuseScoreConverter {
    /// Converter that searches for MuseScore on first use.
    pub fn new() -> Self {
        Self {
            program: None,
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Use this executable instead of searching.
    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = Some(program.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn resolve(&self, input: &Path) -> Result<PathBuf> {
        if let Some(program) = &self.program {
            return Ok(program.clone());
        }
        resolve_program(MUSESCORE_CANDIDATES).ok_or_else(|| Error::Conversion {
            path: input.to_path_buf(),
            reason: "MuseScore executable not found; install MuseScore or pass --mscore".into(),
        })
    }
}

impl ScoreConverter for MuseScoreConverter {
    fn name(&self) -> &str {
        "MuseScore"
    }

    fn convert(&self, input: &Path, output: &Path) -> Result<()> {
        let program = self.resolve(input)?;
        info!(input = %input.display(), program = %program.display(), "converting score");

        let run = ExternalTool::new(self.name(), program)
            .arg("-o")
            .arg(output)
            .arg(input)
            // headless Linux has no display for the Qt UI
            .env("QT_QPA_PLATFORM", "offscreen")
            .timeout(self.timeout)
            .run()
            .map_err(|e| Error::from_conversion(input, e))?;
        debug!(elapsed_ms = run.elapsed.as_millis() as u64, "conversion finished");

        let written = std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(Error::Conversion {
                path: input.to_path_buf(),
                reason: format!("{} produced no output", self.name()),
            });
        }
        Ok(())
    }
}
