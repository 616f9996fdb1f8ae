//! FluidSynth command-line backend.

use crate::error::{Error, Result};
use crate::soundfont::probe_soundfont;
use crate::synthesizer::{SynthJob, Synthesizer};
use score2music_core::{read_wav, ExternalTool, PcmBuffer, DEFAULT_TOOL_TIMEOUT};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// FluidSynth's own default master gain.
pub const DEFAULT_GAIN: f32 = 0.2;

/// Renders through `fluidsynth -ni -F out.wav`.
#[derive(Debug, Clone)]
pub struct FluidSynth {
    program: PathBuf,
    gain: f32,
    timeout: Duration,
}

impl Default for FluidSynth {
    fn default() -> Self {
        Self::new()
    }
}

impl FluidSynth {
    /// Use `fluidsynth` from `PATH`.
    pub fn new() -> Self {
        Self {
            program: PathBuf::from("fluidsynth"),
            gain: DEFAULT_GAIN,
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    pub fn with_program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    pub fn gain(mut self, gain: f32) -> Self {
        self.gain = gain;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Synthesizer for FluidSynth {
    fn name(&self) -> &str {
        "FluidSynth"
    }

    fn synthesize(&self, job: &SynthJob) -> Result<PcmBuffer> {
        probe_soundfont(&job.soundfont)?;

        let wav = job.scratch_dir.join("render.wav");
        info!(track = %job.label, midi = %job.midi.display(), "synthesizing with FluidSynth");

        ExternalTool::new(self.name(), &self.program)
            .args(["-ni", "-g"])
            .arg(self.gain.to_string())
            .arg("-r")
            .arg(job.sample_rate.to_string())
            .args(["-T", "wav", "-F"])
            .arg(&wav)
            .arg(&job.soundfont)
            .arg(&job.midi)
            .timeout(self.timeout)
            .run()
            .map_err(|e| Error::from_tool(&job.label, e))?;

        let written = std::fs::metadata(&wav).map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(Error::Synthesis(format!(
                "{}: FluidSynth produced no audio",
                job.label
            )));
        }

        let pcm = read_wav(&wav).map_err(|e| {
            Error::Synthesis(format!("{}: unreadable FluidSynth output: {}", job.label, e))
        })?;
        if pcm.is_empty() {
            return Err(Error::Synthesis(format!(
                "{}: FluidSynth produced no audio",
                job.label
            )));
        }

        debug!(
            track = %job.label,
            frames = pcm.frames(),
            sample_rate = pcm.sample_rate,
            "FluidSynth render read back"
        );
        Ok(pcm)
    }
}
