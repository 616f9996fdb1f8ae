//! The synthesis capability shared by every backend.

use crate::error::Result;
use score2music_core::PcmBuffer;
use std::path::PathBuf;

/// One MIDI file to render.
#[derive(Debug, Clone)]
pub struct SynthJob {
    /// Track label for logs and errors, e.g. `track 1 (program 40)`.
    pub label: String,
    pub midi: PathBuf,
    pub soundfont: PathBuf,
    /// Private directory for this job's intermediate files.
    pub scratch_dir: PathBuf,
    pub sample_rate: u32,
}

/// Renders a MIDI file to PCM against a SoundFont.
///
/// Jobs are independent, so implementations are called from several threads
/// at once.
pub trait Synthesizer: Send + Sync {
    fn name(&self) -> &str;

    fn synthesize(&self, job: &SynthJob) -> Result<PcmBuffer>;
}
