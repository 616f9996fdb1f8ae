//! In-process rendering with RustySynth's MIDI file sequencer.

use super::manager::SoundFontSystem;
use crate::error::{Error, Result};
use crate::synthesizer::{SynthJob, Synthesizer};
use rustysynth::{MidiFile, MidiFileSequencer, SynthesizerSettings};
use score2music_core::PcmBuffer;
use std::fs::File;
use std::io::BufReader;
use std::ops::RangeInclusive;
use std::sync::Arc;
use tracing::{debug, info};

/// Seconds rendered past the last MIDI event so releases can ring out.
pub const DEFAULT_RELEASE_TAIL: f64 = 1.5;

/// Sample rates RustySynth accepts.
pub const SUPPORTED_SAMPLE_RATES: RangeInclusive<u32> = 16000..=192000;

/// Renders MIDI without an external process.
pub struct SoundFontRenderer {
    soundfonts: Arc<SoundFontSystem>,
    release_tail: f64,
}

impl SoundFontRenderer {
    pub fn new(soundfonts: Arc<SoundFontSystem>) -> Self {
        Self {
            soundfonts,
            release_tail: DEFAULT_RELEASE_TAIL,
        }
    }

    pub fn release_tail(mut self, seconds: f64) -> Self {
        self.release_tail = seconds.max(0.0);
        self
    }
}

impl Synthesizer for SoundFontRenderer {
    fn name(&self) -> &str {
        "RustySynth"
    }

    fn synthesize(&self, job: &SynthJob) -> Result<PcmBuffer> {
        let soundfont = self.soundfonts.load(&job.soundfont)?;

        let settings = SynthesizerSettings::new(job.sample_rate as i32);
        let synthesizer = rustysynth::Synthesizer::new(&soundfont, &settings)
            .map_err(|e| Error::Synthesis(format!("{}: {}", job.label, e)))?;

        let mut reader = BufReader::new(File::open(&job.midi)?);
        let midi = Arc::new(
            MidiFile::new(&mut reader)
                .map_err(|e| Error::Synthesis(format!("{}: bad MIDI input: {}", job.label, e)))?,
        );

        let seconds = midi.get_length() + self.release_tail;
        let frames = (seconds * job.sample_rate as f64).ceil() as usize;
        info!(track = %job.label, seconds, "synthesizing with RustySynth");

        let mut sequencer = MidiFileSequencer::new(synthesizer);
        sequencer.play(&midi, false);

        let mut left = vec![0.0f32; frames];
        let mut right = vec![0.0f32; frames];
        sequencer.render(&mut left, &mut right);

        let pcm = PcmBuffer::from_stereo(job.sample_rate, &left, &right);
        if pcm.is_empty() {
            return Err(Error::Synthesis(format!("{}: rendered no audio", job.label)));
        }
        debug!(track = %job.label, frames = pcm.frames(), peak = pcm.peak(), "rendered");
        Ok(pcm)
    }
}
