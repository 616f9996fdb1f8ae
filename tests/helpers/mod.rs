//! Test helpers and fixtures for score2music integration tests.
//!
//! The fakes stand in for MuseScore, FluidSynth and ffmpeg so the whole
//! pipeline runs without external binaries:
//! - [`FixtureConverter`] writes a canned MusicXML document
//! - [`FakeSynth`] turns each MIDI file into a constant-level stereo buffer
//!   and records what it was asked to render
//! - [`WavCopyEncoder`] copies the WAV intermediate to the output unchanged,
//!   so tests can read the final mix back with `hound`

#![allow(dead_code)]

use score2music::core::{PcmBuffer, Program};
use score2music::export::{ExportError, OutputFormat};
use score2music::midi::ParsedMidiFile;
use score2music::synth::{Error as SynthError, SynthJob};
use score2music::{Encoder, ScoreConverter, Synthesizer};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Tolerance for samples that went through the 16-bit WAV intermediate.
pub const PCM16_EPSILON: f32 = 1.0 / 8192.0;

pub const TEST_SAMPLE_RATE: u32 = 22050;

/// Sample value every [`FakeSynth`] track is filled with.
pub const FAKE_LEVEL: f32 = 0.6;

/// Frames rendered per beat by [`FakeSynth`].
pub const FAKE_FRAMES_PER_BEAT: usize = 100;

pub const SOLO: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<score-partwise version="4.0">
  <part-list><score-part id="P1"><part-name>Piano</part-name></score-part></part-list>
  <part id="P1">
    <measure number="1">
      <attributes><divisions>2</divisions></attributes>
      <note><pitch><step>C</step><octave>4</octave></pitch><duration>2</duration></note>
      <note><pitch><step>E</step><octave>4</octave></pitch><duration>2</duration></note>
      <note><pitch><step>G</step><octave>4</octave></pitch><duration>4</duration></note>
    </measure>
  </part>
</score-partwise>"#;

pub const DUET: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<score-partwise version="4.0">
  <work><work-title>Duet</work-title></work>
  <part-list>
    <score-part id="P1"><part-name>Soprano</part-name></score-part>
    <score-part id="P2"><part-name>Bass</part-name></score-part>
  </part-list>
  <part id="P1">
    <measure number="1">
      <attributes><divisions>1</divisions></attributes>
      <direction><sound tempo="90"/></direction>
      <note><pitch><step>E</step><octave>5</octave></pitch><duration>2</duration></note>
      <note><pitch><step>D</step><octave>5</octave></pitch><duration>2</duration></note>
    </measure>
  </part>
  <part id="P2">
    <measure number="1">
      <attributes><divisions>1</divisions></attributes>
      <note><pitch><step>C</step><octave>3</octave></pitch><duration>4</duration></note>
    </measure>
  </part>
</score-partwise>"#;

/// Write `content` to `dir/name` and return the path.
pub fn write_file(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

// ---------------------------------------------------------------------------
// Converter
// ---------------------------------------------------------------------------

/// Writes `musicxml` for any input and counts calls.
pub struct FixtureConverter {
    musicxml: String,
    calls: Arc<AtomicUsize>,
}

impl FixtureConverter {
    pub fn new(musicxml: &str) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let converter = Self {
            musicxml: musicxml.to_string(),
            calls: calls.clone(),
        };
        (converter, calls)
    }
}

impl ScoreConverter for FixtureConverter {
    fn name(&self) -> &str {
        "fixture"
    }

    fn convert(&self, _input: &Path, output: &Path) -> score2music::core::Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::fs::write(output, &self.musicxml)?;
        Ok(())
    }
}

/// For tests that only feed MusicXML.
pub struct NoConverter;

impl ScoreConverter for NoConverter {
    fn name(&self) -> &str {
        "none"
    }

    fn convert(&self, input: &Path, _output: &Path) -> score2music::core::Result<()> {
        panic!("unexpected conversion of {}", input.display());
    }
}

// ---------------------------------------------------------------------------
// Synthesizer
// ---------------------------------------------------------------------------

/// What [`FakeSynth`] saw for one job.
#[derive(Debug, Clone)]
pub struct SynthCall {
    pub label: String,
    pub programs: Vec<u8>,
    pub note_count: usize,
    pub velocities: Vec<u8>,
    pub midi_existed: bool,
}

/// Renders [`FAKE_LEVEL`] for the MIDI file's length.
#[derive(Clone, Default)]
pub struct FakeSynth {
    calls: Arc<Mutex<Vec<SynthCall>>>,
}

impl FakeSynth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls sorted by label; workers finish in any order.
    pub fn calls(&self) -> Vec<SynthCall> {
        let mut calls = self.calls.lock().unwrap().clone();
        calls.sort_by(|a, b| a.label.cmp(&b.label));
        calls
    }
}

impl Synthesizer for FakeSynth {
    fn name(&self) -> &str {
        "fake"
    }

    fn synthesize(&self, job: &SynthJob) -> score2music::synth::Result<PcmBuffer> {
        let midi = ParsedMidiFile::load(&job.midi)
            .map_err(|e| SynthError::Synthesis(e.to_string()))?;

        let velocities = midi
            .events
            .iter()
            .filter_map(|e| match e.event {
                score2music::midi::MidiEventType::NoteOn { velocity, .. } => Some(velocity),
                _ => None,
            })
            .collect();

        self.calls.lock().unwrap().push(SynthCall {
            label: job.label.clone(),
            programs: midi.programs(),
            note_count: midi.note_count(),
            velocities,
            midi_existed: job.midi.is_file(),
        });

        let frames = (midi.duration_beats * FAKE_FRAMES_PER_BEAT as f64).ceil() as usize;
        Ok(PcmBuffer::new(
            job.sample_rate,
            2,
            vec![FAKE_LEVEL; frames * 2],
        ))
    }
}

/// Fails every job.
pub struct FailingSynth;

impl Synthesizer for FailingSynth {
    fn name(&self) -> &str {
        "failing"
    }

    fn synthesize(&self, job: &SynthJob) -> score2music::synth::Result<PcmBuffer> {
        Err(SynthError::Synthesis(format!("{}: exit status 1", job.label)))
    }
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

/// Copies the WAV intermediate to the output and records the format.
#[derive(Clone, Default)]
pub struct WavCopyEncoder {
    formats: Arc<Mutex<Vec<OutputFormat>>>,
}

impl WavCopyEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn formats(&self) -> Vec<OutputFormat> {
        self.formats.lock().unwrap().clone()
    }
}

impl Encoder for WavCopyEncoder {
    fn name(&self) -> &str {
        "wav-copy"
    }

    fn encode(
        &self,
        wav: &Path,
        output: &Path,
        format: OutputFormat,
    ) -> score2music::export::Result<()> {
        self.formats.lock().unwrap().push(format);
        std::fs::copy(wav, output).map_err(ExportError::Io)?;
        Ok(())
    }
}

/// Read an output written by [`WavCopyEncoder`] as float samples.
pub fn read_output(path: &Path) -> (hound::WavSpec, Vec<f32>) {
    let reader = hound::WavReader::open(path).unwrap();
    let spec = reader.spec();
    let samples = reader
        .into_samples::<i16>()
        .map(|s| s.unwrap() as f32 / 32768.0)
        .collect();
    (spec, samples)
}

pub fn program(number: u32) -> Program {
    Program::new(number).unwrap()
}
