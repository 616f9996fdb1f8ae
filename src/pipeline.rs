//! The render pipeline: score file in, encoded audio out.
//!
//! ```text
//! load_score ─► split_for_instruments ─► emit_midi ─┬─► synthesize ─┐
//!                                                   ├─► synthesize ─┼─► mix ─► write_output
//!                                                   └─► synthesize ─┘
//! ```
//!
//! Emission and synthesis run per instrument on the pipeline's rayon pool.
//! Mixing waits for every track. Track order always follows the request,
//! whatever order the workers finish in.

use crate::builder::PipelineBuilder;
use crate::error::{Error, Result};
use rayon::prelude::*;
use score2music_core::{
    load_score, split_for_instruments, InstrumentAssignment, InstrumentRequest, InstrumentScore,
    PcmBuffer, Program, RenderConfig, Score, ScoreConverter,
};
use score2music_export::{mix, write_output, Encoder, OutputFormat};
use score2music_midi::{emit_midi, ParsedMidiFile};
use score2music_synth::{SoundFontSystem, SynthJob, Synthesizer};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// A configured renderer. Reusable across any number of renders.
pub struct Pipeline {
    pub(crate) config: RenderConfig,
    pub(crate) converter: Box<dyn ScoreConverter>,
    pub(crate) synthesizer: Box<dyn Synthesizer>,
    pub(crate) encoder: Box<dyn Encoder>,
    pub(crate) soundfonts: Arc<SoundFontSystem>,
    pub(crate) pool: rayon::ThreadPool,
}

/// Everything decided before synthesis: the loaded score, who plays what,
/// and the MIDI each instrument will be rendered from.
#[derive(Debug, Clone, Serialize)]
pub struct RenderPlan {
    pub score: ScoreSummary,
    pub request: Vec<Program>,
    pub assignments: Vec<InstrumentAssignment>,
    pub tracks: Vec<RenderedTrack>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoreSummary {
    pub title: Option<String>,
    pub parts: Vec<PartSummary>,
    pub duration_beats: f64,
    pub duration_seconds: f64,
    pub initial_bpm: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PartSummary {
    pub index: usize,
    pub name: Option<String>,
    /// Program named by the source file, if any.
    pub instrument_hint: Option<Program>,
    pub notes: usize,
    pub duration_beats: f64,
}

/// One instrument's track. Holds its PCM once synthesized.
#[derive(Debug, Clone, Serialize)]
pub struct RenderedTrack {
    pub position: usize,
    pub program: Program,
    pub instrument: &'static str,
    pub parts: Vec<usize>,
    /// Note-ons in the emitted file.
    pub note_count: usize,
    pub midi_bytes: usize,
    #[serde(skip)]
    pub midi: Vec<u8>,
    #[serde(skip)]
    pub pcm: Option<PcmBuffer>,
}

impl RenderedTrack {
    pub fn label(&self) -> String {
        format!("track {} (program {})", self.position, self.program)
    }
}

/// Outcome of a finished render.
#[derive(Debug, Clone)]
pub struct RenderReport {
    pub output: PathBuf,
    pub format: OutputFormat,
    pub tracks: usize,
    /// Normalization gain applied to the mix (1.0 if none).
    pub gain: f32,
    pub duration_seconds: f64,
    pub elapsed: Duration,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::default()
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// SoundFont cache shared with the built-in renderer.
    pub fn soundfonts(&self) -> &Arc<SoundFontSystem> {
        &self.soundfonts
    }

    /// Normalize `path` into a [`Score`], converting it first if needed.
    pub fn load(&self, path: &Path) -> Result<Score> {
        Ok(load_score(path, self.converter.as_ref(), &self.config)?)
    }

    /// Load `path` and prepare it without synthesizing anything.
    pub fn plan(&self, path: &Path, request: &InstrumentRequest) -> Result<RenderPlan> {
        let score = self.load(path)?;
        self.prepare(&score, request)
    }

    /// Assign parts and emit one MIDI file per requested instrument.
    pub fn prepare(&self, score: &Score, request: &InstrumentRequest) -> Result<RenderPlan> {
        let instruments = split_for_instruments(score, request)?;
        let assignments = instruments
            .iter()
            .map(|i| InstrumentAssignment {
                position: i.position,
                program: i.program,
                parts: i.source_parts.clone(),
            })
            .collect();

        let tracks = self.pool.install(|| {
            instruments
                .par_iter()
                .map(emit_track)
                .collect::<Result<Vec<_>>>()
        })?;

        info!(
            parts = score.part_count(),
            instruments = request.len(),
            "prepared render plan"
        );

        Ok(RenderPlan {
            score: summarize(score),
            request: request.programs().to_vec(),
            assignments,
            tracks,
        })
    }

    /// Render `score` with `soundfont` into `output`.
    ///
    /// The output format is checked before anything is read, and `output` is
    /// only replaced once the encoded file is complete.
    pub fn render(
        &self,
        score: &Path,
        soundfont: &Path,
        request: &InstrumentRequest,
        output: &Path,
    ) -> Result<RenderReport> {
        let started = Instant::now();
        let format = OutputFormat::from_path(output)?;

        if self.config.verify_presets {
            self.soundfonts
                .verify_programs(soundfont, request.programs())?;
        }

        let loaded = self.load(score)?;
        let scratch = self.config.scratch()?;
        debug!(scratch = %scratch.path().display(), "created scratch directory");

        let mut plan = self.prepare(&loaded, request)?;

        info!(
            synthesizer = self.synthesizer.name(),
            tracks = plan.tracks.len(),
            sample_rate = self.config.sample_rate,
            "synthesizing"
        );
        let sample_rate = self.config.sample_rate;
        self.pool.install(|| {
            plan.tracks.par_iter_mut().try_for_each(|track| {
                let pcm = self.synthesize_track(track, soundfont, scratch.path(), sample_rate)?;
                track.pcm = Some(pcm);
                Ok::<(), Error>(())
            })
        })?;

        let buffers: Vec<PcmBuffer> = plan
            .tracks
            .iter_mut()
            .filter_map(|t| t.pcm.take())
            .collect();
        let mixed = mix(buffers, format)?;
        let duration_seconds = mixed.audio.duration_seconds();

        write_output(&mixed, output, self.encoder.as_ref(), scratch.path())?;

        let report = RenderReport {
            output: output.to_path_buf(),
            format,
            tracks: plan.tracks.len(),
            gain: mixed.gain,
            duration_seconds,
            elapsed: started.elapsed(),
        };
        info!(
            output = %report.output.display(),
            %format,
            tracks = report.tracks,
            seconds = report.duration_seconds,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "render complete"
        );
        Ok(report)
    }

    fn synthesize_track(
        &self,
        track: &RenderedTrack,
        soundfont: &Path,
        scratch: &Path,
        sample_rate: u32,
    ) -> Result<PcmBuffer> {
        let dir = scratch.join(format!("track-{}", track.position));
        std::fs::create_dir_all(&dir)?;
        let midi = dir.join("track.mid");
        std::fs::write(&midi, &track.midi)?;

        let job = SynthJob {
            label: track.label(),
            midi,
            soundfont: soundfont.to_path_buf(),
            scratch_dir: dir,
            sample_rate,
        };
        let pcm = self.synthesizer.synthesize(&job)?;
        debug!(
            track = track.position,
            frames = pcm.frames(),
            peak = pcm.peak(),
            "synthesized"
        );
        Ok(pcm)
    }
}

fn emit_track(instrument: &InstrumentScore) -> Result<RenderedTrack> {
    let midi = emit_midi(instrument)?;
    let parsed = ParsedMidiFile::parse(&midi)?;

    Ok(RenderedTrack {
        position: instrument.position,
        program: instrument.program,
        instrument: instrument.program.gm_name(),
        parts: instrument.source_parts.clone(),
        note_count: parsed.note_count(),
        midi_bytes: midi.len(),
        midi,
        pcm: None,
    })
}

fn summarize(score: &Score) -> ScoreSummary {
    let parts = score
        .parts()
        .iter()
        .enumerate()
        .map(|(index, part)| PartSummary {
            index,
            name: part.name.clone(),
            instrument_hint: part.instrument_hint,
            notes: part.note_count(),
            duration_beats: part.duration(),
        })
        .collect();

    ScoreSummary {
        title: score.title.clone(),
        parts,
        duration_beats: score.duration(),
        duration_seconds: score.duration_seconds(),
        initial_bpm: score.tempos().first().map_or(0.0, |t| t.bpm),
    }
}
