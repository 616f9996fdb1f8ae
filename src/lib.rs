//! # score2music - score files to rendered audio
//!
//! Renders MusicXML, compressed MusicXML, MuseScore and MIDI scores to
//! MP3/AAC through a SoundFont, with one or more General MIDI instruments.
//!
//! ## Architecture
//!
//! score2music is an umbrella crate that coordinates:
//! - **score2music-core** - Score model, format normalization, instrument assignment
//! - **score2music-midi** - Standard MIDI File emission and inspection
//! - **score2music-synth** - SoundFont synthesis (FluidSynth or in-process RustySynth)
//! - **score2music-export** - Mixdown, normalization, encoding and atomic output
//!
//! ## Quick Start
//!
//! ```ignore
//! use score2music::prelude::*;
//!
//! let pipeline = Pipeline::builder().build()?;
//! let request: InstrumentRequest = "40,41".parse()?;
//!
//! let report = pipeline.render(
//!     Path::new("duet.musicxml"),
//!     Path::new("FluidR3_GM.sf2"),
//!     &request,
//!     Path::new("duet.mp3"),
//! )?;
//! println!("{} tracks, {:.1}s", report.tracks, report.duration_seconds);
//! ```

mod builder;
mod error;
mod pipeline;

pub use builder::PipelineBuilder;
pub use error::{Error, ErrorKind, Result};
pub use pipeline::{PartSummary, Pipeline, RenderPlan, RenderReport, RenderedTrack, ScoreSummary};

/// Re-export of score2music-core for direct access
pub use score2music_core as core;
/// Re-export of score2music-export for direct access
pub use score2music_export as export;
/// Re-export of score2music-midi for direct access
pub use score2music_midi as midi;
/// Re-export of score2music-synth for direct access
pub use score2music_synth as synth;

pub use score2music_core::{
    InstrumentAssignment, InstrumentRequest, MuseScoreConverter, Program, RenderConfig, Score,
    ScoreConverter, ScoreFormat, GM_PROGRAM_NAMES,
};
pub use score2music_export::{Encoder, Ffmpeg, OutputFormat};
pub use score2music_synth::{FluidSynth, SoundFontRenderer, SoundFontSystem, Synthesizer};

pub mod prelude {
    pub use crate::{
        Encoder, Error, ErrorKind, InstrumentRequest, OutputFormat, Pipeline, PipelineBuilder,
        Program, RenderConfig, RenderPlan, RenderReport, Result, ScoreConverter, Synthesizer,
    };
    pub use std::path::Path;
}
