//! Synthesis stage of score2music: MIDI plus SoundFont to PCM.
//!
//! - **[`FluidSynth`]** - renders through the `fluidsynth` executable (default)
//! - **[`SoundFontRenderer`]** - renders in-process with RustySynth
//! - **[`SoundFontSystem`]** - shared SoundFont cache and preset lookup
//!
//! Both backends implement [`Synthesizer`] and return interleaved stereo
//! [`PcmBuffer`](score2music_core::PcmBuffer)s at the job's sample rate.

pub mod error;
pub use error::{Error, Result};

mod fluidsynth;
mod soundfont;
mod synthesizer;

pub use fluidsynth::{FluidSynth, DEFAULT_GAIN};
pub use soundfont::{
    probe_soundfont, PresetInfo, SoundFontRenderer, SoundFontSystem, SUPPORTED_SAMPLE_RATES,
};
pub use synthesizer::{SynthJob, Synthesizer};
