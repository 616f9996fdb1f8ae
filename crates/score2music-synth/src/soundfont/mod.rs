//! SoundFont (.sf2) inspection and in-process rendering via RustySynth.

mod manager;
mod renderer;

pub use manager::{probe_soundfont, PresetInfo, SoundFontSystem};
pub use renderer::{SoundFontRenderer, SUPPORTED_SAMPLE_RATES};
