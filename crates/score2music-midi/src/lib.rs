//! MIDI stage of score2music.
//!
//! [`emit_midi`] turns one [`InstrumentScore`](score2music_core::InstrumentScore)
//! into a format 0 Standard MIDI File; [`ParsedMidiFile`] reads such files back
//! for inspection.

pub mod emit;
pub mod error;
pub mod file;

pub use emit::{emit_midi, write_midi, MIDI_CHANNEL, TICKS_PER_QUARTER};
pub use error::{Error, Result};
pub use file::{MidiEventType, ParsedMidiFile, TimedMidiEvent};
