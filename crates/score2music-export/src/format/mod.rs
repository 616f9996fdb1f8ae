//! Intermediate file formats.

pub mod wav;

pub use wav::{encode_wav_file, encode_wav_memory, wav_spec};
