//! DSP utilities for the final mix.

pub mod loudness;

pub use loudness::{gain_to_db, normalize_peak};
