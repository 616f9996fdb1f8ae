//! # score2music export
//!
//! Final stage of the pipeline:
//! - **Mixing**: sum per-instrument renders, peak-normalize on overflow
//! - **Encoding**: WAV intermediate handed to an [`Encoder`] (ffmpeg by default)
//! - **Output**: temp file beside the destination, renamed on success
//!
//! ```ignore
//! let mixed = mix(buffers, OutputFormat::from_path(&out)?)?;
//! write_output(&mixed, &out, &Ffmpeg::new(), scratch.path())?;
//! ```

pub mod error;
mod options;

pub mod dsp;
pub mod encoder;
pub mod format;
pub mod mix;
pub mod output;

pub use encoder::{Encoder, Ffmpeg, DEFAULT_BITRATE_KBPS};
pub use error::{ExportError, Result};
pub use mix::{mix, MixedAudio, FULL_SCALE};
pub use options::{BitDepth, OutputFormat};
pub use output::write_output;
