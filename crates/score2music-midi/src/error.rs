//! Errors raised while writing per-instrument MIDI files or reading them back.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The score can't be expressed as a Standard MIDI File.
    #[error("cannot emit MIDI: {0}")]
    Emission(String),

    #[error("malformed MIDI file: {0}")]
    Parse(String),

    /// SMPTE timecode division; only metrical timing is read.
    #[error("SMPTE-timed MIDI files are not supported")]
    UnsupportedTiming,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<midly::Error> for Error {
    fn from(e: midly::Error) -> Self {
        Error::Parse(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
