//! Centralized error type for the score2music umbrella crate.
//!
//! Wraps all stage errors so `?` propagates naturally across crate boundaries,
//! and maps each of them onto the [`ErrorKind`] taxonomy the CLI reports.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] score2music_core::Error),

    #[error("MIDI: {0}")]
    Midi(#[from] score2music_midi::Error),

    #[error("Synth: {0}")]
    Synth(#[from] score2music_synth::Error),

    #[error("Export: {0}")]
    Export(#[from] score2music_export::ExportError),

    #[error("Worker pool: {0}")]
    ThreadPool(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure class of a render, one per CLI exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnsupportedFormat,
    Conversion,
    Parse,
    EmptyScore,
    InvalidProgram,
    Emission,
    Synthesis,
    SoundFont,
    FormatMismatch,
    Encoding,
    ExternalToolTimeout,
    /// Rejected settings (sample rate, jobs, velocity).
    Config,
    Io,
}

impl ErrorKind {
    /// Process exit status for this kind. 2 is shared with clap's usage errors.
    pub fn exit_code(self) -> u8 {
        match self {
            ErrorKind::UnsupportedFormat => 10,
            ErrorKind::Conversion => 11,
            ErrorKind::Parse => 12,
            ErrorKind::EmptyScore => 13,
            ErrorKind::InvalidProgram => 14,
            ErrorKind::Emission => 15,
            ErrorKind::Synthesis => 16,
            ErrorKind::SoundFont => 17,
            ErrorKind::FormatMismatch => 18,
            ErrorKind::Encoding => 19,
            ErrorKind::ExternalToolTimeout => 20,
            ErrorKind::Config => 2,
            ErrorKind::Io => 1,
        }
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        use score2music_core::Error as C;
        use score2music_export::ExportError as E;
        use score2music_midi::Error as M;
        use score2music_synth::Error as S;

        match self {
            Error::Core(e) => match e {
                C::UnsupportedFormat { .. } => ErrorKind::UnsupportedFormat,
                C::Conversion { .. } => ErrorKind::Conversion,
                C::Parse { .. } => ErrorKind::Parse,
                C::EmptyScore => ErrorKind::EmptyScore,
                C::InvalidProgram(_) | C::EmptyRequest => ErrorKind::InvalidProgram,
                C::ExternalToolTimeout { .. } => ErrorKind::ExternalToolTimeout,
                C::InvalidConfig(_) => ErrorKind::Config,
                // Only raised reading a synthesizer's WAV back.
                C::Pcm(_) => ErrorKind::Synthesis,
                C::Io(_) => ErrorKind::Io,
            },
            Error::Midi(e) => match e {
                M::Emission(_) | M::Parse(_) | M::UnsupportedTiming => {
                    ErrorKind::Emission
                }
                M::Io(_) => ErrorKind::Io,
            },
            Error::Synth(e) => match e {
                S::Synthesis(_) => ErrorKind::Synthesis,
                S::SoundFont(_) | S::PresetUnavailable { .. } => ErrorKind::SoundFont,
                S::ExternalToolTimeout { .. } => ErrorKind::ExternalToolTimeout,
                S::Io(_) => ErrorKind::Io,
            },
            Error::Export(e) => match e {
                E::FormatMismatch(_) => ErrorKind::FormatMismatch,
                E::Encoding(_) | E::InvalidData(_) => ErrorKind::Encoding,
                E::ExternalToolTimeout { .. } => ErrorKind::ExternalToolTimeout,
                E::Io(_) => ErrorKind::Io,
            },
            Error::ThreadPool(_) | Error::Io(_) => ErrorKind::Io,
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.kind().exit_code()
    }
}
