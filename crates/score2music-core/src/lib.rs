//! Score model, format normalization and instrument assignment.
//!
//! ```text
//! input file ──ScoreFormat──► load_score ──► Score ──split_for_instruments──► [InstrumentScore]
//!                 │
//!                 └─ .mscz/.mscx/.mid ─► ScoreConverter ─► MusicXML
//! ```
//!
//! Also hosts the pieces every later stage shares: [`RenderConfig`], the
//! [`PcmBuffer`] interchange type and the [`ExternalTool`] process runner.

pub mod assign;
pub mod config;
pub mod convert;
pub mod error;
pub mod format;
pub mod musicxml;
pub mod normalize;
pub mod pcm;
pub mod program;
pub mod score;
pub mod tool;

pub use assign::{assign_parts, split_for_instruments, InstrumentAssignment, InstrumentScore};
pub use config::RenderConfig;
pub use convert::{MuseScoreConverter, ScoreConverter};
pub use error::{Error, Result};
pub use format::ScoreFormat;
pub use normalize::load_score;
pub use pcm::{read_wav, PcmBuffer};
pub use program::{InstrumentRequest, Program, GM_PROGRAM_NAMES};
pub use score::{Event, EventKind, Part, Score, TempoChange, DEFAULT_TEMPO_BPM, DEFAULT_VELOCITY};
pub use tool::{resolve_program, ExternalTool, ToolError, ToolOutput, DEFAULT_TOOL_TIMEOUT};
