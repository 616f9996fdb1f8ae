//! Format normalizer: any supported input file to a canonical [`Score`].

use crate::config::RenderConfig;
use crate::convert::ScoreConverter;
use crate::error::Result;
use crate::format::ScoreFormat;
use crate::musicxml::{load_compressed_musicxml, load_musicxml};
use crate::score::Score;
use std::path::Path;
use tracing::{debug, info};

/// Load `path` into a [`Score`], converting through `converter` when the
/// format can't be read directly.
///
/// Intermediate files go to a scratch directory that is removed before this
/// returns, whether or not loading succeeded.
pub fn load_score(
    path: &Path,
    converter: &dyn ScoreConverter,
    config: &RenderConfig,
) -> Result<Score> {
    let format = ScoreFormat::from_path(path)?;
    if !path.is_file() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("score file not found: {}", path.display()),
        )
        .into());
    }
    info!(path = %path.display(), %format, "loading score");

    let mut score = match format {
        ScoreFormat::MusicXml => load_musicxml(path)?,
        ScoreFormat::CompressedMusicXml => load_compressed_musicxml(path)?,
        ScoreFormat::MuseScore | ScoreFormat::Midi => {
            let scratch = config.scratch()?;
            let intermediate = scratch.path().join("converted.musicxml");
            debug!(converter = converter.name(), out = %intermediate.display(), "converting");
            converter.convert(path, &intermediate)?;
            load_musicxml(&intermediate).map_err(|e| reattribute(e, path))?
        }
    };

    if let Some(velocity) = config.velocity_override {
        apply_uniform_velocity(&mut score, velocity);
    }

    info!(
        parts = score.part_count(),
        beats = score.duration(),
        seconds = score.duration_seconds(),
        "score loaded"
    );
    Ok(score)
}

/// Set every sounding event to `velocity`.
pub fn apply_uniform_velocity(score: &mut Score, velocity: u8) {
    for part in score.parts_mut() {
        for event in part.events.iter_mut().filter(|e| !e.is_rest()) {
            event.velocity = velocity;
        }
    }
}

/// Parse errors in a converter's output are reported against the user's file.
fn reattribute(err: crate::Error, source: &Path) -> crate::Error {
    match err {
        crate::Error::Parse { reason, .. } => crate::Error::Parse {
            path: source.to_path_buf(),
            reason: format!("converted MusicXML: {}", reason),
        },
        other => other,
    }
}
