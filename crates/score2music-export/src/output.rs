//! Writing the encoded mix to its destination.

use crate::encoder::Encoder;
use crate::error::{ExportError, Result};
use crate::format::encode_wav_file;
use crate::mix::MixedAudio;
use crate::options::BitDepth;
use std::path::Path;
use tracing::{debug, info};

/// Encode `mixed` and move it onto `destination`.
///
/// The WAV intermediate goes to `scratch`; the encoder writes a temporary
/// file beside `destination` that is renamed over it only once encoding
/// succeeded. On any failure `destination` is left as it was.
pub fn write_output(
    mixed: &MixedAudio,
    destination: &Path,
    encoder: &dyn Encoder,
    scratch: &Path,
) -> Result<()> {
    let wav = scratch.join("mix.wav");
    encode_wav_file(&mixed.audio, &wav, BitDepth::Int16)?;
    debug!(wav = %wav.display(), frames = mixed.audio.frames(), "wrote mix intermediate");

    let parent = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let staged = tempfile::Builder::new()
        .prefix(".score2music-")
        .suffix(&format!(".{}", mixed.format.extension()))
        .tempfile_in(parent)?
        .into_temp_path();

    encoder.encode(&wav, &staged, mixed.format)?;

    let written = std::fs::metadata(&staged).map(|m| m.len()).unwrap_or(0);
    if written == 0 {
        return Err(ExportError::Encoding(format!(
            "{} produced an empty file",
            encoder.name()
        )));
    }

    staged
        .persist(destination)
        .map_err(|e| ExportError::Io(e.error))?;
    info!(output = %destination.display(), bytes = written, "wrote output");
    Ok(())
}
