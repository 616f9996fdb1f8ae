//! Mixdown of per-instrument renders.

use crate::dsp::{gain_to_db, normalize_peak};
use crate::error::{ExportError, Result};
use crate::options::OutputFormat;
use score2music_core::PcmBuffer;
use tracing::{debug, info};

/// Full scale; mixes peaking above this are scaled down.
pub const FULL_SCALE: f32 = 1.0;

/// The final waveform, ready for encoding.
#[derive(Debug, Clone, PartialEq)]
pub struct MixedAudio {
    pub audio: PcmBuffer,
    /// Normalization gain applied after summing (1.0 if none).
    pub gain: f32,
    pub format: OutputFormat,
}

/// Sum `buffers` into one waveform.
///
/// A single buffer passes through unchanged. Otherwise shorter buffers are
/// padded with silence to the longest, and the sum is scaled by `1 / peak`
/// if it exceeds full scale.
pub fn mix(buffers: Vec<PcmBuffer>, format: OutputFormat) -> Result<MixedAudio> {
    let mut buffers = buffers.into_iter();
    let Some(first) = buffers.next() else {
        return Err(ExportError::InvalidData("nothing to mix".into()));
    };
    let rest: Vec<PcmBuffer> = buffers.collect();

    for (i, other) in rest.iter().enumerate() {
        if other.sample_rate != first.sample_rate || other.channels != first.channels {
            return Err(ExportError::FormatMismatch(format!(
                "track {} is {} Hz/{} ch, track 0 is {} Hz/{} ch",
                i + 1,
                other.sample_rate,
                other.channels,
                first.sample_rate,
                first.channels
            )));
        }
    }

    if rest.is_empty() {
        debug!(frames = first.frames(), "single track, mix pass-through");
        return Ok(MixedAudio {
            audio: first,
            gain: 1.0,
            format,
        });
    }

    let longest = rest
        .iter()
        .map(|b| b.samples.len())
        .fold(first.samples.len(), usize::max);

    let mut sum = first.samples;
    sum.resize(longest, 0.0);
    for buffer in &rest {
        for (out, s) in sum.iter_mut().zip(&buffer.samples) {
            *out += *s;
        }
    }

    let gain = normalize_peak(&mut sum, FULL_SCALE);
    let audio = PcmBuffer::new(first.sample_rate, first.channels, sum);
    info!(
        tracks = rest.len() + 1,
        frames = audio.frames(),
        gain_db = gain_to_db(gain),
        "mixed"
    );

    Ok(MixedAudio {
        audio,
        gain,
        format,
    })
}
