//! Interleaved PCM buffers exchanged between synthesis and mixing.

use crate::error::{Error, Result};
use std::io::BufReader;
use std::path::Path;

/// Interleaved `f32` samples, nominally in `[-1, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PcmBuffer {
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<f32>,
}

impl PcmBuffer {
    pub fn new(sample_rate: u32, channels: u16, samples: Vec<f32>) -> Self {
        Self {
            sample_rate,
            channels,
            samples,
        }
    }

    /// Silent buffer of `frames` frames.
    pub fn silence(sample_rate: u32, channels: u16, frames: usize) -> Self {
        Self::new(sample_rate, channels, vec![0.0; frames * channels as usize])
    }

    /// Build an interleaved stereo buffer from separate channels.
    pub fn from_stereo(sample_rate: u32, left: &[f32], right: &[f32]) -> Self {
        let samples = left
            .iter()
            .zip(right)
            .flat_map(|(&l, &r)| [l, r])
            .collect();
        Self::new(sample_rate, 2, samples)
    }

    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.frames() as f64 / self.sample_rate as f64
        }
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Largest absolute sample value.
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }
}

/// Read a WAV file into a float buffer. Integer formats are scaled to `[-1, 1]`.
pub fn read_wav(path: &Path) -> Result<PcmBuffer> {
    let file = std::fs::File::open(path)?;
    let reader = hound::WavReader::new(BufReader::new(file))?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<Vec<_>, _>>()?,
        hound::SampleFormat::Int => {
            if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
                return Err(Error::Pcm(format!(
                    "unsupported bit depth {}",
                    spec.bits_per_sample
                )));
            }
            let scale = 1.0 / (1u64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<std::result::Result<Vec<_>, _>>()?
        }
    };

    Ok(PcmBuffer::new(spec.sample_rate, spec.channels, samples))
}
