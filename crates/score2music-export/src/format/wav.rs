//! WAV intermediate written with hound.
//!
//! The encoder never sees PCM directly: the mix is staged as a WAV file,
//! 16-bit unless asked otherwise.

use crate::error::{ExportError, Result};
use crate::options::BitDepth;
use hound::{SampleFormat, WavSpec, WavWriter};
use score2music_core::PcmBuffer;
use std::io::{BufWriter, Cursor, Seek, Write};
use std::path::Path;

const I16_FULL_SCALE: f32 = 32767.0;
const I24_FULL_SCALE: f32 = 8_388_607.0;

/// Header for `pcm` stored at `bit_depth`.
pub fn wav_spec(pcm: &PcmBuffer, bit_depth: BitDepth) -> WavSpec {
    WavSpec {
        channels: pcm.channels,
        sample_rate: pcm.sample_rate,
        bits_per_sample: bit_depth.bits(),
        sample_format: match bit_depth {
            BitDepth::Float32 => SampleFormat::Float,
            BitDepth::Int16 | BitDepth::Int24 => SampleFormat::Int,
        },
    }
}

/// Write `pcm` to a WAV file at `path`.
pub fn encode_wav_file(pcm: &PcmBuffer, path: &Path, bit_depth: BitDepth) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_wav(BufWriter::new(file), pcm, bit_depth)
}

/// Encode `pcm` to WAV bytes.
pub fn encode_wav_memory(pcm: &PcmBuffer, bit_depth: BitDepth) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    write_wav(Cursor::new(&mut bytes), pcm, bit_depth)?;
    Ok(bytes)
}

fn write_wav<W: Write + Seek>(sink: W, pcm: &PcmBuffer, bit_depth: BitDepth) -> Result<()> {
    check_frames(pcm)?;

    let mut writer = WavWriter::new(sink, wav_spec(pcm, bit_depth))?;
    match bit_depth {
        BitDepth::Int16 => {
            for &s in &pcm.samples {
                writer.write_sample(quantize(s, I16_FULL_SCALE) as i16)?;
            }
        }
        BitDepth::Int24 => {
            for &s in &pcm.samples {
                writer.write_sample(quantize(s, I24_FULL_SCALE))?;
            }
        }
        BitDepth::Float32 => {
            for &s in &pcm.samples {
                writer.write_sample(s)?;
            }
        }
    }
    // Patches the RIFF sizes; dropping without this leaves a broken header.
    writer.finalize()?;
    Ok(())
}

fn check_frames(pcm: &PcmBuffer) -> Result<()> {
    if pcm.channels == 0 {
        return Err(ExportError::InvalidData("buffer has no channels".into()));
    }
    let ragged = pcm.samples.len() % pcm.channels as usize;
    if ragged != 0 {
        return Err(ExportError::InvalidData(format!(
            "{} trailing samples after the last {}-channel frame",
            ragged, pcm.channels
        )));
    }
    Ok(())
}

/// Clip to [-1, 1] and scale to an integer range, truncating.
#[inline]
fn quantize(sample: f32, full_scale: f32) -> i32 {
    (sample.clamp(-1.0, 1.0) * full_scale) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use score2music_core::read_wav;

    #[test]
    fn test_quantize_clips() {
        assert_eq!(quantize(0.0, I16_FULL_SCALE), 0);
        assert_eq!(quantize(1.0, I16_FULL_SCALE), 32767);
        assert_eq!(quantize(-1.0, I16_FULL_SCALE), -32767);
        assert_eq!(quantize(1.5, I16_FULL_SCALE), 32767);
        assert_eq!(quantize(-1.5, I24_FULL_SCALE), -8_388_607);
    }

    #[test]
    fn test_spec_follows_buffer() {
        let pcm = PcmBuffer::silence(22050, 1, 4);
        let spec = wav_spec(&pcm, BitDepth::Int24);
        assert_eq!(spec.sample_rate, 22050);
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.bits_per_sample, 24);
        assert_eq!(spec.sample_format, SampleFormat::Int);
    }

    #[test]
    fn test_sixteen_bit_header_and_size() {
        let pcm = PcmBuffer::new(44100, 2, vec![0.0, 0.1, 0.5, -0.1, -0.5, 0.0]);
        let bytes = encode_wav_memory(&pcm, BitDepth::Int16).unwrap();

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(bytes.len(), 44 + 6 * 2);
    }

    #[test]
    fn test_float_file_is_lossless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mix.wav");
        let pcm = PcmBuffer::new(48000, 1, vec![0.5, -0.25, 0.0]);

        encode_wav_file(&pcm, &path, BitDepth::Float32).unwrap();
        assert_eq!(read_wav(&path).unwrap(), pcm);
    }

    #[test]
    fn test_ragged_buffer_rejected() {
        let pcm = PcmBuffer::new(44100, 2, vec![0.0, 0.5, 0.1]);
        assert!(matches!(
            encode_wav_memory(&pcm, BitDepth::Int16),
            Err(ExportError::InvalidData(_))
        ));
    }
}
