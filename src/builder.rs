//! Builder for configuring and constructing a [`Pipeline`].

use crate::error::{Error, Result};
use crate::pipeline::Pipeline;
use score2music_core::{MuseScoreConverter, RenderConfig, ScoreConverter};
use score2music_export::{Encoder, Ffmpeg};
use score2music_synth::{
    FluidSynth, SoundFontRenderer, SoundFontSystem, Synthesizer, SUPPORTED_SAMPLE_RATES,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Stages left unset fall back to the external tools: MuseScore for
/// conversion, FluidSynth for synthesis and ffmpeg for encoding, each found
/// on `PATH` and bounded by the configured tool timeout.
///
/// # Example
///
/// ```ignore
/// use score2music::prelude::*;
///
/// let pipeline = Pipeline::builder()
///     .sample_rate(48000)
///     .jobs(4)
///     .build()?;
///
/// let request: InstrumentRequest = "40,41,42,43".parse()?;
/// pipeline.render("quartet.mxl".as_ref(), "gm.sf2".as_ref(), &request, "out.mp3".as_ref())?;
/// ```
#[derive(Default)]
pub struct PipelineBuilder {
    config: RenderConfig,
    converter: Option<Box<dyn ScoreConverter>>,
    synthesizer: Option<Box<dyn Synthesizer>>,
    encoder: Option<Box<dyn Encoder>>,
    builtin_synthesizer: bool,
    soundfonts: Option<Arc<SoundFontSystem>>,
}

impl PipelineBuilder {
    /// Replace the whole configuration.
    pub fn config(mut self, config: RenderConfig) -> Self {
        self.config = config;
        self
    }

    /// Default: 44100
    pub fn sample_rate(mut self, sample_rate: u32) -> Self {
        self.config.sample_rate = sample_rate;
        self
    }

    /// Default: 600 s
    pub fn tool_timeout(mut self, timeout: Duration) -> Self {
        self.config.tool_timeout = timeout;
        self
    }

    /// Default: one per core
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.config.jobs = Some(jobs);
        self
    }

    pub fn velocity_override(mut self, velocity: u8) -> Self {
        self.config.velocity_override = Some(velocity);
        self
    }

    pub fn scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.scratch_dir = Some(dir.into());
        self
    }

    /// Default: true
    pub fn verify_presets(mut self, verify: bool) -> Self {
        self.config.verify_presets = verify;
        self
    }

    pub fn converter(mut self, converter: impl ScoreConverter + 'static) -> Self {
        self.converter = Some(Box::new(converter));
        self
    }

    pub fn synthesizer(mut self, synthesizer: impl Synthesizer + 'static) -> Self {
        self.synthesizer = Some(Box::new(synthesizer));
        self
    }

    pub fn encoder(mut self, encoder: impl Encoder + 'static) -> Self {
        self.encoder = Some(Box::new(encoder));
        self
    }

    /// Render in-process with RustySynth instead of FluidSynth.
    /// Ignored when an explicit synthesizer is set.
    pub fn builtin_synthesizer(mut self) -> Self {
        self.builtin_synthesizer = true;
        self
    }

    /// Share a SoundFont cache between pipelines.
    pub fn soundfonts(mut self, soundfonts: Arc<SoundFontSystem>) -> Self {
        self.soundfonts = Some(soundfonts);
        self
    }

    pub fn build(self) -> Result<Pipeline> {
        self.config.validate()?;
        let timeout = self.config.tool_timeout;

        let soundfonts = self.soundfonts.unwrap_or_default();

        let converter: Box<dyn ScoreConverter> = match self.converter {
            Some(converter) => converter,
            None => Box::new(MuseScoreConverter::new().timeout(timeout)),
        };

        let synthesizer: Box<dyn Synthesizer> = match self.synthesizer {
            Some(synthesizer) => synthesizer,
            None if self.builtin_synthesizer => {
                let rate = self.config.sample_rate;
                if !SUPPORTED_SAMPLE_RATES.contains(&rate) {
                    return Err(score2music_core::Error::InvalidConfig(format!(
                        "the builtin synthesizer needs a sample rate between {} and {} Hz, got {}",
                        SUPPORTED_SAMPLE_RATES.start(),
                        SUPPORTED_SAMPLE_RATES.end(),
                        rate
                    ))
                    .into());
                }
                Box::new(SoundFontRenderer::new(soundfonts.clone()))
            }
            None => Box::new(FluidSynth::new().timeout(timeout)),
        };

        let encoder: Box<dyn Encoder> = match self.encoder {
            Some(encoder) => encoder,
            None => Box::new(Ffmpeg::new().timeout(timeout)),
        };

        // 0 lets rayon pick one thread per core.
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.jobs.unwrap_or(0))
            .thread_name(|i| format!("score2music-render-{}", i))
            .build()
            .map_err(|e| Error::ThreadPool(e.to_string()))?;

        debug!(
            converter = converter.name(),
            synthesizer = synthesizer.name(),
            encoder = encoder.name(),
            threads = pool.current_num_threads(),
            "pipeline ready"
        );

        Ok(Pipeline {
            config: self.config,
            converter,
            synthesizer,
            encoder,
            soundfonts,
            pool,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_defaults_build() {
        let pipeline = PipelineBuilder::default().jobs(2).build().unwrap();
        assert_eq!(pipeline.config().sample_rate, 44100);
        assert_eq!(pipeline.config().jobs, Some(2));
        assert_eq!(pipeline.synthesizer.name(), "FluidSynth");
        assert_eq!(pipeline.pool.current_num_threads(), 2);
    }

    #[test]
    fn test_builtin_synthesizer_shares_cache() {
        let cache = Arc::new(SoundFontSystem::new());
        let pipeline = PipelineBuilder::default()
            .builtin_synthesizer()
            .soundfonts(cache.clone())
            .build()
            .unwrap();
        assert!(Arc::ptr_eq(pipeline.soundfonts(), &cache));
        assert_eq!(pipeline.synthesizer.name(), "RustySynth");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let err = PipelineBuilder::default()
            .sample_rate(10)
            .build()
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Config);

        let err = PipelineBuilder::default().jobs(0).build().err().unwrap();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_builtin_rejects_low_sample_rate_up_front() {
        let err = PipelineBuilder::default()
            .sample_rate(8000)
            .builtin_synthesizer()
            .build()
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert_eq!(err.exit_code(), 2);

        // FluidSynth handles it.
        assert!(PipelineBuilder::default().sample_rate(8000).build().is_ok());
    }
}
