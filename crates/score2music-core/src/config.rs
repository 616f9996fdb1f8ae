//! Render configuration.

use crate::error::{Error, Result};
use crate::tool::DEFAULT_TOOL_TIMEOUT;
use std::path::PathBuf;
use std::time::Duration;

/// Settings shared by every stage of a render.
///
/// Tool locations are not part of this: they live on the converter,
/// synthesizer and encoder values.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// Sample rate every track is synthesized at.
    pub sample_rate: u32,

    /// Deadline for each external tool invocation.
    pub tool_timeout: Duration,

    /// Max tracks emitted and synthesized in parallel. `None` uses all cores.
    pub jobs: Option<usize>,

    /// Force this velocity on every note instead of the score's dynamics.
    pub velocity_override: Option<u8>,

    /// Parent directory for scratch files. `None` uses the system temp dir.
    pub scratch_dir: Option<PathBuf>,

    /// Check that the SoundFont has a preset for every requested program.
    pub verify_presets: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            jobs: None,
            velocity_override: None,
            scratch_dir: None,
            verify_presets: true,
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<()> {
        if !(8000..=192000).contains(&self.sample_rate) {
            return Err(Error::InvalidConfig(format!(
                "sample rate must be between 8000 and 192000 Hz, got {}",
                self.sample_rate
            )));
        }

        if self.tool_timeout.is_zero() {
            return Err(Error::InvalidConfig("tool timeout must be > 0".into()));
        }

        if self.jobs == Some(0) {
            return Err(Error::InvalidConfig("jobs must be >= 1".into()));
        }

        if let Some(velocity) = self.velocity_override {
            if !(1..=127).contains(&velocity) {
                return Err(Error::InvalidConfig(format!(
                    "velocity must be between 1 and 127, got {}",
                    velocity
                )));
            }
        }

        Ok(())
    }

    /// Create a scratch directory under `scratch_dir` (or the system temp dir).
    /// Removed when the returned guard drops.
    pub fn scratch(&self) -> Result<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("score2music-");
        let dir = match &self.scratch_dir {
            Some(parent) => builder.tempdir_in(parent)?,
            None => builder.tempdir()?,
        };
        Ok(dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(RenderConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_values() {
        let cases = [
            RenderConfig {
                sample_rate: 100,
                ..Default::default()
            },
            RenderConfig {
                tool_timeout: Duration::ZERO,
                ..Default::default()
            },
            RenderConfig {
                jobs: Some(0),
                ..Default::default()
            },
            RenderConfig {
                velocity_override: Some(0),
                ..Default::default()
            },
            RenderConfig {
                velocity_override: Some(200),
                ..Default::default()
            },
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(Error::InvalidConfig(_))),
                "{:?}",
                config
            );
        }
    }

    #[test]
    fn test_scratch_is_removed_on_drop() {
        let parent = tempfile::tempdir().unwrap();
        let config = RenderConfig {
            scratch_dir: Some(parent.path().to_path_buf()),
            ..Default::default()
        };
        let scratch = config.scratch().unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.starts_with(parent.path()));
        assert!(path.is_dir());
        drop(scratch);
        assert!(!path.exists());
    }
}
