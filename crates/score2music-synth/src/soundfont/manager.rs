//! SoundFont loading, caching and preset lookup.

use crate::error::{Error, Result};
use dashmap::DashMap;
use rustysynth::SoundFont;
use score2music_core::Program;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// One preset of a SoundFont.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresetInfo {
    pub bank: i32,
    pub program: i32,
    pub name: String,
}

/// Cheap validity check: the file opens and carries a RIFF `sfbk` header.
pub fn probe_soundfont(path: &Path) -> Result<()> {
    let mut header = [0u8; 12];
    File::open(path)
        .and_then(|mut f| f.read_exact(&mut header))
        .map_err(|e| Error::SoundFont(format!("cannot read '{}': {}", path.display(), e)))?;
    if &header[0..4] != b"RIFF" || &header[8..12] != b"sfbk" {
        return Err(Error::SoundFont(format!(
            "'{}' is not a SoundFont 2 file",
            path.display()
        )));
    }
    Ok(())
}

/// SoundFont cache keyed by path. Safe to share across render threads.
#[derive(Default)]
pub struct SoundFontSystem {
    soundfonts: DashMap<PathBuf, Arc<SoundFont>>,
}

impl SoundFontSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a SoundFont from file or return the cached copy.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Arc<SoundFont>> {
        let path = path.as_ref();
        let key = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());

        if let Some(soundfont) = self.soundfonts.get(&key) {
            return Ok(soundfont.value().clone());
        }

        probe_soundfont(path)?;

        // Parse outside the map so other paths aren't blocked.
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let soundfont = Arc::new(SoundFont::new(&mut reader).map_err(|e| {
            Error::SoundFont(format!(
                "Failed to parse SoundFont file '{}': {}",
                path.display(),
                e
            ))
        })?);
        info!(
            path = %path.display(),
            presets = soundfont.get_presets().len(),
            "loaded SoundFont"
        );

        // A racing loader may have inserted first; keep whichever won.
        Ok(self.soundfonts.entry(key).or_insert(soundfont).value().clone())
    }

    /// All presets in the SoundFont, sorted by bank then program.
    pub fn presets(&self, path: impl AsRef<Path>) -> Result<Vec<PresetInfo>> {
        let soundfont = self.load(path)?;
        let mut presets: Vec<PresetInfo> = soundfont
            .get_presets()
            .iter()
            .map(|p| PresetInfo {
                bank: p.get_bank_number(),
                program: p.get_patch_number(),
                name: p.get_name().trim().to_string(),
            })
            .collect();
        presets.sort_by(|a, b| (a.bank, a.program).cmp(&(b.bank, b.program)));
        Ok(presets)
    }

    /// Fail unless every program has a bank 0 preset in the SoundFont.
    pub fn verify_programs(&self, path: impl AsRef<Path>, programs: &[Program]) -> Result<()> {
        let path = path.as_ref();
        let presets = self.presets(path)?;
        for &program in programs {
            let found = presets
                .iter()
                .any(|p| p.bank == 0 && p.program == program.number() as i32);
            if !found {
                return Err(Error::PresetUnavailable {
                    program: program.number(),
                    name: program.gm_name(),
                    soundfont: path.to_path_buf(),
                });
            }
            debug!(%program, "preset available");
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.soundfonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.soundfonts.is_empty()
    }
}
