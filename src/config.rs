// src/config.rs
//
// TOML configuration. Every section is optional; a missing file section
// falls back to the defaults below.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::assets::SoundId;
use crate::binaural::BrainwavePreset;
use crate::error::ConfigError;
use crate::technique::Technique;

/// Accepted output rates; anything outside is clamped.
pub const MIN_SAMPLE_RATE: u32 = 8_000;
pub const MAX_SAMPLE_RATE: u32 = 192_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: u32,
    pub block_size: usize,
    pub tick_interval_ms: u64,
    /// When false no audio context is ever opened.
    pub audio_enabled: bool,
    pub ambient: AmbientConfig,
    pub binaural: BinauralConfig,
    pub chimes: ChimeConfig,
    pub assets: AssetsConfig,
    pub technique: Option<TechniqueConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            block_size: 512,
            tick_interval_ms: 100,
            audio_enabled: true,
            ambient: AmbientConfig::default(),
            binaural: BinauralConfig::default(),
            chimes: ChimeConfig::default(),
            assets: AssetsConfig::default(),
            technique: None,
        }
    }
}

impl EngineConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let mut config: EngineConfig = toml::from_str(text)?;
        config.sanitize();
        if let Some(technique) = &config.technique {
            technique.build()?;
        }
        Ok(config)
    }

    fn sanitize(&mut self) {
        self.sample_rate = self.sample_rate.clamp(MIN_SAMPLE_RATE, MAX_SAMPLE_RATE);
        self.ambient.volume = self.ambient.volume.clamp(0.0, 1.0);
        self.ambient.headroom = self.ambient.headroom.clamp(0.0, 1.0);
        self.binaural.volume = self.binaural.volume.clamp(0.0, 1.0);
        self.chimes.volume = self.chimes.volume.clamp(0.0, 1.0);
        self.block_size = self.block_size.max(1);
        self.tick_interval_ms = self.tick_interval_ms.max(1);
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    /// The configured technique, or `None` if the file names none.
    pub fn technique(&self) -> Result<Option<Technique>, ConfigError> {
        self.technique
            .as_ref()
            .map(|t| t.build().map_err(ConfigError::from))
            .transpose()
    }
}

fn secs(value: f64) -> Duration {
    if value.is_finite() && value > 0.0 {
        Duration::from_secs_f64(value)
    } else {
        Duration::ZERO
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientConfig {
    pub enabled: bool,
    pub sound: SoundId,
    pub volume: f32,
    /// Scale applied on top of `volume` so the loop sits under the chimes.
    pub headroom: f32,
    pub fade_in_secs: f64,
    pub fade_out_secs: f64,
    pub completion_fade_secs: f64,
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sound: SoundId::Ocean,
            volume: 0.5,
            headroom: 0.5,
            fade_in_secs: 2.0,
            fade_out_secs: 1.0,
            completion_fade_secs: 3.0,
        }
    }
}

impl AmbientConfig {
    pub fn fade_in(&self) -> Duration {
        secs(self.fade_in_secs)
    }

    pub fn fade_out(&self) -> Duration {
        secs(self.fade_out_secs)
    }

    pub fn completion_fade(&self) -> Duration {
        secs(self.completion_fade_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinauralConfig {
    pub enabled: bool,
    pub preset: BrainwavePreset,
    pub volume: f32,
    pub carrier_hz: f32,
}

impl Default for BinauralConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            preset: BrainwavePreset::Theta,
            volume: 0.3,
            carrier_hz: 200.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChimeConfig {
    pub enabled: bool,
    pub volume: f32,
}

impl Default for ChimeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 0.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetsConfig {
    pub root: PathBuf,
    pub extension: String,
}

impl Default for AssetsConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("assets"),
            extension: "mp3".into(),
        }
    }
}

/// A technique either by built-in name or by explicit durations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TechniqueConfig {
    Named { name: String },
    Custom { durations: [f64; 4], cycles: u32 },
}

impl TechniqueConfig {
    pub fn build(&self) -> Result<Technique, crate::error::TechniqueError> {
        match self {
            TechniqueConfig::Named { name } => Technique::preset(name),
            TechniqueConfig::Custom { durations, cycles } => Technique::new(*durations, *cycles),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::error::TechniqueError;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = EngineConfig::from_toml_str("").unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.ambient.fade_in(), Duration::from_secs(2));
        assert_eq!(config.ambient.completion_fade(), Duration::from_secs(3));
        assert_eq!(config.tick_interval(), Duration::from_millis(100));
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = EngineConfig::from_toml_str(
            r#"
            sample_rate = 44100

            [ambient]
            sound = "rain"

            [binaural]
            preset = "alpha"
            "#,
        )
        .unwrap();

        assert_eq!(config.sample_rate, 44_100);
        assert_eq!(config.ambient.sound, SoundId::Rain);
        assert_eq!(config.ambient.volume, 0.5);
        assert_eq!(config.binaural.preset, BrainwavePreset::Alpha);
        assert_eq!(config.binaural.carrier_hz, 200.0);
    }

    #[test]
    fn volumes_are_clamped_after_loading() {
        let config = EngineConfig::from_toml_str(
            r#"
            [ambient]
            volume = 4.0
            [binaural]
            volume = -1.0
            [chimes]
            volume = 1.5
            "#,
        )
        .unwrap();

        assert_eq!(config.ambient.volume, 1.0);
        assert_eq!(config.binaural.volume, 0.0);
        assert_eq!(config.chimes.volume, 1.0);
    }

    #[test]
    fn techniques_by_name_or_durations() {
        let named = EngineConfig::from_toml_str("[technique]\nname = \"box\"\n").unwrap();
        let technique = named.technique().unwrap().unwrap();
        assert_eq!(technique.total_cycles(), 4);

        let custom =
            EngineConfig::from_toml_str("[technique]\ndurations = [3, 0, 3, 0]\ncycles = 2\n")
                .unwrap();
        let technique = custom.technique().unwrap().unwrap();
        assert_eq!(technique.duration_secs(), [3.0, 0.0, 3.0, 0.0]);
    }

    #[test]
    fn invalid_technique_is_rejected_at_load() {
        let err = EngineConfig::from_toml_str("[technique]\ndurations = [0, 0, 0, 0]\ncycles = 2\n")
            .unwrap_err();
        assert!(matches!(err, ConfigError::Technique(TechniqueError::NoTimedPhase)));

        let err = EngineConfig::from_toml_str("[technique]\nname = \"square\"\n").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Technique(TechniqueError::UnknownTechnique(_))
        ));
    }

    #[test]
    fn sample_rate_is_clamped_to_a_usable_range() {
        let config = EngineConfig::from_toml_str("sample_rate = 0").unwrap();
        assert_eq!(config.sample_rate, MIN_SAMPLE_RATE);
        assert!(config.sample_rate > 0);

        let config = EngineConfig::from_toml_str("sample_rate = 10_000_000").unwrap();
        assert_eq!(config.sample_rate, MAX_SAMPLE_RATE);

        let config = EngineConfig::from_toml_str("sample_rate = 44100").unwrap();
        assert_eq!(config.sample_rate, 44_100);
    }

    #[test]
    fn bad_toml_is_a_parse_error() {
        let err = EngineConfig::from_toml_str("sample_rate = \"fast\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tick_interval_ms = 50\n[chimes]\nenabled = false").unwrap();

        let config = EngineConfig::load(file.path()).unwrap();
        assert_eq!(config.tick_interval_ms, 50);
        assert!(!config.chimes.enabled);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = EngineConfig::load(dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
