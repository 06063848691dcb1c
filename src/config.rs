//! Bloom tuning.
//!
//! The three recognized knobs are `threshold` (minimum brightness that
//! blooms), `strength` (glow multiplier in the final composite) and `radius`
//! (blur spread in pixels). The rest control how the compositor masks and
//! presents. Extra glow groups each blur their own layer with their own
//! tuning and are added on top of the primary glow.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::layers::{BLOOM_LAYER, LAYER_COUNT};
use crate::mask::MaskMode;

/// Maximum blur radius in pixels (caps blur cost).
pub const MAX_BLOOM_RADIUS: f32 = 32.0;

/// Default downsample factor for the GPU glow chain (1 = full res, 2 = half res, etc.)
pub const DEFAULT_DOWNSAMPLE: u32 = 2;

/// What the composite pass writes to the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum OutputMode {
    /// Base scene plus glow.
    #[default]
    Composite,
    /// Glow buffer only.
    GlowOnly,
    /// Base scene only.
    BaseOnly,
}

impl OutputMode {
    /// Weights applied to (base, glow) in the composite.
    pub fn weights(&self, strength: f32) -> (f32, f32) {
        match self {
            OutputMode::Composite => (1.0, strength),
            OutputMode::GlowOnly => (0.0, strength),
            OutputMode::BaseOnly => (1.0, 0.0),
        }
    }
}

/// A further glow pass keyed on its own layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlowGroup {
    pub name: String,
    /// Objects on this layer glow in this group.
    pub layer: u8,
    pub threshold: f32,
    pub strength: f32,
    pub radius: f32,
}

impl Default for GlowGroup {
    fn default() -> Self {
        Self {
            name: "group".to_string(),
            layer: BLOOM_LAYER + 1,
            threshold: 0.0,
            strength: 1.0,
            radius: 4.0,
        }
    }
}

impl GlowGroup {
    pub fn sanitize(&self) -> Self {
        if self.layer >= LAYER_COUNT {
            log::warn!("Glow group '{}' layer {} out of range", self.name, self.layer);
        }
        Self {
            name: self.name.clone(),
            layer: self.layer.min(LAYER_COUNT - 1),
            threshold: finite_or(self.threshold, 0.0).max(0.0),
            strength: finite_or(self.strength, 0.0).max(0.0),
            radius: finite_or(self.radius, 0.0).clamp(0.0, MAX_BLOOM_RADIUS),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown preset '{0}'")]
    UnknownPreset(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BloomConfig {
    /// Minimum luminance that contributes to the glow.
    pub threshold: f32,
    /// Glow multiplier in the final composite.
    pub strength: f32,
    /// Blur spread in pixels.
    pub radius: f32,
    /// Glow-chain resolution divisor on the GPU backend.
    pub downsample: u32,
    /// Scales the composited color.
    pub exposure: f32,
    /// Clamp composited channels to 0..1.
    pub clamp_output: bool,
    pub mask_mode: MaskMode,
    pub output_mode: OutputMode,
    /// Clear color of the glow pass. Anything non-black will bloom.
    pub glow_clear_color: [f32; 4],
    /// Clear color of the base pass.
    pub base_clear_color: [f32; 4],
    /// Additional glow passes, each with its own layer and tuning.
    pub groups: Vec<GlowGroup>,
}

impl Default for BloomConfig {
    fn default() -> Self {
        Self {
            threshold: 0.0,
            strength: 1.0,
            radius: 4.0,
            downsample: DEFAULT_DOWNSAMPLE,
            exposure: 1.0,
            clamp_output: false,
            mask_mode: MaskMode::Darken,
            output_mode: OutputMode::Composite,
            glow_clear_color: [0.0, 0.0, 0.0, 1.0],
            base_clear_color: [0.0, 0.0, 0.0, 1.0],
            groups: Vec::new(),
        }
    }
}

/// Names accepted by [`BloomConfig::preset`].
pub const PRESET_NAMES: &[&str] = &["bloom", "selective", "light", "composer", "sun", "model", "sphere"];

impl BloomConfig {
    /// Clamp parameters to safe ranges.
    pub fn sanitize(&self) -> Self {
        let clean = Self {
            threshold: finite_or(self.threshold, 0.0).max(0.0),
            strength: finite_or(self.strength, 0.0).max(0.0),
            radius: finite_or(self.radius, 0.0).clamp(0.0, MAX_BLOOM_RADIUS),
            downsample: self.downsample.clamp(1, 8),
            exposure: finite_or(self.exposure, 1.0).max(0.0),
            groups: self.groups.iter().map(GlowGroup::sanitize).collect(),
            ..self.clone()
        };
        if clean.radius != self.radius && self.radius.is_finite() {
            log::warn!("Bloom radius {} clamped to {}", self.radius, clean.radius);
        }
        clean
    }

    /// Tunings taken from the individual demo pages.
    pub fn preset(name: &str) -> Result<Self, ConfigError> {
        let base = Self::default();
        let config = match name {
            "bloom" => Self {
                threshold: 0.0,
                strength: 1.5,
                radius: 4.0,
                ..base
            },
            "selective" => Self {
                threshold: 0.0,
                strength: 4.0,
                radius: 10.0,
                ..base
            },
            "light" => Self {
                threshold: 0.0,
                strength: 1.0,
                radius: 5.0,
                ..base
            },
            "composer" => Self {
                threshold: 0.05,
                strength: 1.2,
                radius: 5.5,
                ..base
            },
            "sun" => Self {
                threshold: 0.0,
                strength: 2.0,
                radius: 2.0,
                ..base
            },
            "model" => Self {
                threshold: 0.0,
                strength: 1.0,
                radius: 4.0,
                base_clear_color: [0.0627, 0.1255, 0.251, 1.0], // 0x102040
                ..base
            },
            "sphere" => Self {
                threshold: 0.0,
                strength: 1.5,
                radius: 4.0,
                groups: vec![GlowGroup {
                    name: "wide".to_string(),
                    layer: BLOOM_LAYER + 1,
                    threshold: 0.0,
                    strength: 3.0,
                    radius: 8.0,
                }],
                ..base
            },
            other => return Err(ConfigError::UnknownPreset(other.to_string())),
        };
        Ok(config)
    }

    /// Read a JSON config. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&contents).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_json(contents: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(contents)
    }
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_clamps() {
        let config = BloomConfig {
            threshold: -1.0,
            strength: f32::NAN,
            radius: 100.0,
            downsample: 0,
            ..Default::default()
        }
        .sanitize();

        assert_eq!(config.threshold, 0.0);
        assert_eq!(config.strength, 0.0);
        assert_eq!(config.radius, MAX_BLOOM_RADIUS);
        assert_eq!(config.downsample, 1);
    }

    #[test]
    fn test_all_presets_resolve() {
        for name in PRESET_NAMES {
            let preset = BloomConfig::preset(name).unwrap();
            assert_eq!(preset, preset.sanitize(), "preset {} not already sane", name);
        }
        assert!(matches!(
            BloomConfig::preset("nope"),
            Err(ConfigError::UnknownPreset(_))
        ));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = BloomConfig::from_json(r#"{ "strength": 2.5, "mask_mode": "hide" }"#).unwrap();
        assert_eq!(config.strength, 2.5);
        assert_eq!(config.mask_mode, MaskMode::Hide);
        assert_eq!(config.radius, BloomConfig::default().radius);
        assert_eq!(config.output_mode, OutputMode::Composite);
    }

    #[test]
    fn test_output_mode_weights() {
        assert_eq!(OutputMode::Composite.weights(2.0), (1.0, 2.0));
        assert_eq!(OutputMode::GlowOnly.weights(2.0), (0.0, 2.0));
        assert_eq!(OutputMode::BaseOnly.weights(2.0), (1.0, 0.0));
    }

    #[test]
    fn test_sanitize_cleans_groups() {
        let config = BloomConfig {
            groups: vec![GlowGroup {
                layer: 40,
                strength: -2.0,
                radius: f32::INFINITY,
                ..GlowGroup::default()
            }],
            ..Default::default()
        }
        .sanitize();

        let group = &config.groups[0];
        assert_eq!(group.layer, LAYER_COUNT - 1);
        assert_eq!(group.strength, 0.0);
        assert_eq!(group.radius, 0.0);
    }

    #[test]
    fn test_groups_from_json() {
        let config = BloomConfig::from_json(r#"{ "groups": [{ "name": "wide", "layer": 2, "radius": 8.0 }] }"#).unwrap();
        assert_eq!(config.groups.len(), 1);
        assert_eq!(config.groups[0].layer, 2);
        assert_eq!(config.groups[0].radius, 8.0);
        assert_eq!(config.groups[0].strength, GlowGroup::default().strength);
    }

    fn temp_config(suffix: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("selective_bloom_{}_{}.json", std::process::id(), suffix));
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_reads_file() {
        let path = temp_config("load", r#"{ "threshold": 0.2, "strength": 3.0, "output_mode": "glow_only" }"#);
        let loaded = BloomConfig::load(&path);
        std::fs::remove_file(&path).unwrap();

        let config = loaded.unwrap();
        assert_eq!(config.threshold, 0.2);
        assert_eq!(config.strength, 3.0);
        assert_eq!(config.output_mode, OutputMode::GlowOnly);
        assert_eq!(config.radius, BloomConfig::default().radius);
    }

    #[test]
    fn test_load_rejects_bad_json() {
        let path = temp_config("bad", r#"{ "strength": "very" }"#);
        let loaded = BloomConfig::load(&path);
        std::fs::remove_file(&path).unwrap();

        let err = loaded.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(&path.display().to_string()));
    }

    #[test]
    fn test_load_missing_file() {
        let err = BloomConfig::load(Path::new("/nonexistent/bloom.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
