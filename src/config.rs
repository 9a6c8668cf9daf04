//! Configuration loading.
//!
//! Every config struct derives serde and fills missing fields from its
//! `Default`, so a file only has to name what it changes.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CollisionError, ConfigError};
use crate::physics::PhysicsConfig;
use crate::quadtree::QuadTreeConfig;

/// Serializable settings with file round-tripping in TOML or RON, picked by
/// extension.
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Semantic checks run after every successful parse.
    fn check(&self) -> Result<(), CollisionError> {
        Ok(())
    }

    fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let cfg: Self = toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.check()?;
        Ok(cfg)
    }

    fn from_ron_str(contents: &str) -> Result<Self, ConfigError> {
        let cfg: Self = ron::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.check()?;
        Ok(cfg)
    }

    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = Format::of(path)?;
        let contents = std::fs::read_to_string(path)?;
        let cfg = match format {
            Format::Toml => Self::from_toml_str(&contents)?,
            Format::Ron => Self::from_ron_str(&contents)?,
        };
        log::debug!("loaded configuration from {}", path.display());
        Ok(cfg)
    }

    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match Format::of(path)? {
            Format::Toml => {
                toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
            }
            Format::Ron => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
        };
        std::fs::write(path, contents)?;
        Ok(())
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Format {
    Toml,
    Ron,
}

impl Format {
    fn of(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Ok(Format::Toml),
            Some("ron") => Ok(Format::Ron),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Settings for a [`PhysicsWorld`](crate::world::PhysicsWorld).
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Side of the square world, `L`.
    pub world_side_length: f32,
    /// Treat the world as a torus; positions wrap into `[0, L)`.
    pub wrap: bool,
    /// Record a [`StepTiming`](crate::types::StepTiming) breakdown on every step.
    pub enable_timing: bool,
    pub tree: QuadTreeConfig,
    pub physics: PhysicsConfig,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self::for_side(2000.0)
    }
}

impl WorldConfig {
    /// Wrapping world of side `side` with a tree covering it exactly.
    pub fn for_side(side: f32) -> Self {
        Self {
            world_side_length: side,
            wrap: true,
            enable_timing: false,
            tree: QuadTreeConfig::for_world(side),
            physics: PhysicsConfig::default(),
        }
    }

    /// The side length to hand to `*_wrapped` queries, if the world wraps.
    pub fn wrap_side(&self) -> Option<f32> {
        self.wrap.then_some(self.world_side_length)
    }

    pub fn validate(&self) -> Result<(), CollisionError> {
        if !(self.world_side_length > 0.0) || !self.world_side_length.is_finite() {
            return Err(CollisionError::InvalidConfig(format!(
                "world_side_length must be positive and finite, got {}",
                self.world_side_length
            )));
        }
        self.tree.validate()?;
        self.physics.validate()?;
        if self.wrap {
            let covered = QuadTreeConfig::for_world(self.world_side_length);
            if self.tree.center != covered.center || self.tree.half_side != covered.half_side {
                log::warn!(
                    "tree square (center {:?}, half side {}) does not match the wrapped world [0, {})",
                    self.tree.center,
                    self.tree.half_side,
                    self.world_side_length
                );
            }
        }
        Ok(())
    }
}

impl Config for WorldConfig {
    fn check(&self) -> Result<(), CollisionError> {
        self.validate()
    }
}

impl Config for QuadTreeConfig {
    fn check(&self) -> Result<(), CollisionError> {
        self.validate()
    }
}

impl Config for PhysicsConfig {
    fn check(&self) -> Result<(), CollisionError> {
        self.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TreePurpose;
    use glam::Vec2;

    #[test]
    fn test_defaults_are_valid() {
        let cfg = WorldConfig::default();
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.tree.center, Vec2::splat(1000.0));
        assert_eq!(cfg.tree.half_side, 1000.0);
        assert_eq!(cfg.tree.max_depth, 6);
        assert_eq!(cfg.wrap_side(), Some(2000.0));
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let cfg = WorldConfig::from_toml_str(
            r#"
            wrap = false

            [physics]
            max_speed = 250.0

            [tree]
            max_depth = 4
            purpose = "Render"
            "#,
        )
        .unwrap();
        assert!(!cfg.wrap);
        assert_eq!(cfg.wrap_side(), None);
        assert_eq!(cfg.physics.max_speed, 250.0);
        assert_eq!(cfg.physics.impulse_damping, 0.8);
        assert_eq!(cfg.tree.max_depth, 4);
        assert_eq!(cfg.tree.purpose, TreePurpose::Render);
        assert_eq!(cfg.world_side_length, 2000.0);
    }

    #[test]
    fn test_invalid_values_rejected_after_parse() {
        let err = WorldConfig::from_toml_str("[physics]\nimpulse_damping = 0.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(CollisionError::InvalidConfig(_))));
        let err = WorldConfig::from_toml_str("world_side_length = -5.0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
        let err = WorldConfig::from_toml_str("[tree]\nmax_depth = 17\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let err = WorldConfig::from_toml_str("wrap = = true").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
        let err = WorldConfig::from_ron_str("(wrap: maybe)").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_file_round_trip_both_formats() {
        let dir = std::env::temp_dir();
        let cfg = WorldConfig {
            wrap: false,
            physics: PhysicsConfig { max_speed: 123.0, ..Default::default() },
            ..WorldConfig::for_side(512.0)
        };
        for name in ["quadbonk_cfg_test.toml", "quadbonk_cfg_test.ron"] {
            let path = dir.join(name);
            cfg.save_to_file(&path).unwrap();
            let loaded = WorldConfig::load_from_file(&path).unwrap();
            assert_eq!(loaded, cfg);
            let _ = std::fs::remove_file(&path);
        }
    }

    #[test]
    fn test_unsupported_extension() {
        let err = WorldConfig::default().save_to_file("world.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
        let err = WorldConfig::load_from_file("world.json").unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = WorldConfig::load_from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
