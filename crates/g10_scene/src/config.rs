//! Scene configuration.

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration parameters for scenes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    pub hierarchy: HierarchyConfig,
}

/// Configuration parameters for the bounding volume hierarchy of a scene.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyConfig {
    /// Whether to maintain a bounding volume hierarchy at all. When
    /// disabled, spatial queries test every entity.
    pub enabled: bool,
    /// Whether to check the structure of the hierarchy after every update.
    /// Expensive, meant for debugging.
    pub validate_after_updates: bool,
    /// Whether to log a dump of the hierarchy at debug level after it has
    /// been built.
    pub log_dump_after_build: bool,
    /// The largest number of collidable entities to build a hierarchy for.
    /// Building scales cubically with the entity count, so scenes with more
    /// entities fall back to testing every entity.
    pub max_build_entity_count: usize,
}

impl SceneConfig {
    /// Parses the configuration from the RON file at the given path.
    pub fn from_ron_file(file_path: impl AsRef<Path>) -> Result<Self> {
        let config: Self = g10_io::parse_ron_file(file_path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.hierarchy.validate()
    }
}

impl HierarchyConfig {
    fn validate(&self) -> Result<()> {
        if self.max_build_entity_count == 0 {
            bail!(
                "Invalid maximum entity count for bounding volume hierarchy builds: {}",
                self.max_build_entity_count
            );
        }
        if self.validate_after_updates && !self.enabled {
            bail!("Bounding volume hierarchy validation is enabled, but the hierarchy is not");
        }
        Ok(())
    }
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            validate_after_updates: false,
            log_dump_after_build: false,
            max_build_entity_count: 4096,
        }
    }
}
