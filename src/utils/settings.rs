use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::constants::*;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Invalid settings: {0}")]
    Invalid(String),
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct RenderSettings {
    /// Chunks within `near_radius` that may be (re)meshed per frame
    pub near_build_budget: usize,
    /// Chunks beyond `near_radius` that may be (re)meshed per frame
    pub far_build_budget: usize,
    pub near_radius: i32,
    /// Hard limit, in chunks, applied before any frustum math
    pub render_radius: i32,
    /// Meshes further than this are pruned
    pub retain_radius: i32,
    pub frustum_margin: f32,
    pub matrix_epsilon: f32,
    pub initial_atlas_bytes: u64,
    pub max_atlas_bytes: u64,
    pub growth_factor: u64,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            near_build_budget: NEAR_BUILD_BUDGET,
            far_build_budget: FAR_BUILD_BUDGET,
            near_radius: NEAR_RADIUS,
            render_radius: RENDER_DISTANCE,
            retain_radius: CHUNK_RETAIN_DISTANCE,
            frustum_margin: FRUSTUM_MARGIN,
            matrix_epsilon: MATRIX_EPSILON,
            initial_atlas_bytes: INITIAL_ATLAS_BYTES,
            max_atlas_bytes: MAX_ATLAS_BYTES,
            growth_factor: ATLAS_GROWTH_FACTOR,
        }
    }
}

impl RenderSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.growth_factor < 2 {
            return Err(ConfigError::Invalid(format!(
                "growth_factor must be at least 2, got {}",
                self.growth_factor
            )));
        }
        if self.initial_atlas_bytes == 0 {
            return Err(ConfigError::Invalid(
                "initial_atlas_bytes must be positive".to_string(),
            ));
        }
        if self.max_atlas_bytes < self.initial_atlas_bytes {
            return Err(ConfigError::Invalid(format!(
                "max_atlas_bytes ({}) is below initial_atlas_bytes ({})",
                self.max_atlas_bytes, self.initial_atlas_bytes
            )));
        }
        if self.near_radius < 0 || self.render_radius < 0 || self.retain_radius < 0 {
            return Err(ConfigError::Invalid("radii must not be negative".to_string()));
        }
        if self.near_radius > self.render_radius {
            return Err(ConfigError::Invalid(format!(
                "near_radius ({}) exceeds render_radius ({})",
                self.near_radius, self.render_radius
            )));
        }
        if !(self.frustum_margin >= 0.0) || !(self.matrix_epsilon >= 0.0) {
            return Err(ConfigError::Invalid(
                "frustum_margin and matrix_epsilon must be non-negative".to_string(),
            ));
        }
        Ok(())
    }
}

/// `settings.toml` in the platform config directory.
pub fn default_settings_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "chunk-atlas")
        .map(|dirs| dirs.config_dir().join("settings.toml"))
}

/// Reads settings from a TOML file. A missing file yields the defaults.
pub fn load_settings(path: &Path) -> Result<RenderSettings, ConfigError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No settings at {}, using defaults", path.display());
            return Ok(RenderSettings::default());
        }
        Err(err) => return Err(err.into()),
    };
    let settings: RenderSettings = toml::from_str(&text)?;
    settings.validate()?;
    Ok(settings)
}

pub fn save_settings(path: &Path, settings: &RenderSettings) -> Result<(), ConfigError> {
    settings.validate()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, toml::to_string_pretty(settings)?)?;
    Ok(())
}
