//! JSON configuration of a tiling run.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use stereo_tiling_correspondence::CrsKind;
use stereo_tiling_orchestrator::ClusterConfig;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn default_epipolar_tile_size() -> usize {
    500
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("out")
}

/// Output raster grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainConfig {
    /// Pixel size, in CRS units.
    pub resolution: f64,
    /// Tile side, in output pixels.
    pub tile_size: usize,
    pub epsg: u32,
}

impl Default for TerrainConfig {
    fn default() -> Self {
        Self {
            resolution: 0.5,
            tile_size: 500,
            epsg: 32631,
        }
    }
}

impl TerrainConfig {
    /// Tile side in CRS units.
    #[inline]
    pub fn tile_step(&self) -> f64 {
        self.tile_size as f64 * self.resolution
    }

    #[inline]
    pub fn crs_kind(&self) -> CrsKind {
        CrsKind::from_epsg(self.epsg)
    }
}

/// Disparity search range, in epipolar pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisparityRange {
    pub min: f64,
    pub max: f64,
}

impl Default for DisparityRange {
    fn default() -> Self {
        Self {
            min: -20.0,
            max: 20.0,
        }
    }
}

/// Top-level configuration, loaded from JSON.
///
/// Every field has a default, so `{}` is a valid configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_epipolar_tile_size")]
    pub epipolar_tile_size: usize,
    #[serde(default)]
    pub terrain: TerrainConfig,
    #[serde(default)]
    pub disparity: DisparityRange,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default = "default_out_dir")]
    pub out_dir: PathBuf,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            epipolar_tile_size: default_epipolar_tile_size(),
            terrain: TerrainConfig::default(),
            disparity: DisparityRange::default(),
            cluster: ClusterConfig::default(),
            out_dir: default_out_dir(),
        }
    }
}

impl PipelineConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.epipolar_tile_size == 0 {
            return Err(ConfigError::Invalid("epipolar_tile_size must be > 0".into()));
        }
        if self.terrain.tile_size == 0 {
            return Err(ConfigError::Invalid("terrain.tile_size must be > 0".into()));
        }
        if !(self.terrain.resolution.is_finite() && self.terrain.resolution > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "terrain.resolution must be a positive number, got {}",
                self.terrain.resolution
            )));
        }
        let DisparityRange { min, max } = self.disparity;
        if !(min.is_finite() && max.is_finite()) || min > max {
            return Err(ConfigError::Invalid(format!(
                "disparity range [{min}, {max}] is empty or not finite"
            )));
        }
        Ok(())
    }
}
