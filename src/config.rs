//! Packing configuration

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::types::Result;
use crate::pack::tile::PrefillMode;
use crate::tile::{BuildVolume, TileDims, TileGrid};

/// Default voxel count a single world capture may scan
pub const DEFAULT_SCAN_LIMIT: u64 = 1_600_000;

/// Tile layout, build volume and packing options
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackConfig {
    /// Tile size per axis
    pub tile: TileDims,
    /// Addressable world bounds
    pub volume: BuildVolume,
    /// Whether the most frequent type per tile is left to the caller
    pub prefill: PrefillMode,
    /// Largest box a world capture will scan
    pub scan_limit: u64,
}

impl Default for PackConfig {
    fn default() -> Self {
        Self {
            tile: TileDims::default(),
            volume: BuildVolume::default(),
            prefill: PrefillMode::Off,
            scan_limit: DEFAULT_SCAN_LIMIT,
        }
    }
}

impl PackConfig {
    /// Parse and validate a JSON config
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: PackConfig = serde_json::from_str(json)?;
        config.grid()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json_str(&json)
    }

    pub fn to_json_string(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The tile grid this config describes
    pub fn grid(&self) -> Result<TileGrid> {
        let volume = BuildVolume::new(self.volume.min, self.volume.max)?;
        TileGrid::new(self.tile, volume)
    }
}
