//! Tile dimensions and build volume bounds

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::{IVec3, Result};
use crate::math::BlockBox;

/// Largest size of a tile along one axis (local coordinates fit 5 bits)
pub const MAX_TILE_AXIS: u32 = 32;

/// Largest tile volume (voxel counts fit 15 bits)
pub const MAX_TILE_VOLUME: u32 = (1 << 15) - 1;

/// Size of a tile along each axis
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "[u32; 3]", into = "[u32; 3]")]
pub struct TileDims {
    x: u8,
    y: u8,
    z: u8,
}

impl TileDims {
    /// The canonical 16x16x16 tile
    pub const CANONICAL: TileDims = TileDims { x: 16, y: 16, z: 16 };

    /// Validate and create tile dimensions
    pub fn new(x: u32, y: u32, z: u32) -> Result<Self> {
        let axis_ok = |v: u32| (1..=MAX_TILE_AXIS).contains(&v);
        if !axis_ok(x) || !axis_ok(y) || !axis_ok(z) || x * y * z > MAX_TILE_VOLUME {
            return Err(Error::InvalidTileDims { x, y, z });
        }
        Ok(Self { x: x as u8, y: y as u8, z: z as u8 })
    }

    pub fn x(&self) -> usize {
        self.x as usize
    }

    pub fn y(&self) -> usize {
        self.y as usize
    }

    pub fn z(&self) -> usize {
        self.z as usize
    }

    /// Per-axis size as a vector
    pub fn as_ivec3(&self) -> IVec3 {
        IVec3::new(self.x as i32, self.y as i32, self.z as i32)
    }

    /// Number of voxel slots in a tile
    pub fn volume(&self) -> usize {
        self.x() * self.y() * self.z()
    }

    /// Flat slot index of a local coordinate, y outermost then x then z
    #[inline]
    pub fn index(&self, x: usize, y: usize, z: usize) -> usize {
        (y * self.x() + x) * self.z() + z
    }

    /// Check that a local coordinate addresses a slot
    pub fn contains(&self, local: IVec3) -> bool {
        local.cmpge(IVec3::ZERO).all() && local.cmplt(self.as_ivec3()).all()
    }
}

impl Default for TileDims {
    fn default() -> Self {
        Self::CANONICAL
    }
}

impl TryFrom<[u32; 3]> for TileDims {
    type Error = Error;

    fn try_from(v: [u32; 3]) -> Result<Self> {
        Self::new(v[0], v[1], v[2])
    }
}

impl From<TileDims> for [u32; 3] {
    fn from(d: TileDims) -> Self {
        [d.x as u32, d.y as u32, d.z as u32]
    }
}

/// Inclusive bounds of the addressable world
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildVolume {
    pub min: IVec3,
    pub max: IVec3,
}

impl BuildVolume {
    pub fn new(min: IVec3, max: IVec3) -> Result<Self> {
        if min.cmpgt(max).any() {
            return Err(Error::InvalidBuildVolume(format!(
                "min {min} exceeds max {max}"
            )));
        }
        Ok(Self { min, max })
    }

    pub fn contains(&self, p: IVec3) -> bool {
        BlockBox { min: self.min, max: self.max }.contains(p)
    }

    /// Error unless the position is inside the volume
    pub fn check(&self, p: IVec3) -> Result<()> {
        if self.contains(p) {
            Ok(())
        } else {
            Err(Error::OutOfBuildVolume { x: p.x, y: p.y, z: p.z })
        }
    }
}

impl Default for BuildVolume {
    fn default() -> Self {
        Self {
            min: IVec3::new(-33_554_432, -64, -33_554_432),
            max: IVec3::new(33_554_431, 319, 33_554_431),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_dims() {
        let d = TileDims::default();
        assert_eq!(d.volume(), 4096);
        assert_eq!(d.index(0, 0, 1), 1);
        assert_eq!(d.index(1, 0, 0), 16);
        assert_eq!(d.index(0, 1, 0), 256);
    }

    #[test]
    fn test_invalid_dims_rejected() {
        assert!(matches!(TileDims::new(0, 16, 16), Err(Error::InvalidTileDims { .. })));
        assert!(matches!(TileDims::new(33, 1, 1), Err(Error::InvalidTileDims { .. })));
        // 32^3 overflows a 15-bit count
        assert!(TileDims::new(32, 32, 32).is_err());
        assert!(TileDims::new(32, 32, 31).is_ok());
        assert!(TileDims::new(1, 1, 1).is_ok());
    }

    #[test]
    fn test_dims_serde_validates() {
        let d: TileDims = serde_json::from_str("[8, 4, 2]").unwrap();
        assert_eq!((d.x(), d.y(), d.z()), (8, 4, 2));
        assert!(serde_json::from_str::<TileDims>("[64, 4, 2]").is_err());
        assert_eq!(serde_json::to_string(&d).unwrap(), "[8,4,2]");
    }

    #[test]
    fn test_contains_local() {
        let d = TileDims::new(4, 2, 3).unwrap();
        assert!(d.contains(IVec3::new(3, 1, 2)));
        assert!(!d.contains(IVec3::new(4, 0, 0)));
        assert!(!d.contains(IVec3::new(0, -1, 0)));
    }

    #[test]
    fn test_build_volume_check() {
        let v = BuildVolume::default();
        assert!(v.check(IVec3::new(0, -64, 0)).is_ok());
        assert!(matches!(
            v.check(IVec3::new(0, 320, 0)),
            Err(Error::OutOfBuildVolume { y: 320, .. })
        ));
        assert!(BuildVolume::new(IVec3::ONE, IVec3::ZERO).is_err());
    }
}
