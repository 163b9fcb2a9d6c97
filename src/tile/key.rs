//! Tile key encoding
//!
//! A tile key packs the tile's index along each axis (relative to the build
//! volume minimum) into one `u64`, with y in the most significant bits, then x,
//! then z. Ordering keys is therefore ordering tiles by (y, x, z), which gives
//! bottom-up replay order for free.

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::{IVec3, Result};
use crate::tile::dims::{BuildVolume, TileDims};

/// Bits holding the z tile index
pub const Z_BITS: u32 = 26;
/// Bits holding the x tile index
pub const X_BITS: u32 = 26;
/// Bits holding the y tile index
pub const Y_BITS: u32 = 64 - X_BITS - Z_BITS;

const Z_SHIFT: u32 = 0;
const X_SHIFT: u32 = Z_BITS;
const Y_SHIFT: u32 = Z_BITS + X_BITS;

const fn mask(bits: u32) -> u64 {
    (1u64 << bits) - 1
}

/// Sortable tile identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TileKey(pub u64);

impl TileKey {
    /// Pack tile indices; each must already fit its bit width
    pub fn from_indices(ix: u64, iy: u64, iz: u64) -> Self {
        Self((iy << Y_SHIFT) | (ix << X_SHIFT) | (iz << Z_SHIFT))
    }

    pub fn x_index(self) -> u64 {
        (self.0 >> X_SHIFT) & mask(X_BITS)
    }

    pub fn y_index(self) -> u64 {
        (self.0 >> Y_SHIFT) & mask(Y_BITS)
    }

    pub fn z_index(self) -> u64 {
        (self.0 >> Z_SHIFT) & mask(Z_BITS)
    }
}

/// Maps absolute block positions onto tiles
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileGrid {
    dims: TileDims,
    volume: BuildVolume,
}

impl TileGrid {
    /// Create a grid, rejecting volumes whose tile index range overflows the key
    pub fn new(dims: TileDims, volume: BuildVolume) -> Result<Self> {
        let span =
            (volume.max.as_i64vec3() - volume.min.as_i64vec3()) / dims.as_ivec3().as_i64vec3();
        let fits = |idx: i64, bits: u32| (idx as u64) <= mask(bits);
        if !fits(span.x, X_BITS) || !fits(span.y, Y_BITS) || !fits(span.z, Z_BITS) {
            return Err(Error::InvalidBuildVolume(format!(
                "{} tiles of {:?} per axis do not fit the key layout",
                span + 1,
                <[u32; 3]>::from(dims)
            )));
        }
        Ok(Self { dims, volume })
    }

    pub fn dims(&self) -> TileDims {
        self.dims
    }

    pub fn volume(&self) -> BuildVolume {
        self.volume
    }

    /// Key of the tile containing `p`
    pub fn key(&self, p: IVec3) -> Result<TileKey> {
        self.volume.check(p)?;
        let rel = p.as_i64vec3() - self.volume.min.as_i64vec3();
        let size = self.dims.as_ivec3().as_i64vec3();
        Ok(TileKey::from_indices(
            rel.x.div_euclid(size.x) as u64,
            rel.y.div_euclid(size.y) as u64,
            rel.z.div_euclid(size.z) as u64,
        ))
    }

    /// Minimum corner of a tile
    pub fn origin(&self, key: TileKey) -> IVec3 {
        let size = self.dims.as_ivec3();
        self.volume.min
            + IVec3::new(
                key.x_index() as i32 * size.x,
                key.y_index() as i32 * size.y,
                key.z_index() as i32 * size.z,
            )
    }

    /// Whether a key addresses a tile inside the build volume
    pub fn contains_key(&self, key: TileKey) -> bool {
        let extent = self.volume.max.as_i64vec3() - self.volume.min.as_i64vec3();
        let span = extent / self.dims.as_ivec3().as_i64vec3();
        key.x_index() as i64 <= span.x
            && key.y_index() as i64 <= span.y
            && key.z_index() as i64 <= span.z
    }

    /// Tile key plus the position relative to that tile's origin
    pub fn locate(&self, p: IVec3) -> Result<(TileKey, IVec3)> {
        let key = self.key(p)?;
        Ok((key, p - self.origin(key)))
    }
}

impl Default for TileGrid {
    fn default() -> Self {
        Self {
            dims: TileDims::default(),
            volume: BuildVolume::default(),
        }
    }
}
